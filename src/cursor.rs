use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::warn;

use crate::api::{ApiError, MentionsPage, PlatformApi, Status};

/// Drains the mentions timeline page by page, suspending for a fixed cooldown
/// whenever the platform signals a rate limit and resuming from the same page
/// so nothing is skipped or duplicated.
///
/// Items come back in platform order (newest first); the poll loop reorders a
/// drained batch before processing. Rate limits are retried with the same
/// cooldown for as long as they last; any other fetch error ends the cycle.
pub struct RateLimitedCursor {
    api: Arc<dyn PlatformApi>,
    since_id: Option<u64>,
    cooldown: Duration,
    next_token: Option<String>,
    buffer: VecDeque<Status>,
    exhausted: bool,
}

impl RateLimitedCursor {
    pub fn new(api: Arc<dyn PlatformApi>, since_id: Option<u64>, cooldown: Duration) -> Self {
        Self {
            api,
            since_id,
            cooldown,
            next_token: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next mention, or `None` once the timeline is drained.
    pub async fn next(&mut self) -> Result<Option<Status>, ApiError> {
        loop {
            if let Some(status) = self.buffer.pop_front() {
                return Ok(Some(status));
            }
            if self.exhausted {
                return Ok(None);
            }
            match self
                .api
                .mentions_page(self.since_id, self.next_token.as_deref())
                .await
            {
                Ok(page) => self.accept_page(page),
                Err(ApiError::RateLimited { reset }) => {
                    warn!(
                        "Rate-limited by the platform API (reset at {reset:?}), retrying after {cooldown:?}",
                        cooldown = self.cooldown
                    );
                    time::sleep(self.cooldown).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Drains the remaining items into a vector.
    pub async fn drain(&mut self) -> Result<Vec<Status>, ApiError> {
        let mut items = Vec::new();
        while let Some(status) = self.next().await? {
            items.push(status);
        }
        Ok(items)
    }

    fn accept_page(&mut self, page: MentionsPage) {
        // An empty page ends the walk even when a token is present, so a
        // misbehaving endpoint cannot spin the cursor forever.
        self.exhausted = page.next_token.is_none() || page.statuses.is_empty();
        self.next_token = page.next_token;
        self.buffer.extend(page.statuses);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{make_status, page, ScriptedApi};

    #[tokio::test]
    async fn test_yields_all_items_across_pages() {
        let api = Arc::new(ScriptedApi::new());
        api.push_page(page(
            vec![make_status(3, 7, "alice", "c"), make_status(2, 7, "alice", "b")],
            Some("older"),
        ));
        api.push_page(page(vec![make_status(1, 7, "alice", "a")], None));

        let mut cursor =
            RateLimitedCursor::new(api.clone(), Some(0), Duration::from_secs(5));
        let items = cursor.drain().await.unwrap();

        let ids: Vec<u64> = items.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(api.page_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_one_cooldown_and_resumes() {
        let cooldown = Duration::from_secs(5);
        let api = Arc::new(ScriptedApi::new());
        api.push_page_err(ApiError::RateLimited { reset: None });
        api.push_page(page(vec![make_status(4, 7, "alice", "d")], None));

        let start = time::Instant::now();
        let mut cursor = RateLimitedCursor::new(api.clone(), Some(0), cooldown);
        let items = cursor.drain().await.unwrap();

        let ids: Vec<u64> = items.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4]);
        assert_eq!(api.page_calls(), 2);
        assert_eq!(start.elapsed(), cooldown);
    }

    #[tokio::test]
    async fn test_non_rate_limit_errors_propagate() {
        let api = Arc::new(ScriptedApi::new());
        api.push_page_err(ApiError::Api {
            status: 500,
            message: "server error".to_string(),
        });

        let mut cursor =
            RateLimitedCursor::new(api.clone(), Some(0), Duration::from_secs(5));
        let err = cursor.drain().await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_empty_timeline_ends_cleanly() {
        let api = Arc::new(ScriptedApi::new());
        let mut cursor =
            RateLimitedCursor::new(api.clone(), Some(0), Duration::from_secs(5));
        assert!(cursor.next().await.unwrap().is_none());
        assert_eq!(api.page_calls(), 1);
    }
}
