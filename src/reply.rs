use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};

use crate::api::{ApiError, PlatformApi};

/// Platform status length limit, in characters.
pub const STATUS_CHAR_LIMIT: usize = 280;

/// Marker appended when an outgoing status had to be cut down to the limit.
pub const CONTINUATION_MARKER: char = '…';

/// Posts outgoing statuses with length clamping and a single cooldown-gated
/// retry on rate limits. Permanent failures are logged and dropped so one bad
/// reply cannot stall the poll loop.
#[derive(Clone)]
pub struct ReplySender {
    api: Arc<dyn PlatformApi>,
    cooldown: Duration,
    limit: usize,
}

impl ReplySender {
    pub fn new(api: Arc<dyn PlatformApi>, cooldown: Duration) -> Self {
        Self {
            api,
            cooldown,
            limit: STATUS_CHAR_LIMIT,
        }
    }

    /// Sends `text`, threading it under `in_reply_to` when given.
    pub async fn send(&self, text: &str, in_reply_to: Option<u64>) {
        let text = clamp_to_limit(text, self.limit);
        match in_reply_to {
            Some(id) => debug!("Sending reply to {id}: {text}"),
            None => debug!("Sending: {text}"),
        }
        match self.api.post_status(&text, in_reply_to).await {
            Ok(_) => {}
            Err(ApiError::RateLimited { reset }) => {
                warn!(
                    "Rate-limited while sending (reset at {reset:?}), retrying once after {cooldown:?}",
                    cooldown = self.cooldown
                );
                time::sleep(self.cooldown).await;
                if let Err(err) = self.api.post_status(&text, in_reply_to).await {
                    warn!("Dropping status after failed retry: {err}");
                }
            }
            Err(err) => {
                warn!("Failed to send the status, dropping it: {err}");
            }
        }
    }
}

/// Clamps to `limit` characters, appending the continuation marker when the
/// text had to be cut.
fn clamp_to_limit(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clamped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clamped.push(CONTINUATION_MARKER);
    clamped
}
