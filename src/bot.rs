use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{Account, ApiError, PlatformApi, Status};
use crate::config::Config;
use crate::cursor::RateLimitedCursor;
use crate::mention::Mention;
use crate::plugin::PluginSet;
use crate::reply::ReplySender;

/// Read-only session view handed to plugins.
///
/// Plugins see the bot identity, their own config section and the
/// rate-limit-aware sender; the high-water mark stays private to the poll
/// task.
pub struct BotContext {
    account: Account,
    config: Arc<Config>,
    replies: ReplySender,
}

impl BotContext {
    pub(crate) fn new(account: Account, config: Arc<Config>, replies: ReplySender) -> Self {
        Self {
            account,
            config,
            replies,
        }
    }

    /// The bot's own identity.
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    /// A plugin's config section, deserialized; `Ok(None)` when absent.
    pub fn config_section<T: DeserializeOwned>(&self, plugin: &str) -> Result<Option<T>> {
        self.config.typed_section(plugin)
    }

    /// Posts a standalone status through the rate-limit-aware sender.
    pub async fn post(&self, text: &str) {
        self.replies.send(text, None).await;
    }

    /// Replies to a mention, threading under it.
    pub async fn reply(&self, text: &str, mention: &Mention) {
        self.replies.send(text, Some(mention.id)).await;
    }
}

/// Timing knobs for the poll loop.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub poll_interval: Duration,
    pub ratelimit_wait: Duration,
    pub pacing_delay: Duration,
}

impl BotSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            ratelimit_wait: config.ratelimit_wait(),
            pacing_delay: config.pacing_delay(),
        }
    }
}

/// The bot session: identity, client handle, plugin set and the mention
/// high-water mark. Owned and mutated exclusively by the poll task once
/// started.
pub struct Bot {
    api: Arc<dyn PlatformApi>,
    ctx: Arc<BotContext>,
    plugins: Arc<PluginSet>,
    settings: BotSettings,

    /// ID of the most recently fully dispatched mention; `None` until the
    /// bootstrap cycle establishes a baseline. Only ever moves forward.
    last_seen_id: Option<u64>,
}

impl Bot {
    /// Authenticates against the platform and assembles the session.
    /// Failure here is fatal; callers abort before the loop starts.
    pub async fn new(
        api: Arc<dyn PlatformApi>,
        plugins: PluginSet,
        config: Arc<Config>,
    ) -> Result<Self> {
        let account = api
            .verify_credentials()
            .await
            .context("Failed to authenticate with the platform")?;
        info!("Login successful: @{username}", username = account.username);

        let settings = BotSettings::from_config(&config);
        let replies = ReplySender::new(api.clone(), settings.ratelimit_wait);
        let ctx = Arc::new(BotContext::new(account, config, replies));

        Ok(Self {
            api,
            ctx,
            plugins: Arc::new(plugins),
            settings,
            last_seen_id: None,
        })
    }

    /// Session view shared with plugins; the runner keeps a clone for the
    /// load/unload fan-out.
    pub fn context(&self) -> Arc<BotContext> {
        self.ctx.clone()
    }

    pub fn plugins(&self) -> Arc<PluginSet> {
        self.plugins.clone()
    }

    /// Spawns the poll loop on its own task and returns the stop handle.
    pub fn start(self) -> BotHandle {
        info!("Starting bot");
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { self.run(task_cancel).await });
        BotHandle { cancel, handle }
    }

    /// The poll loop: wakes each interval, drains new mentions and
    /// dispatches them. Cancellation is observed only at the idle boundary
    /// so no mention is left half-handled.
    async fn run(mut self, cancel: CancellationToken) {
        let first_tick = time::Instant::now() + self.settings.poll_interval;
        let mut ticker = time::interval_at(first_tick, self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stop signal observed, exiting poll loop");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.poll_once().await {
                        error!("Poll cycle failed: {err}");
                    }
                }
            }
        }
    }

    /// One polling cycle. The first cycle only records a baseline so old
    /// conversations are not replayed on startup.
    pub(crate) async fn poll_once(&mut self) -> Result<(), ApiError> {
        debug!(
            "Polling for mentions since {last_seen:?}",
            last_seen = self.last_seen_id
        );
        let Some(since_id) = self.last_seen_id else {
            self.establish_baseline().await?;
            return Ok(());
        };

        let mut cursor = RateLimitedCursor::new(
            self.api.clone(),
            Some(since_id),
            self.settings.ratelimit_wait,
        );
        let mut batch = cursor.drain().await?;
        batch.sort_by_key(|status| status.id);

        for status in batch {
            // Guard against a page straddling the high-water mark.
            if status.id <= since_id {
                continue;
            }
            self.process_status(status).await;
            time::sleep(self.settings.pacing_delay).await;
        }
        Ok(())
    }

    /// Records the newest mention ID as the baseline without dispatching
    /// anything. An empty timeline baselines at 0 so everything that arrives
    /// after startup counts as new.
    async fn establish_baseline(&mut self) -> Result<(), ApiError> {
        let page = loop {
            match self.api.mentions_page(None, None).await {
                Ok(page) => break page,
                Err(ApiError::RateLimited { reset }) => {
                    warn!(
                        "Rate-limited while establishing the baseline (reset at {reset:?}), retrying after {wait:?}",
                        wait = self.settings.ratelimit_wait
                    );
                    time::sleep(self.settings.ratelimit_wait).await;
                }
                Err(err) => return Err(err),
            }
        };

        let newest = page
            .newest_id
            .or_else(|| page.statuses.iter().map(|s| s.id).max())
            .unwrap_or(0);
        self.last_seen_id = Some(newest);
        info!("Baseline established at mention {newest}; history is not replayed");
        Ok(())
    }

    /// Filters, normalizes and dispatches a single status, then advances the
    /// high-water mark.
    async fn process_status(&mut self, status: Status) {
        let id = status.id;

        if status.author.id == self.ctx.account().id {
            debug!("Skipping self-authored status {id}");
            self.advance_mark(id);
            return;
        }

        let status = if status.truncated {
            self.fetch_extended(status).await
        } else {
            status
        };

        match Mention::from_status(status) {
            Ok(mention) => {
                debug!("Received mention {id}: {text}", text = mention.text);
                self.plugins.dispatch(&self.ctx, &mention).await;
                self.advance_mark(id);
            }
            Err(err) => {
                // Skip-and-advance so a bad payload cannot stall the loop.
                warn!("Skipping malformed status {id}: {err}");
                self.advance_mark(id);
            }
        }
    }

    /// Refetches the full text of a truncated status, retrying once after a
    /// cooldown on rate limit. Falls back to the truncated text when the
    /// refetch keeps failing.
    async fn fetch_extended(&self, status: Status) -> Status {
        let id = status.id;
        for attempt in 0..2 {
            match self.api.status(id, true).await {
                Ok(full) => return full,
                Err(ApiError::RateLimited { .. }) if attempt == 0 => {
                    warn!(
                        "Rate-limited fetching extended text for {id}, retrying after {wait:?}",
                        wait = self.settings.ratelimit_wait
                    );
                    time::sleep(self.settings.ratelimit_wait).await;
                }
                Err(err) => {
                    warn!("Could not fetch extended text for {id}, using truncated text: {err}");
                    break;
                }
            }
        }
        status
    }

    fn advance_mark(&mut self, id: u64) {
        if self.last_seen_id.map_or(true, |last| id > last) {
            self.last_seen_id = Some(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn last_seen(&self) -> Option<u64> {
        self.last_seen_id
    }
}

/// Running-bot handle: signals termination and waits for the loop to reach
/// the idle boundary.
pub struct BotHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BotHandle {
    /// Signals termination and waits for the loop to exit cleanly.
    pub async fn stop(self) {
        info!("Stopping bot");
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            error!("Poll task ended abnormally: {err}");
        }
    }
}
