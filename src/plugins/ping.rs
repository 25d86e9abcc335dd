use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::bot::BotContext;
use crate::mention::Mention;
use crate::plugin::Plugin;

const TRIGGER: &str = "!ping";

fn default_response() -> String {
    "pong".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Reply text; defaults to "pong".
    pub response: String,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            response: default_response(),
        }
    }
}

/// Replies to `!ping` mentions with a configurable response.
#[derive(Debug, Default)]
pub struct PingPlugin;

#[async_trait]
impl Plugin for PingPlugin {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn on_mention(&self, ctx: &BotContext, mention: &Mention) -> Result<()> {
        if !mention.addressed_text().trim().starts_with(TRIGGER) {
            return Ok(());
        }

        let config: PingConfig = ctx.config_section(self.name())?.unwrap_or_default();
        ctx.reply(&config.response, mention).await;
        info!("Ping from @{author}", author = mention.author_username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::api::testing::{make_status, ScriptedApi};
    use crate::api::Account;
    use crate::config::Config;
    use crate::reply::ReplySender;

    fn context_with(api: Arc<ScriptedApi>, config: Config) -> BotContext {
        let replies = ReplySender::new(api, Duration::from_secs(1));
        BotContext::new(
            Account {
                id: 1000,
                username: "bot".to_string(),
                name: None,
            },
            Arc::new(config),
            replies,
        )
    }

    fn mention(text: &str) -> Mention {
        Mention::from_status(make_status(77, 7, "alice", text)).unwrap()
    }

    #[tokio::test]
    async fn test_replies_pong_to_trigger() {
        let api = Arc::new(ScriptedApi::new());
        let ctx = context_with(api.clone(), Config::default());

        PingPlugin.on_mention(&ctx, &mention("!ping")).await.unwrap();

        assert_eq!(api.sent(), vec![("pong".to_string(), Some(77))]);
    }

    #[tokio::test]
    async fn test_response_is_configurable() {
        let api = Arc::new(ScriptedApi::new());
        let config: Config = serde_json::from_value(json!({
            "plugins": {"ping": {"response": "still here"}}
        }))
        .unwrap();
        let ctx = context_with(api.clone(), config);

        PingPlugin
            .on_mention(&ctx, &mention("!ping are you up?"))
            .await
            .unwrap();

        assert_eq!(api.sent(), vec![("still here".to_string(), Some(77))]);
    }

    #[tokio::test]
    async fn test_ignores_other_mentions() {
        let api = Arc::new(ScriptedApi::new());
        let ctx = context_with(api.clone(), Config::default());

        PingPlugin
            .on_mention(&ctx, &mention("hello there"))
            .await
            .unwrap();

        assert!(api.sent().is_empty());
    }
}
