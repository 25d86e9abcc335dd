use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::bot::BotContext;
use crate::mention::Mention;
use crate::plugin::Plugin;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Usernames allowed to trigger echoes; empty means everyone.
    pub masters: Vec<String>,
}

/// Replies with the mention's addressed text.
///
/// Command-prefixed (`!`) and empty payloads are ignored so command plugins
/// keep exclusive ownership of their triggers.
#[derive(Debug, Default)]
pub struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn on_mention(&self, ctx: &BotContext, mention: &Mention) -> Result<()> {
        let payload = mention.addressed_text().trim();
        if payload.is_empty() || payload.starts_with('!') {
            return Ok(());
        }

        let config: EchoConfig = ctx.config_section(self.name())?.unwrap_or_default();
        if !config.masters.is_empty()
            && !config
                .masters
                .iter()
                .any(|master| master == &mention.author_username)
        {
            debug!(
                "Ignoring mention from non-master @{author}",
                author = mention.author_username
            );
            return Ok(());
        }

        ctx.reply(payload, mention).await;
        info!("Echoed mention from @{author}", author = mention.author_username);
        Ok(())
    }
}
