use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use crate::bot::Bot;
use crate::config::Config;
use crate::plugin::PluginSet;
use crate::plugins::{EchoPlugin, PingPlugin};
use crate::twitter::TwitterClient;

/// Runs the bot until an interrupt signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = Arc::new(Config::load(config_path)?);

    let client =
        Arc::new(TwitterClient::new(&config).context("Failed to initialize platform client")?);

    // Built-in plugins, in fixed invocation order.
    let plugins = PluginSet::builder()
        .register(PingPlugin)
        .register(EchoPlugin)
        .build();
    info!("Registered plugins: {names:?}", names = plugins.names());

    let bot = Bot::new(client, plugins, config).await?;
    let ctx = bot.context();
    let plugins = bot.plugins();

    plugins.load_all(&ctx).await;

    let handle = bot.start();

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal (Ctrl+C)");

    handle.stop().await;
    plugins.unload_all(&ctx).await;
    info!("Bot shutdown complete");
    Ok(())
}
