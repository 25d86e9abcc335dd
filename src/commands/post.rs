use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::PlatformApi;
use crate::config::Config;
use crate::twitter::{self, TwitterClient};

/// Posts a one-off status, optionally threaded as a reply.
pub async fn execute(config_path: &Path, text: &str, reply_to: Option<&str>) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = TwitterClient::new(&config)?;

    let reply_target = reply_to
        .map(twitter::parse_status_id)
        .transpose()
        .context("Failed to parse the reply target")?;

    let status = client
        .post_status(text, reply_target)
        .await
        .context("Failed to post status")?;

    info!("Posted status {id}", id = status.id);
    println!("{id}", id = status.id);
    Ok(())
}
