use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::PlatformApi;
use crate::config::Config;
use crate::twitter::TwitterClient;

/// Verifies credentials and prints the authenticated identity.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = TwitterClient::new(&config)?;

    let account = client
        .verify_credentials()
        .await
        .context("Failed to authenticate with the platform")?;

    info!(
        "Authenticated as @{username} (id {id})",
        username = account.username,
        id = account.id
    );
    println!("@{username} ({id})", username = account.username, id = account.id);
    Ok(())
}
