use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::api::{Account, ApiError, MentionsPage, PlatformApi, Status, User};
use crate::config::Config;
use crate::error_utils::{get_optional_env_var, parse_http_response_json};

const DEFAULT_API_BASE: &str = "https://api.twitter.com/2";

// Common URL parameters for API requests
const COMMON_STATUS_FIELDS: &str = "created_at,entities,referenced_statuses,truncated,author_id";
const COMMON_USER_FIELDS: &str = "name,username";

/// Platform API client; one instance per bot process.
///
/// Performs no internal retries: rate limits come back as
/// [`ApiError::RateLimited`] and the cooldown loops in the cursor and sender
/// decide when to try again.
pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    api_base: String,
    user_id: OnceCell<u64>,
}

#[derive(Debug, Deserialize)]
struct AccountEnvelope {
    data: Account,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    data: Option<Status>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct TimelineEnvelope {
    data: Option<Vec<Status>>,
    includes: Option<Includes>,
    meta: Option<TimelineMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    users: Option<Vec<User>>,
}

#[derive(Debug, Deserialize)]
struct TimelineMeta {
    #[serde(default, deserialize_with = "crate::api::id_fmt::de_opt_id")]
    newest_id: Option<u64>,
    next_token: Option<String>,
}

impl TwitterClient {
    /// Builds a client from config and environment; TWITTER_BEARER_TOKEN
    /// takes precedence over the config file.
    pub fn new(config: &Config) -> Result<Self> {
        let bearer_token = get_optional_env_var("TWITTER_BEARER_TOKEN")
            .or_else(|| config.bearer_token.clone())
            .context(
                "No bearer token: set TWITTER_BEARER_TOKEN or `bearer_token` in the config file",
            )?;
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::with_base(bearer_token, api_base)
    }

    /// Builds a client against an explicit API base URL.
    pub fn with_base(bearer_token: String, api_base: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bearer_token,
            api_base,
            user_id: OnceCell::new(),
        })
    }

    /// The authenticated user's ID, fetched once and cached.
    async fn user_id(&self) -> Result<u64, ApiError> {
        self.user_id
            .get_or_try_init(|| async {
                let account = self.verify_credentials().await?;
                Ok::<u64, ApiError>(account.id)
            })
            .await
            .map(|id| *id)
    }

    async fn get(&self, resource: &str, url: &str) -> Result<reqwest::Response, ApiError> {
        debug!(%resource, %url, "Requesting");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        self.check_status(resource, response).await
    }

    /// Maps non-success responses into the error taxonomy.
    async fn check_status(
        &self,
        resource: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
                reset: rate_limit_reset(&response),
            }),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                resource: resource.to_string(),
            }),
            status if status.is_success() => Ok(response),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Builds the mentions-timeline URL for one page.
    fn mentions_url(
        &self,
        user_id: u64,
        since_id: Option<u64>,
        page_token: Option<&str>,
    ) -> String {
        let base = format!(
            "{api}/users/{user_id}/mentions?max_results=100\
            &expansions=author_id\
            &status.fields={COMMON_STATUS_FIELDS}\
            &user.fields={COMMON_USER_FIELDS}",
            api = self.api_base
        );

        let since_param = since_id.map_or(String::new(), |id| format!("&since_id={id}"));
        let token_param =
            page_token.map_or(String::new(), |token| format!("&pagination_token={token}"));

        format!("{base}{since_param}{token_param}")
    }

    fn status_url(&self, status_id: u64, extended: bool) -> String {
        let mode_param = if extended { "&status_mode=extended" } else { "" };
        format!(
            "{api}/statuses/{status_id}?expansions=author_id\
            &status.fields={COMMON_STATUS_FIELDS}\
            &user.fields={COMMON_USER_FIELDS}{mode_param}",
            api = self.api_base
        )
    }
}

#[async_trait]
impl PlatformApi for TwitterClient {
    async fn verify_credentials(&self) -> Result<Account, ApiError> {
        let url = format!(
            "{api}/users/me?user.fields={COMMON_USER_FIELDS}",
            api = self.api_base
        );
        let response = self.get("me", &url).await?;
        let envelope: AccountEnvelope =
            parse_http_response_json(response, "account lookup").await?;
        Ok(envelope.data)
    }

    async fn mentions_page(
        &self,
        since_id: Option<u64>,
        page_token: Option<&str>,
    ) -> Result<MentionsPage, ApiError> {
        let user_id = self.user_id().await?;
        let url = self.mentions_url(user_id, since_id, page_token);
        let response = self.get("mentions", &url).await?;
        let envelope: TimelineEnvelope =
            parse_http_response_json(response, "mentions timeline").await?;

        let mut statuses = envelope.data.unwrap_or_default();
        if let Some(users) = envelope.includes.and_then(|i| i.users) {
            attach_authors(&mut statuses, &users);
        }

        let meta = envelope.meta;
        Ok(MentionsPage {
            newest_id: meta.as_ref().and_then(|m| m.newest_id),
            next_token: meta.and_then(|m| m.next_token),
            statuses,
        })
    }

    async fn status(&self, id: u64, extended: bool) -> Result<Status, ApiError> {
        let url = self.status_url(id, extended);
        let response = self.get(&format!("status:{id}"), &url).await?;
        let envelope: StatusEnvelope =
            parse_http_response_json(response, "status lookup").await?;

        let mut status = envelope.data.ok_or_else(|| ApiError::NotFound {
            resource: format!("status {id}"),
        })?;
        if let Some(users) = envelope.includes.and_then(|i| i.users) {
            attach_authors(std::slice::from_mut(&mut status), &users);
        }
        Ok(status)
    }

    async fn post_status(
        &self,
        text: &str,
        in_reply_to: Option<u64>,
    ) -> Result<Status, ApiError> {
        let url = format!("{api}/statuses", api = self.api_base);

        let mut body = serde_json::json!({ "text": text });
        if let Some(reply_id) = in_reply_to {
            body["reply"] = serde_json::json!({
                "in_reply_to_status_id": reply_id.to_string()
            });
        }

        debug!(%url, "Posting status");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        let response = self.check_status("post", response).await?;

        let envelope: StatusEnvelope = parse_http_response_json(response, "post status").await?;
        envelope.data.ok_or_else(|| ApiError::Api {
            status: 200,
            message: "post response carried no data".to_string(),
        })
    }
}

/// Resolves `author_id` references into full author data from the includes.
fn attach_authors(statuses: &mut [Status], users: &[User]) {
    if users.is_empty() {
        return;
    }
    let user_map: HashMap<u64, &User> = users.iter().map(|u| (u.id, u)).collect();
    for status in statuses {
        if let Some(author_id) = status.author_id {
            if let Some(user) = user_map.get(&author_id) {
                status.author = (*user).clone();
            }
        }
    }
}

fn rate_limit_reset(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Extracts a status ID from a URL or returns the ID if it's already one.
pub fn parse_status_id(url_or_id: &str) -> Result<u64> {
    if url_or_id.is_empty() {
        bail!("Status ID cannot be empty");
    }

    // If it's already just a numeric ID, use it
    if url_or_id.chars().all(|c| c.is_ascii_digit()) {
        return url_or_id
            .parse()
            .with_context(|| format!("Status ID out of range: {url_or_id}"));
    }

    // Try to parse as URL
    if let Ok(parsed_url) = Url::parse(url_or_id) {
        if parsed_url
            .host_str()
            .is_some_and(|h| h.contains("twitter.com") || h.contains("x.com"))
        {
            let path_segments: Vec<&str> = parsed_url
                .path_segments()
                .map_or(Vec::new(), |s| s.collect());

            // Path format should be /username/status/status_id
            if path_segments.len() >= 3 && path_segments[1] == "status" {
                return path_segments[2]
                    .parse()
                    .with_context(|| format!("Invalid status ID in URL: {url_or_id}"));
            }
        }
    }

    // Fall back to a regex for URLs that don't parse cleanly
    let re = Regex::new(r"(?:twitter\.com|x\.com)/\w+/status/(\d+)")
        .context("Failed to compile status ID regex")?;
    if let Some(captures) = re.captures(url_or_id) {
        if let Some(id_match) = captures.get(1) {
            return id_match
                .as_str()
                .parse()
                .with_context(|| format!("Invalid status ID in URL: {url_or_id}"));
        }
    }

    bail!("Could not extract a status ID from: {url_or_id}")
}
