use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::addressing::MentionSpan;

/// Platform API errors surfaced to the polling machinery.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded (reset at {reset:?})")]
    RateLimited { reset: Option<u64> },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// True for the transient rate-limit signal that cooldown loops recover
    /// from locally; everything else is fatal for the current operation.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// The authenticated bot identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(deserialize_with = "id_fmt::de_id")]
    pub id: u64,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "id_fmt::de_id")]
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

/// A user-mention entity inside a status text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionEntity {
    pub start: usize,
    pub end: usize,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusEntities {
    pub mentions: Option<Vec<MentionEntity>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedStatus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "id_fmt::de_id")]
    pub id: u64,
}

/// Raw status payload as returned by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    #[serde(deserialize_with = "id_fmt::de_id")]
    pub id: u64,

    /// Status content; a payload without text is treated as malformed by the
    /// normalization step.
    #[serde(default)]
    pub text: Option<String>,

    /// Author ID as sent on the wire; resolved into `author` from the
    /// response includes.
    #[serde(default, deserialize_with = "id_fmt::de_opt_id")]
    pub author_id: Option<u64>,

    #[serde(default)]
    pub author: User,

    /// Set when `text` is a shortened preview and the full content must be
    /// fetched with the extended variant.
    #[serde(default)]
    pub truncated: bool,

    #[serde(default)]
    pub entities: Option<StatusEntities>,

    #[serde(default)]
    pub referenced_statuses: Option<Vec<ReferencedStatus>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Status {
    /// Target status when this one is a reply inside a thread.
    pub fn reply_target(&self) -> Option<u64> {
        self.referenced_statuses
            .as_ref()?
            .iter()
            .find(|r| r.kind == "replied_to")
            .map(|r| r.id)
    }

    /// Mention spans from the entities, in wire order.
    pub fn mention_spans(&self) -> Vec<MentionSpan> {
        self.entities
            .as_ref()
            .and_then(|e| e.mentions.as_ref())
            .map(|mentions| {
                mentions
                    .iter()
                    .map(|m| MentionSpan {
                        start: m.start,
                        end: m.end,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One page of the mentions timeline, newest first.
#[derive(Debug, Clone, Default)]
pub struct MentionsPage {
    pub statuses: Vec<Status>,
    pub newest_id: Option<u64>,
    pub next_token: Option<String>,
}

/// Operations the bot needs from the remote platform.
///
/// Implemented by [`crate::twitter::TwitterClient`]; test code substitutes a
/// scripted in-memory fake.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Looks up the authenticated account.
    async fn verify_credentials(&self) -> Result<Account, ApiError>;

    /// Fetches one page of mentions newer than `since_id`, newest first.
    /// `page_token` walks to older pages of the same window.
    async fn mentions_page(
        &self,
        since_id: Option<u64>,
        page_token: Option<&str>,
    ) -> Result<MentionsPage, ApiError>;

    /// Fetches a single status; `extended` requests the untruncated text.
    async fn status(&self, id: u64, extended: bool) -> Result<Status, ApiError>;

    /// Posts a status, optionally threaded as a reply.
    async fn post_status(&self, text: &str, in_reply_to: Option<u64>)
        -> Result<Status, ApiError>;
}

/// Platform IDs arrive as JSON strings or numbers depending on the endpoint.
pub(crate) mod id_fmt {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(u64),
        Str(String),
    }

    pub fn de_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match IdRepr::deserialize(deserializer)? {
            IdRepr::Num(n) => Ok(n),
            IdRepr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }

    pub fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<IdRepr>::deserialize(deserializer)? {
            None => None,
            Some(IdRepr::Num(n)) => Some(n),
            Some(IdRepr::Str(s)) => Some(s.parse().map_err(serde::de::Error::custom)?),
        })
    }
}
