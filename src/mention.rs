use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::addressing::{self, MentionSpan};
use crate::api::Status;

/// Failure to turn a raw status into a processable mention.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("status {id} has no text payload")]
    MissingText { id: u64 },
}

/// An inbound mention, enriched once and immutable for the rest of the
/// dispatch cycle.
#[derive(Debug, Clone)]
pub struct Mention {
    pub id: u64,
    pub author_id: u64,
    pub author_username: String,

    /// Full raw text. Callers resolve truncated previews before building the
    /// mention, so this is already the extended text where one existed.
    pub text: String,

    /// Whether the source payload was flagged as a shortened preview.
    pub truncated: bool,

    /// Mention spans from the platform entities, in position order.
    pub spans: Vec<MentionSpan>,

    /// Status this mention replies to, when part of a thread.
    pub in_reply_to: Option<u64>,

    pub created_at: Option<DateTime<Utc>>,

    addressed: String,
}

impl Mention {
    /// Builds a mention from a raw status.
    pub fn from_status(status: Status) -> Result<Self, NormalizeError> {
        let text = status
            .text
            .clone()
            .ok_or(NormalizeError::MissingText { id: status.id })?;
        let spans = status.mention_spans();
        let addressed = addressing::addressed_text(&text, &spans);
        Ok(Self {
            id: status.id,
            author_id: status.author.id,
            author_username: status.author.username.clone(),
            truncated: status.truncated,
            in_reply_to: status.reply_target(),
            created_at: status.created_at,
            text,
            spans,
            addressed,
        })
    }

    /// Payload after stripping the leading mention block.
    pub fn addressed_text(&self) -> &str {
        &self.addressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MentionEntity, ReferencedStatus, StatusEntities};
    use crate::api::testing::make_status;

    #[test]
    fn test_from_status_computes_addressed_text() {
        let mut status = make_status(10, 7, "alice", "@bot @helper please respond");
        status.entities = Some(StatusEntities {
            mentions: Some(vec![
                MentionEntity {
                    start: 0,
                    end: 4,
                    username: "bot".to_string(),
                },
                MentionEntity {
                    start: 5,
                    end: 12,
                    username: "helper".to_string(),
                },
            ]),
        });

        let mention = Mention::from_status(status).unwrap();
        assert_eq!(mention.id, 10);
        assert_eq!(mention.author_username, "alice");
        assert_eq!(mention.addressed_text(), "please respond");
        assert_eq!(mention.spans.len(), 2);
    }

    #[test]
    fn test_missing_text_is_rejected() {
        let mut status = make_status(11, 7, "alice", "irrelevant");
        status.text = None;

        let err = Mention::from_status(status).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingText { id: 11 }));
    }

    #[test]
    fn test_reply_target_is_extracted() {
        let mut status = make_status(12, 7, "alice", "@bot hi");
        status.referenced_statuses = Some(vec![ReferencedStatus {
            kind: "replied_to".to_string(),
            id: 5,
        }]);

        let mention = Mention::from_status(status).unwrap();
        assert_eq!(mention.in_reply_to, Some(5));
    }

    #[test]
    fn test_text_without_leading_mentions_is_kept_whole() {
        let status = make_status(13, 7, "alice", "hi @bot");
        let mention = Mention::from_status(status).unwrap();
        assert_eq!(mention.addressed_text(), "hi @bot");
    }
}
