//! Commands consumed and events produced on the messaging channel.

use serde::{Deserialize, Serialize};

/// Commands a UI surface can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Page through the whole contact list.
    FetchAllContacts,
    /// Assemble the conversation with the stored target identity.
    ExtractConversation,
}

/// Progress, completion and error notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ContactsBatch {
        batch: usize,
        batch_size: usize,
        total: usize,
    },
    ContactsBatchFailed {
        batch: usize,
        message: String,
    },
    ContactsComplete {
        total: usize,
    },
    ConversationBatch {
        identity: String,
        batch: usize,
    },
    ConversationComplete {
        identity: String,
        message_count: usize,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::ContactsBatch {
                batch,
                batch_size,
                total,
            } => format!("Batch {batch}: fetched {batch_size} contacts ({total} total)"),
            Self::ContactsBatchFailed { batch, message } => {
                format!("Batch {batch} failed: {message}")
            }
            Self::ContactsComplete { total } => {
                format!("Finished fetching contacts: {total} total")
            }
            Self::ConversationBatch { identity, batch } => {
                format!("Fetching batch {batch} of messages with {identity}")
            }
            Self::ConversationComplete {
                identity,
                message_count,
            } => format!("Extracted {message_count} messages with {identity}"),
            Self::Error { message } => message.clone(),
        }
    }

    /// Whether this event ends a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ContactsComplete { .. } | Self::ConversationComplete { .. } | Self::Error { .. }
        )
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::ContactsBatchFailed { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::ContactsBatch {
            batch: 2,
            batch_size: 10,
            total: 25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "contacts_batch");
        assert_eq!(json["total"], 25);
    }

    #[test]
    fn test_command_wire_names() {
        let json = serde_json::to_string(&Command::ExtractConversation).unwrap();
        assert_eq!(json, "\"EXTRACT_CONVERSATION\"");
        let parsed: Command = serde_json::from_str("\"FETCH_ALL_CONTACTS\"").unwrap();
        assert_eq!(parsed, Command::FetchAllContacts);
    }

    #[test]
    fn test_summary_and_flags() {
        let done = ProgressEvent::ConversationComplete {
            identity: "bob".into(),
            message_count: 3,
        };
        assert_eq!(done.summary(), "Extracted 3 messages with bob");
        assert!(done.is_terminal());
        assert!(!done.is_error());

        let failed = ProgressEvent::ContactsBatchFailed {
            batch: 4,
            message: "timeout".into(),
        };
        assert!(failed.is_error());
        assert!(!failed.is_terminal());
    }
}
