//! Conversation assembly.
//!
//! Requests message batches newest-first for one counterpart, using the
//! oldest message time seen in each batch as the cursor for the next one,
//! until a batch is flagged as the last page. Batches are folded into an
//! [`Assembly`], sorted once at the end and then rendered and persisted.
//! Any failure aborts the run before anything is written.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{AppError, Conversation, Message, ProgressEvent, Result};
use crate::infrastructure::InboxApi;

use super::checkpoint::Checkpoint;
use super::formatter::{render, ExportFormat};
use super::notifier::Notifier;
use super::parser::{parse_conversation_page, ConversationPage};

/// Loop state threaded through every batch.
#[derive(Debug)]
struct Assembly {
    conversation_id: Option<String>,
    messages: Vec<Message>,
    seen_ids: HashSet<String>,
    cursor: Option<i64>,
    last_page: bool,
    batch: usize,
}

impl Default for Assembly {
    fn default() -> Self {
        Self {
            conversation_id: None,
            messages: Vec::new(),
            seen_ids: HashSet::new(),
            cursor: None,
            last_page: false,
            batch: 1,
        }
    }
}

impl Assembly {
    fn absorb(mut self, page: ConversationPage) -> Self {
        if self.batch == 1 {
            self.conversation_id = page.conversation_id.clone();
        }

        if page.dropped > 0 {
            tracing::debug!(batch = self.batch, dropped = page.dropped, "Dropped empty message entries");
        }

        let oldest = page.oldest_timestamp();
        self.last_page = page.last_page;

        for message in page.messages {
            // Pages may overlap on the cursor boundary.
            if !message.id.is_empty() && !self.seen_ids.insert(message.id.clone()) {
                continue;
            }
            self.messages.push(message);
        }

        if !self.last_page {
            match oldest {
                Some(ts) if self.cursor.is_some_and(|prev| ts >= prev) => {
                    tracing::warn!(batch = self.batch, cursor = ts, "Message cursor did not move back, stopping");
                    self.last_page = true;
                }
                Some(ts) => self.cursor = Some(ts),
                None => {
                    tracing::warn!(batch = self.batch, "Batch has no valid timestamp, stopping");
                    self.last_page = true;
                }
            }
        }

        self.batch += 1;
        self
    }

    fn finish(mut self, identity: &str) -> Conversation {
        // Stable: equal timestamps keep arrival order.
        self.messages.sort_by_key(|m| m.created_at);

        Conversation {
            conversation_id: self.conversation_id.unwrap_or_default(),
            counterpart_identity: identity.to_string(),
            messages: self.messages,
        }
    }
}

/// Assembles the full conversation with one counterpart.
pub struct ConversationAssembler {
    api: Arc<dyn InboxApi>,
    checkpoint: Checkpoint,
    notifier: Notifier,
    delay: Duration,
}

impl ConversationAssembler {
    #[must_use]
    pub fn new(
        api: Arc<dyn InboxApi>,
        checkpoint: Checkpoint,
        notifier: Notifier,
        delay: Duration,
    ) -> Self {
        Self {
            api,
            checkpoint,
            notifier,
            delay,
        }
    }

    /// Fetches, assembles, renders and persists the conversation.
    ///
    /// # Errors
    /// Returns `MissingTarget` for an empty identity, or the first transport,
    /// payload or storage error. An error event is emitted in every case.
    pub async fn fetch_conversation(&self, identity: &str) -> Result<Conversation> {
        let identity = identity.trim();
        if identity.is_empty() {
            let err = AppError::MissingTarget;
            self.notifier
                .emit(ProgressEvent::Error {
                    message: err.to_string(),
                })
                .await;
            return Err(err);
        }

        match self.assemble(identity).await {
            Ok(conversation) => {
                self.notifier
                    .emit(ProgressEvent::ConversationComplete {
                        identity: identity.to_string(),
                        message_count: conversation.message_count(),
                    })
                    .await;
                Ok(conversation)
            }
            Err(e) => {
                tracing::warn!(%identity, error = %e, "Conversation extraction failed");
                self.notifier
                    .emit(ProgressEvent::Error {
                        message: format!("Failed to extract conversation with {identity}: {e}"),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn assemble(&self, identity: &str) -> Result<Conversation> {
        tracing::info!(%identity, "Extracting conversation");
        let start = std::time::Instant::now();

        let format = self.checkpoint.date_format().await?;
        let mut state = Assembly::default();

        while !state.last_page {
            self.notifier
                .emit(ProgressEvent::ConversationBatch {
                    identity: identity.to_string(),
                    batch: state.batch,
                })
                .await;

            tracing::debug!(batch = state.batch, cursor = ?state.cursor, "Requesting message batch");
            let payload = self.api.fetch_conversation(identity, state.cursor).await?;
            let page = parse_conversation_page(&payload, format)?;

            state = state.absorb(page);

            if !state.last_page {
                tokio::time::sleep(self.delay).await;
            }
        }

        let batches = state.batch - 1;
        let conversation = state.finish(identity);

        let markdown = render(&conversation, format, ExportFormat::Markdown)?;
        let json = render(&conversation, format, ExportFormat::Json)?;
        self.checkpoint
            .save_current(&conversation, &markdown, &json)
            .await?;

        tracing::info!(
            %identity,
            messages = conversation.message_count(),
            batches,
            duration_ms = start.elapsed().as_millis(),
            "Conversation assembled"
        );

        Ok(conversation)
    }
}
