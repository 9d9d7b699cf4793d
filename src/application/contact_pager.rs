//! Contact pagination.
//!
//! Walks the contacts endpoint backwards in time using the oldest activity
//! timestamp of each batch as the next cursor, and checkpoints the merged
//! contact list after every batch. Failures end the run but never escape it:
//! whatever was persisted before the failure stays available.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::{Contact, ProgressEvent, Result};
use crate::infrastructure::InboxApi;

use super::checkpoint::Checkpoint;
use super::notifier::Notifier;
use super::parser::parse_contacts_batch;

/// Contacts merged by identity, in order of first discovery.
#[derive(Debug, Clone, Default)]
pub struct ContactAccumulator {
    contacts: Vec<Contact>,
    index: HashMap<String, usize>,
}

impl ContactAccumulator {
    /// Folds a batch into the accumulator.
    ///
    /// A repeated identity keeps its original position; its activity time is
    /// only replaced by a newer one.
    #[must_use]
    pub fn merge(mut self, batch: Vec<Contact>) -> Self {
        for contact in batch {
            if let Some(&pos) = self.index.get(&contact.identity) {
                tracing::debug!(identity = %contact.identity, "Duplicate contact across batches");
                let existing = &mut self.contacts[pos];
                if contact.most_recent_activity_time > existing.most_recent_activity_time {
                    existing.most_recent_activity_time = contact.most_recent_activity_time;
                }
            } else {
                self.index
                    .insert(contact.identity.clone(), self.contacts.len());
                self.contacts.push(contact);
            }
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Contact] {
        &self.contacts
    }

    #[must_use]
    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}

/// Outcome of a full contact run.
#[derive(Debug, Clone, Default)]
pub struct ContactFetchReport {
    pub contacts: Vec<Contact>,
    /// Number of batch requests issued.
    pub batches: usize,
    /// Error message of the batch that ended the run, if any.
    pub failure: Option<String>,
}

/// What the loop does after a batch.
enum Step {
    Continue(i64),
    Exhausted,
    Failed(String),
}

/// Pages through every contact in the inbox.
pub struct ContactPager {
    api: Arc<dyn InboxApi>,
    checkpoint: Checkpoint,
    notifier: Notifier,
    delay: Duration,
}

impl ContactPager {
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

    /// Fetches all contacts. Never fails; errors are reported as events and
    /// recorded in the report.
    pub async fn fetch_all_contacts(&self) -> ContactFetchReport {
        tracing::info!("Fetching all contacts");
        let start = std::time::Instant::now();

        let mut acc = ContactAccumulator::default();
        let mut batches = 0;
        let mut failure = None;

        if let Err(e) = self.reset().await {
            let message = format!("Failed to reset stored contacts: {e}");
            self.notifier
                .emit(ProgressEvent::Error {
                    message: message.clone(),
                })
                .await;
            failure = Some(message);
        } else {
            let mut cursor: Option<i64> = None;
            loop {
                batches += 1;
                let (next_acc, step) = self.step(acc, batches, cursor).await;
                acc = next_acc;

                match step {
                    Step::Continue(next) if cursor.is_some_and(|prev| next >= prev) => {
                        tracing::warn!(cursor = next, "Contact cursor did not move back, stopping");
                        break;
                    }
                    Step::Continue(next) => {
                        cursor = Some(next);
                        tokio::time::sleep(self.delay).await;
                    }
                    Step::Exhausted => break,
                    Step::Failed(message) => {
                        self.notifier
                            .emit(ProgressEvent::ContactsBatchFailed {
                                batch: batches,
                                message: message.clone(),
                            })
                            .await;
                        failure = Some(message);
                        break;
                    }
                }
            }
        }

        if let Some(ref message) = failure {
            tracing::warn!(batches, error = %message, "Contact run ended early");
        } else if acc.is_empty() {
            tracing::info!("Inbox has no contacts");
        }

        tracing::info!(
            total = acc.len(),
            batches,
            duration_ms = start.elapsed().as_millis(),
            "Contact run finished"
        );

        self.notifier
            .emit(ProgressEvent::ContactsComplete { total: acc.len() })
            .await;

        ContactFetchReport {
            contacts: acc.into_contacts(),
            batches,
            failure,
        }
    }

    /// Clears the stored snapshot and records the run start.
    async fn reset(&self) -> Result<()> {
        self.checkpoint.save_contacts(&[]).await?;
        self.checkpoint.save_run_started_at(Utc::now()).await
    }

    /// Requests one batch and folds it into `acc`.
    async fn step(
        &self,
        acc: ContactAccumulator,
        batch: usize,
        cursor: Option<i64>,
    ) -> (ContactAccumulator, Step) {
        tracing::debug!(batch, ?cursor, "Requesting contacts batch");

        let response = match self.api.fetch_contacts(cursor).await {
            Ok(value) => value,
            Err(e) => return (acc, Step::Failed(e.to_string())),
        };

        let Some(contacts) = parse_contacts_batch(&response) else {
            tracing::debug!(batch, "Empty contacts batch, paging done");
            return (acc, Step::Exhausted);
        };

        let batch_size = contacts.len();
        let next_cursor = contacts
            .iter()
            .filter_map(|c| c.most_recent_activity_time)
            .min();

        let acc = acc.merge(contacts);

        if let Err(e) = self.persist(&acc).await {
            return (acc, Step::Failed(e.to_string()));
        }

        self.notifier
            .emit(ProgressEvent::ContactsBatch {
                batch,
                batch_size,
                total: acc.len(),
            })
            .await;

        let step = next_cursor.map_or(Step::Exhausted, Step::Continue);
        (acc, step)
    }

    async fn persist(&self, acc: &ContactAccumulator) -> Result<()> {
        self.checkpoint.save_contacts(acc.as_slice()).await?;
        self.checkpoint.save_last_fetch_time(Utc::now()).await
    }
}
