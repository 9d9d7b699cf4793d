//! Command handling for the inbox exporter.
//!
//! Wires the pagination components to storage, the progress channel and the
//! run registry, and exposes the preference and export operations the CLI
//! drives.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{AppConfig, AppError, Command, Conversation, DateFormat, ProgressEvent, Result};
use crate::infrastructure::{InboxApi, KeyValueStore};

use super::checkpoint::Checkpoint;
use super::contact_pager::{ContactFetchReport, ContactPager};
use super::conversation_assembler::ConversationAssembler;
use super::exporter::ExportWriter;
use super::formatter::{render, ContactFormat, ExportFormat};
use super::notifier::Notifier;
use super::run_registry::{RunGuard, RunRegistry, RunTarget};

/// What a handled command produced.
#[derive(Debug)]
pub enum Outcome {
    Contacts(ContactFetchReport),
    Conversation(Conversation),
}

/// Snapshot of stored state.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub contact_count: usize,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub target_identity: Option<String>,
    pub date_format: DateFormat,
    /// Counterpart and message count of the stored conversation.
    pub current_conversation: Option<(String, usize)>,
}

/// Service running commands against the inbox API and local storage.
pub struct ExporterService {
    config: AppConfig,
    checkpoint: Checkpoint,
    notifier: Notifier,
    runs: RunRegistry,
    contacts: ContactPager,
    assembler: ConversationAssembler,
}

impl ExporterService {
    #[must_use]
    pub fn new(
        config: AppConfig,
        api: Arc<dyn InboxApi>,
        store: Arc<dyn KeyValueStore>,
        notifier: Notifier,
    ) -> Self {
        let checkpoint = Checkpoint::new(store);
        let contacts = ContactPager::new(
            Arc::clone(&api),
            checkpoint.clone(),
            notifier.clone(),
            config.pagination.contact_delay(),
        );
        let assembler = ConversationAssembler::new(
            api,
            checkpoint.clone(),
            notifier.clone(),
            config.pagination.message_delay(),
        );

        Self {
            config,
            checkpoint,
            notifier,
            runs: RunRegistry::new(),
            contacts,
            assembler,
        }
    }

    #[must_use]
    pub const fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Dispatches a command from the messaging channel.
    ///
    /// # Errors
    /// Returns `RunInProgress` when the same target is already running,
    /// `MissingTarget` when no target is stored, or the run's own error.
    pub async fn handle(&self, command: Command) -> Result<Outcome> {
        tracing::debug!(?command, "Handling command");
        match command {
            Command::FetchAllContacts => self.fetch_all_contacts().await.map(Outcome::Contacts),
            Command::ExtractConversation => {
                self.extract_conversation().await.map(Outcome::Conversation)
            }
        }
    }

    /// Runs the contact pager under the contacts run slot.
    ///
    /// # Errors
    /// Returns `RunInProgress` if a contact run is already in flight.
    pub async fn fetch_all_contacts(&self) -> Result<ContactFetchReport> {
        let _guard = self.acquire(RunTarget::Contacts).await?;
        Ok(self.contacts.fetch_all_contacts().await)
    }

    /// Assembles the conversation with the stored target identity.
    ///
    /// # Errors
    /// Returns `MissingTarget` if no target is stored, `RunInProgress` if the
    /// same conversation is already being assembled, or the assembly error.
    pub async fn extract_conversation(&self) -> Result<Conversation> {
        let Some(identity) = self.checkpoint.target_identity().await? else {
            let err = AppError::MissingTarget;
            self.notifier
                .emit(ProgressEvent::Error {
                    message: err.to_string(),
                })
                .await;
            return Err(err);
        };

        let _guard = self
            .acquire(RunTarget::Conversation(identity.clone()))
            .await?;
        self.assembler.fetch_conversation(&identity).await
    }

    async fn acquire(&self, target: RunTarget) -> Result<RunGuard> {
        match self.runs.try_acquire(target) {
            Ok(guard) => Ok(guard),
            Err(e) => {
                self.notifier
                    .emit(ProgressEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Stores the counterpart the next extraction will target.
    ///
    /// # Errors
    /// Returns `MissingTarget` for a blank identity.
    pub async fn set_target(&self, identity: &str) -> Result<()> {
        if identity.trim().is_empty() {
            return Err(AppError::MissingTarget);
        }
        self.checkpoint.save_target_identity(identity).await?;
        tracing::info!(identity = identity.trim(), "Target identity set");
        Ok(())
    }

    /// Stores the date-format preference and re-renders the stored
    /// conversation under it. Returns whether a conversation was re-rendered.
    ///
    /// # Errors
    /// Returns error if the preference or the re-rendered conversation cannot
    /// be stored.
    pub async fn set_date_format(&self, format: DateFormat) -> Result<bool> {
        self.checkpoint.save_date_format(format).await?;
        tracing::info!(%format, "Date format set");

        let Some(mut conversation) = self.checkpoint.current_conversation().await? else {
            return Ok(false);
        };

        conversation.apply_date_format(format);
        let markdown = render(&conversation, format, ExportFormat::Markdown)?;
        let json = render(&conversation, format, ExportFormat::Json)?;
        self.checkpoint
            .save_current(&conversation, &markdown, &json)
            .await?;

        tracing::debug!(
            identity = %conversation.counterpart_identity,
            "Re-rendered stored conversation"
        );
        Ok(true)
    }

    /// Renders the stored conversation under the current preference.
    ///
    /// # Errors
    /// Returns `InvalidData` if nothing has been extracted yet.
    pub async fn render_current(&self, format: ExportFormat) -> Result<String> {
        let conversation = self.stored_conversation().await?;
        let date_format = self.checkpoint.date_format().await?;
        render(&conversation, date_format, format)
    }

    /// Writes the stored conversation in each requested format.
    ///
    /// # Errors
    /// Returns `InvalidData` if nothing has been extracted yet, or an I/O error.
    pub async fn export_conversation(
        &self,
        formats: &[ExportFormat],
        dir: Option<PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let conversation = self.stored_conversation().await?;
        let date_format = self.checkpoint.date_format().await?;
        self.writer(dir)
            .write_conversation(&conversation, date_format, formats, today())
    }

    /// Writes the stored contact snapshot.
    ///
    /// # Errors
    /// Returns `InvalidData` if no contacts are stored, or an I/O error.
    pub async fn export_contacts(
        &self,
        format: ContactFormat,
        dir: Option<PathBuf>,
    ) -> Result<PathBuf> {
        let contacts = self.checkpoint.contacts().await?;
        if contacts.is_empty() {
            return Err(AppError::InvalidData {
                message: "No contacts stored. Run fetch-contacts first.".into(),
            });
        }
        let date_format = self.checkpoint.date_format().await?;
        self.writer(dir)
            .write_contacts(&contacts, date_format, format, today())
    }

    /// Snapshot of the stored state.
    ///
    /// # Errors
    /// Returns error if a stored value cannot be read.
    pub async fn status(&self) -> Result<ServiceStatus> {
        let current_conversation = self
            .checkpoint
            .current_conversation()
            .await?
            .map(|c| (c.counterpart_identity.clone(), c.message_count()));

        Ok(ServiceStatus {
            contact_count: self.checkpoint.contacts().await?.len(),
            last_fetch_time: self.checkpoint.last_fetch_time().await?,
            target_identity: self.checkpoint.target_identity().await?,
            date_format: self.checkpoint.date_format().await?,
            current_conversation,
        })
    }

    async fn stored_conversation(&self) -> Result<Conversation> {
        self.checkpoint
            .current_conversation()
            .await?
            .ok_or_else(|| AppError::InvalidData {
                message: "No conversation stored. Run extract first.".into(),
            })
    }

    fn writer(&self, dir: Option<PathBuf>) -> ExportWriter {
        ExportWriter::new(dir.unwrap_or_else(|| self.config.exports_dir()))
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
