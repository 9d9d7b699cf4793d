//! Export file writing.
//!
//! Writes rendered conversations and contact snapshots into an export
//! directory under date-stamped names, and reports on what is stored there.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::{format_bytes, AppError, Contact, Conversation, DateFormat, Result};

use super::formatter::{render, render_contacts, ContactFormat, ExportFormat};

/// Writes export files into one directory.
pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ensure export directory exists.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| AppError::io("Failed to create exports directory", e))
    }

    /// Writes `conv` once per requested format.
    ///
    /// Files are named `fiverr_<identity>_<date>.<ext>`.
    ///
    /// # Errors
    /// Returns error if rendering or any write fails.
    pub fn write_conversation(
        &self,
        conv: &Conversation,
        date_format: DateFormat,
        formats: &[ExportFormat],
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>> {
        self.ensure_dir()?;
        let stem = conv.filename(date);

        let mut written = Vec::with_capacity(formats.len());
        for &format in formats {
            let content = render(conv, date_format, format)?;
            let path = self.dir.join(format!("{stem}.{}", format.extension()));
            write_file(&path, &content)?;
            tracing::info!(path = %path.display(), %format, "Exported conversation");
            written.push(path);
        }

        Ok(written)
    }

    /// Writes the contact snapshot as `fiverr_contacts_<date>.<ext>`.
    ///
    /// # Errors
    /// Returns error if rendering or the write fails.
    pub fn write_contacts(
        &self,
        contacts: &[Contact],
        date_format: DateFormat,
        format: ContactFormat,
        date: NaiveDate,
    ) -> Result<PathBuf> {
        self.ensure_dir()?;
        let content = render_contacts(contacts, date_format, format)?;
        let path = self.dir.join(format!(
            "fiverr_contacts_{}.{}",
            date.format("%Y-%m-%d"),
            format.extension()
        ));
        write_file(&path, &content)?;
        tracing::info!(path = %path.display(), count = contacts.len(), "Exported contacts");
        Ok(path)
    }

    /// Number and total size of files in the export directory.
    pub fn summary(&self) -> Result<ExportSummary> {
        if !self.dir.exists() {
            return Ok(ExportSummary::default());
        }

        let entries = fs::read_dir(&self.dir)
            .map_err(|e| AppError::io("Failed to read exports directory", e))?;

        let mut summary = ExportSummary::default();
        for entry in entries.flatten() {
            let metadata = entry
                .metadata()
                .map_err(|e| AppError::io("Failed to read file metadata", e))?;
            if metadata.is_file() {
                summary.file_count += 1;
                summary.total_bytes += metadata.len();
            }
        }

        Ok(summary)
    }
}

/// Contents of the export directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub file_count: usize,
    pub total_bytes: u64,
}

impl ExportSummary {
    /// Format total bytes as human readable.
    #[must_use]
    pub fn total_human(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}
