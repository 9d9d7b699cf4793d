//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::{ContactFormat, ExportFormat};
use crate::domain::DateFormat;

/// Fiverr Inbox Export - page through an authenticated Fiverr inbox and export
/// contacts and conversations.
///
/// Typical flow: inbox-export fetch-contacts | target <name> | extract | export
#[derive(Parser, Debug)]
#[command(name = "inbox-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration file if none exists.
    Init,

    /// Page through the whole contact list and store it.
    FetchContacts,

    /// List stored contacts (summary table).
    Contacts {
        /// Maximum number of contacts to show (0 = all).
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Set the counterpart the next extraction targets.
    Target {
        /// Counterpart username.
        identity: String,
    },

    /// Assemble the full conversation with the target counterpart.
    Extract {
        /// Counterpart username (sets the target first).
        identity: Option<String>,
    },

    /// Print the stored conversation.
    Show {
        /// Output format: md, json, csv, or txt.
        #[arg(short, long, default_value = "md")]
        format: String,
    },

    /// Export the stored conversation to date-stamped files.
    Export {
        /// Output format: md, json, csv, txt, or all.
        #[arg(short, long, default_value = "all")]
        format: String,

        /// Output directory (defaults to the data directory's exports/).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Export the stored contact list.
    ExportContacts {
        /// Output format: json or csv.
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output directory (defaults to the data directory's exports/).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show or set the date format (MM/DD/YYYY, DD/MM/YYYY, YYYY-MM-DD, DD.MM.YYYY).
    DateFormat {
        /// New date format.
        value: Option<String>,
    },

    /// Show storage paths and stored state.
    Status,
}

/// Parse a conversation export format; `all` selects every format.
pub fn parse_export_formats(value: &str) -> Result<Vec<ExportFormat>, String> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(ExportFormat::ALL.to_vec());
    }
    value.parse().map(|format| vec![format])
}

/// Parse a single conversation output format.
pub fn parse_export_format(value: &str) -> Result<ExportFormat, String> {
    value.parse()
}

/// Parse a contact export format.
pub fn parse_contact_format(value: &str) -> Result<ContactFormat, String> {
    value.parse()
}

/// Parse a date format preference.
pub fn parse_date_format(value: &str) -> Result<DateFormat, String> {
    value.parse()
}
