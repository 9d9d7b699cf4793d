//! Application layer - use cases and orchestration.
//!
//! This layer contains the pagination and reassembly pipeline, the
//! progress channel, and the rendering of inbox data.

pub mod checkpoint;
pub mod contact_pager;
pub mod conversation_assembler;
pub mod exporter;
pub mod formatter;
pub mod notifier;
pub mod parser;
pub mod run_registry;
pub mod service;

pub use exporter::ExportWriter;
pub use formatter::{
    format_contacts_table, format_conversation_stats, ContactFormat, ExportFormat,
};
pub use notifier::Notifier;
pub use service::{ExporterService, Outcome};
