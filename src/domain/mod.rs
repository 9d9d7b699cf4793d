//! Domain layer - core types for inbox data.
//!
//! This layer contains pure domain models, events and error types
//! without any external I/O.

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use config::{ApiConfig, AppConfig, NotifyConfig, PaginationConfig};
pub use error::{AppError, Result};
pub use events::{Command, ProgressEvent};
pub use models::{
    format_bytes, Attachment, Contact, Conversation, DateFormat, Message, RepliedMessage,
};
