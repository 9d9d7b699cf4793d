//! Infrastructure layer - external adapters (HTTP, storage, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod inbox_client;
pub mod kv_store;

pub use config::{ensure_config_exists_in, load_config};
pub use inbox_client::{HttpInboxClient, InboxApi};
pub use kv_store::{KeyValueStore, SqliteKvStore};
