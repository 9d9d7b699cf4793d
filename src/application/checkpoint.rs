//! Typed access to the key-value store.
//!
//! Every value is stored as a whole JSON document under a fixed key; there
//! are no partial updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{AppError, Contact, Conversation, DateFormat, Result};
use crate::infrastructure::KeyValueStore;

/// Storage keys.
pub mod keys {
    pub const CONTACTS: &str = "contacts";
    pub const LAST_FETCH_TIME: &str = "last_fetch_time";
    pub const CONTACTS_RUN_STARTED_AT: &str = "contacts_run_started_at";
    pub const CURRENT_CONVERSATION: &str = "current_conversation";
    pub const CURRENT_MARKDOWN: &str = "current_markdown";
    pub const CURRENT_JSON: &str = "current_json";
    pub const DATE_FORMAT: &str = "date_format";
    pub const TARGET_IDENTITY: &str = "target_identity";
}

/// Typed facade over a [`KeyValueStore`].
#[derive(Clone)]
pub struct Checkpoint {
    store: Arc<dyn KeyValueStore>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(AppError::json_parse),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized + Sync>(&self, key: &str, value: &T) -> Result<()> {
        self.store.set(key, &encode(value)?).await
    }

    /// Last persisted contact snapshot, empty if none.
    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.read(keys::CONTACTS).await?.unwrap_or_default())
    }

    pub async fn save_contacts(&self, contacts: &[Contact]) -> Result<()> {
        self.write(keys::CONTACTS, contacts).await
    }

    pub async fn last_fetch_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.read(keys::LAST_FETCH_TIME).await
    }

    pub async fn save_last_fetch_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.write(keys::LAST_FETCH_TIME, &at).await
    }

    pub async fn save_run_started_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.write(keys::CONTACTS_RUN_STARTED_AT, &at).await
    }

    pub async fn current_conversation(&self) -> Result<Option<Conversation>> {
        self.read(keys::CURRENT_CONVERSATION).await
    }

    pub async fn current_markdown(&self) -> Result<Option<String>> {
        self.read(keys::CURRENT_MARKDOWN).await
    }

    pub async fn current_json(&self) -> Result<Option<String>> {
        self.read(keys::CURRENT_JSON).await
    }

    /// Replaces the current conversation and its stored renderings in one
    /// atomic write.
    ///
    /// # Errors
    /// Returns error if serialization or the store write fails; nothing is
    /// replaced in that case.
    pub async fn save_current(
        &self,
        conversation: &Conversation,
        markdown: &str,
        json: &str,
    ) -> Result<()> {
        let entries = [
            (keys::CURRENT_CONVERSATION, encode(conversation)?),
            (keys::CURRENT_MARKDOWN, encode(markdown)?),
            (keys::CURRENT_JSON, encode(json)?),
        ];
        self.store.set_many(&entries).await
    }

    /// Stored date-format preference; unknown or absent values fall back
    /// to the default layout.
    pub async fn date_format(&self) -> Result<DateFormat> {
        let raw = self.store.get(keys::DATE_FORMAT).await?;
        let pref = raw.map(|r| serde_json::from_str::<String>(&r).unwrap_or(r));
        Ok(DateFormat::from_preference(pref.as_deref()))
    }

    pub async fn save_date_format(&self, format: DateFormat) -> Result<()> {
        self.write(keys::DATE_FORMAT, format.key()).await
    }

    pub async fn target_identity(&self) -> Result<Option<String>> {
        Ok(self
            .read::<String>(keys::TARGET_IDENTITY)
            .await?
            .filter(|id| !id.trim().is_empty()))
    }

    pub async fn save_target_identity(&self, identity: &str) -> Result<()> {
        self.write(keys::TARGET_IDENTITY, identity.trim()).await
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(AppError::json_parse)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::infrastructure::SqliteKvStore;

    /// In-memory store that refuses any write touching one key.
    pub(crate) struct RejectingStore {
        inner: SqliteKvStore,
        rejected: &'static str,
    }

    impl RejectingStore {
        pub(crate) fn new(rejected: &'static str) -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteKvStore::open_in_memory().unwrap(),
                rejected,
            })
        }

        /// Stores a prior conversation and markdown, bypassing the refusal.
        pub(crate) async fn seed_current(&self, conversation: &Conversation, markdown: &str) {
            self.inner
                .set_many(&[
                    (keys::CURRENT_CONVERSATION, encode(conversation).unwrap()),
                    (keys::CURRENT_MARKDOWN, encode(markdown).unwrap()),
                ])
                .await
                .unwrap();
        }

        fn refuse(&self) -> AppError {
            AppError::Storage {
                message: format!("write to {} refused", self.rejected),
                source: None,
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for RejectingStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.rejected {
                return Err(self.refuse());
            }
            self.inner.set(key, value).await
        }

        async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
            if entries.iter().any(|(key, _)| *key == self.rejected) {
                return Err(self.refuse());
            }
            self.inner.set_many(entries).await
        }
    }

    fn checkpoint() -> (Arc<SqliteKvStore>, Checkpoint) {
        let store = Arc::new(SqliteKvStore::open_in_memory().unwrap());
        (store.clone(), Checkpoint::new(store))
    }

    #[tokio::test]
    async fn test_contacts_default_to_empty() {
        let (_, cp) = checkpoint();
        assert!(cp.contacts().await.unwrap().is_empty());

        let contacts = vec![Contact {
            identity: "alice".into(),
            most_recent_activity_time: Some(10),
        }];
        cp.save_contacts(&contacts).await.unwrap();
        assert_eq!(cp.contacts().await.unwrap(), contacts);
    }

    #[tokio::test]
    async fn test_date_format_tolerates_raw_and_unknown_values() {
        let (store, cp) = checkpoint();
        assert_eq!(cp.date_format().await.unwrap(), DateFormat::MonthDayYear);

        store.set(keys::DATE_FORMAT, "DD/MM/YYYY").await.unwrap();
        assert_eq!(cp.date_format().await.unwrap(), DateFormat::DayMonthYear);

        store.set(keys::DATE_FORMAT, "\"whatever\"").await.unwrap();
        assert_eq!(cp.date_format().await.unwrap(), DateFormat::MonthDayYear);

        cp.save_date_format(DateFormat::Dotted).await.unwrap();
        assert_eq!(cp.date_format().await.unwrap(), DateFormat::Dotted);
    }

    #[tokio::test]
    async fn test_target_identity_trimmed() {
        let (_, cp) = checkpoint();
        assert_eq!(cp.target_identity().await.unwrap(), None);

        cp.save_target_identity("  bob ").await.unwrap();
        assert_eq!(cp.target_identity().await.unwrap().as_deref(), Some("bob"));

        cp.save_target_identity("   ").await.unwrap();
        assert_eq!(cp.target_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_current_writes_all_three_keys() {
        let (_, cp) = checkpoint();
        let conv = Conversation {
            conversation_id: "c".into(),
            counterpart_identity: "bob".into(),
            messages: Vec::new(),
        };

        cp.save_current(&conv, "# md", "{}").await.unwrap();

        assert_eq!(cp.current_conversation().await.unwrap(), Some(conv));
        assert_eq!(cp.current_markdown().await.unwrap().as_deref(), Some("# md"));
        assert_eq!(cp.current_json().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_save_current_is_all_or_nothing() {
        let store = RejectingStore::new(keys::CURRENT_MARKDOWN);
        store.seed_current(&conv("old"), "# old").await;
        let cp = Checkpoint::new(store);

        assert!(cp.save_current(&conv("new"), "# new", "{}").await.is_err());

        assert_eq!(cp.current_conversation().await.unwrap(), Some(conv("old")));
        assert_eq!(cp.current_markdown().await.unwrap().as_deref(), Some("# old"));
        assert_eq!(cp.current_json().await.unwrap(), None);
    }

    fn conv(id: &str) -> Conversation {
        Conversation {
            conversation_id: id.into(),
            counterpart_identity: "bob".into(),
            messages: Vec::new(),
        }
    }
}
