//! JSON normalization for inbox API payloads.
//!
//! Handles conversion from raw upstream values to domain models. The upstream
//! spells the same field several ways depending on endpoint and age of the
//! record, so every field is looked up through a list of accepted keys.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{AppError, Attachment, Contact, DateFormat, Message, RepliedMessage, Result};

const CONTACT_IDENTITY_KEYS: &[&str] = &["identity", "username", "name"];
const CONTACT_TIME_KEYS: &[&str] = &[
    "mostRecentActivityTime",
    "most_recent_activity_time",
    "recentMessageDate",
];

const MESSAGE_ID_KEYS: &[&str] = &["id", "messageId", "message_id"];
const MESSAGE_SENDER_KEYS: &[&str] = &["sender", "from", "senderUsername"];
const MESSAGE_RECIPIENT_KEYS: &[&str] = &["recipient", "to", "recipientUsername"];
const MESSAGE_BODY_KEYS: &[&str] = &["body", "text", "message"];
const CREATED_AT_KEYS: &[&str] = &["createdAt", "created_at", "timestamp"];
const REPLY_KEYS: &[&str] = &["repliedToMessage", "replied_to_message", "repliedTo"];

const ATTACHMENT_NAME_KEYS: &[&str] = &["file_name", "fileName", "filename", "name"];
const ATTACHMENT_SIZE_KEYS: &[&str] = &["file_size", "fileSize", "size"];
const ATTACHMENT_URL_KEYS: &[&str] = &["download_url", "downloadUrl", "url"];
const ATTACHMENT_TYPE_KEYS: &[&str] = &["content_type", "contentType", "mime_type", "type"];

/// Raw conversation page envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConversationPage {
    #[serde(default, alias = "conversation_id")]
    conversation_id: Option<Value>,
    #[serde(default, alias = "last_page")]
    last_page: Option<bool>,
    #[serde(default)]
    messages: Option<Vec<Value>>,
}

/// One decoded conversation batch.
#[derive(Debug, Clone, Default)]
pub struct ConversationPage {
    pub conversation_id: Option<String>,
    pub last_page: bool,
    /// Enriched messages in the order the batch listed them.
    pub messages: Vec<Message>,
    /// Entries that were null, empty or not objects.
    pub dropped: usize,
}

impl ConversationPage {
    /// Oldest valid timestamp in the batch, the cursor for the next request.
    #[must_use]
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.messages.iter().filter_map(|m| m.created_at).min()
    }
}

/// Decodes a contacts batch.
///
/// Returns `None` when the payload is not a non-empty array, which ends
/// paging. Entries without an identity are skipped.
#[must_use]
pub fn parse_contacts_batch(value: &Value) -> Option<Vec<Contact>> {
    let items = value.as_array().filter(|items| !items.is_empty())?;

    let contacts = items
        .iter()
        .filter_map(|item| {
            let contact = parse_contact(item);
            if contact.is_none() {
                tracing::debug!("Skipping contact entry without identity: {}", item);
            }
            contact
        })
        .collect();

    Some(contacts)
}

fn parse_contact(item: &Value) -> Option<Contact> {
    let fields = Fields::of(item)?;
    let identity = fields.string(CONTACT_IDENTITY_KEYS).filter(|s| !s.is_empty())?;

    Some(Contact {
        identity,
        most_recent_activity_time: fields.timestamp(CONTACT_TIME_KEYS),
    })
}

/// Decodes and enriches a conversation batch.
///
/// # Errors
/// Returns error if the envelope is not an object or has no `messages` list.
pub fn parse_conversation_page(value: &Value, format: DateFormat) -> Result<ConversationPage> {
    if !value.is_object() {
        return Err(AppError::malformed("conversation payload is not an object"));
    }

    let raw = RawConversationPage::deserialize(value).map_err(AppError::json_parse)?;
    let entries = raw
        .messages
        .ok_or_else(|| AppError::malformed("conversation payload has no `messages` list"))?;

    let total = entries.len();
    let messages: Vec<Message> = entries
        .iter()
        .filter_map(|entry| enrich_message(entry, format))
        .collect();

    Ok(ConversationPage {
        conversation_id: raw.conversation_id.as_ref().and_then(value_to_string),
        last_page: raw.last_page.unwrap_or(false),
        dropped: total - messages.len(),
        messages,
    })
}

/// Normalizes one message and computes its derived fields.
///
/// Returns `None` for null, empty or non-object entries.
#[must_use]
pub fn enrich_message(entry: &Value, format: DateFormat) -> Option<Message> {
    let fields = Fields::of(entry)?;

    let attachments = fields
        .array("attachments")
        .iter()
        .filter_map(parse_attachment)
        .collect();

    // One level only: a reply's own reply reference is ignored.
    let replied_to = fields.object(REPLY_KEYS).map(parse_reply);

    let mut message = Message {
        id: fields.string(MESSAGE_ID_KEYS).unwrap_or_default(),
        sender: fields.string(MESSAGE_SENDER_KEYS).unwrap_or_default(),
        recipient: fields.string(MESSAGE_RECIPIENT_KEYS).unwrap_or_default(),
        body: fields.string(MESSAGE_BODY_KEYS).unwrap_or_default(),
        created_at: fields.timestamp(CREATED_AT_KEYS),
        attachments,
        replied_to,
        formatted_time: String::new(),
    };
    message.apply_date_format(format);

    Some(message)
}

fn parse_attachment(entry: &Value) -> Option<Attachment> {
    let fields = Fields::of(entry)?;

    Some(Attachment {
        file_name: fields
            .string(ATTACHMENT_NAME_KEYS)
            .unwrap_or_else(|| "attachment".to_string()),
        file_size_bytes: fields.unsigned(ATTACHMENT_SIZE_KEYS).unwrap_or(0),
        download_url: fields.string(ATTACHMENT_URL_KEYS).unwrap_or_default(),
        content_type: fields.string(ATTACHMENT_TYPE_KEYS).unwrap_or_default(),
        created_at: fields.timestamp(CREATED_AT_KEYS),
        formatted_time: String::new(),
    })
}

fn parse_reply(fields: Fields<'_>) -> RepliedMessage {
    RepliedMessage {
        id: fields.string(MESSAGE_ID_KEYS).unwrap_or_default(),
        sender: fields.string(MESSAGE_SENDER_KEYS).unwrap_or_default(),
        body: fields.string(MESSAGE_BODY_KEYS).unwrap_or_default(),
        created_at: fields.timestamp(CREATED_AT_KEYS),
        formatted_time: String::new(),
    }
}

/// Field lookup over a non-empty JSON object.
#[derive(Clone, Copy)]
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        value
            .as_object()
            .filter(|map| !map.is_empty())
            .map(Self)
    }

    /// First key present with a non-null value.
    fn first(self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    fn string(self, keys: &[&str]) -> Option<String> {
        self.first(keys).and_then(value_to_string)
    }

    fn timestamp(self, keys: &[&str]) -> Option<i64> {
        self.first(keys).and_then(value_to_timestamp)
    }

    fn unsigned(self, keys: &[&str]) -> Option<u64> {
        match self.first(keys)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn array(self, key: &str) -> &'a [Value] {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    fn object(self, keys: &[&str]) -> Option<Fields<'a>> {
        self.first(keys).and_then(Self::of)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts integer or float milliseconds, numeric strings and RFC 3339 strings.
fn value_to_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if let Ok(millis) = s.parse::<i64>() {
        return Some(millis);
    }

    if let Ok(millis) = s.parse::<f64>() {
        return millis.is_finite().then_some(millis as i64);
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contacts_batch_accepts_spellings() {
        let batch = json!([
            {"username": "alice", "recentMessageDate": 300},
            {"identity": "bob", "mostRecentActivityTime": "200"},
            {"name": "carol"},
            {"recentMessageDate": 100}
        ]);

        let contacts = parse_contacts_batch(&batch).unwrap();
        assert_eq!(contacts.len(), 3);
        assert_eq!(contacts[0].identity, "alice");
        assert_eq!(contacts[0].most_recent_activity_time, Some(300));
        assert_eq!(contacts[1].most_recent_activity_time, Some(200));
        assert_eq!(contacts[2].most_recent_activity_time, None);
    }

    #[test]
    fn test_contacts_batch_stops_on_empty_or_non_array() {
        assert!(parse_contacts_batch(&json!([])).is_none());
        assert!(parse_contacts_batch(&json!({"contacts": []})).is_none());
        assert!(parse_contacts_batch(&Value::Null).is_none());
    }

    #[test]
    fn test_attachment_spellings_normalize() {
        let page = json!({
            "conversationId": "c-1",
            "lastPage": true,
            "messages": [{
                "id": 7,
                "sender": "alice",
                "recipient": "bob",
                "body": "files",
                "createdAt": 1_710_428_645_000_i64,
                "attachments": [
                    {"file_name": "a.pdf", "file_size": 2048, "download_url": "https://x/a", "content_type": "application/pdf", "created_at": 1_710_428_645_000_i64},
                    {"fileName": "b.png", "fileSize": "10", "downloadUrl": "https://x/b", "contentType": "image/png"},
                    {"name": "c.txt", "size": 1.0, "url": "https://x/c", "mime_type": "text/plain"},
                    null
                ]
            }]
        });

        let parsed = parse_conversation_page(&page, DateFormat::Iso).unwrap();
        let msg = &parsed.messages[0];
        assert_eq!(msg.id, "7");
        assert_eq!(msg.attachments.len(), 3);
        assert_eq!(msg.attachments[0].file_name, "a.pdf");
        assert_eq!(msg.attachments[0].file_size_bytes, 2048);
        assert_eq!(msg.attachments[0].formatted_time, "2024-03-14, 3:04:05 PM");
        assert_eq!(msg.attachments[1].file_size_bytes, 10);
        assert_eq!(msg.attachments[1].download_url, "https://x/b");
        assert_eq!(msg.attachments[2].content_type, "text/plain");
        assert_eq!(msg.attachments[2].formatted_time, "Unknown time");
    }

    #[test]
    fn test_reply_enriched_one_level_only() {
        let entry = json!({
            "id": "m2",
            "sender": "bob",
            "recipient": "alice",
            "body": "yes",
            "createdAt": 2000,
            "repliedToMessage": {
                "id": "m1",
                "sender": "alice",
                "body": "ok?",
                "createdAt": 1000,
                "repliedToMessage": {"id": "m0", "body": "deeper"}
            }
        });

        let msg = enrich_message(&entry, DateFormat::MonthDayYear).unwrap();
        let reply = msg.replied_to.unwrap();
        assert_eq!(reply.id, "m1");
        assert_eq!(reply.formatted_time, "01/01/1970, 12:00:01 AM");
        // The serialized reply has no slot for a nested reference.
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("replied_to").is_none());
    }

    #[test]
    fn test_null_and_empty_entries_dropped() {
        let page = json!({
            "conversationId": 99,
            "lastPage": false,
            "messages": [null, {}, "junk", {"id": "m1", "createdAt": 5}]
        });

        let parsed = parse_conversation_page(&page, DateFormat::default()).unwrap();
        assert_eq!(parsed.conversation_id.as_deref(), Some("99"));
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.dropped, 3);
        assert_eq!(parsed.oldest_timestamp(), Some(5));
    }

    #[test]
    fn test_missing_messages_is_malformed() {
        let err = parse_conversation_page(&json!({"lastPage": true}), DateFormat::default())
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload { .. }));

        let err = parse_conversation_page(&json!([1, 2]), DateFormat::default()).unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload { .. }));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp_str("1764561943374"), Some(1_764_561_943_374));
        assert_eq!(parse_timestamp_str("12.9"), Some(12));
        assert_eq!(
            parse_timestamp_str("2024-03-14T15:04:05Z"),
            Some(1_710_428_645_000)
        );
        assert_eq!(parse_timestamp_str("yesterday"), None);
    }

    #[test]
    fn test_oldest_timestamp_ignores_missing() {
        let page = json!({
            "messages": [{"id": "a"}, {"id": "b", "createdAt": "not a time"}]
        });
        let parsed = parse_conversation_page(&page, DateFormat::default()).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.oldest_timestamp(), None);
        assert!(!parsed.last_page);
    }
}
