//! Domain models for Fiverr inbox data.
//!
//! These models represent the entities fetched from the inbox API after
//! normalization. Formatted strings are derived fields and are rebuilt from
//! the raw millisecond timestamps whenever the date-format preference changes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Date layout preference, keyed by the stored preference string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    /// `03/14/2024`
    #[default]
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYear,
    /// `14/03/2024`
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYear,
    /// `2024-03-14`
    #[serde(rename = "YYYY-MM-DD")]
    Iso,
    /// `14.03.2024`
    #[serde(rename = "DD.MM.YYYY")]
    Dotted,
}

impl DateFormat {
    /// All recognized layouts.
    pub const ALL: [Self; 4] = [
        Self::MonthDayYear,
        Self::DayMonthYear,
        Self::Iso,
        Self::Dotted,
    ];

    /// Resolves a stored preference, falling back to the default layout.
    #[must_use]
    pub fn from_preference(pref: Option<&str>) -> Self {
        pref.and_then(|p| Self::ALL.into_iter().find(|f| f.key() == p.trim()))
            .unwrap_or_default()
    }

    /// Preference key as stored.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MonthDayYear => "MM/DD/YYYY",
            Self::DayMonthYear => "DD/MM/YYYY",
            Self::Iso => "YYYY-MM-DD",
            Self::Dotted => "DD.MM.YYYY",
        }
    }

    const fn date_pattern(self) -> &'static str {
        match self {
            Self::MonthDayYear => "%m/%d/%Y",
            Self::DayMonthYear => "%d/%m/%Y",
            Self::Iso => "%Y-%m-%d",
            Self::Dotted => "%d.%m.%Y",
        }
    }

    /// Formats a unix-ms timestamp as `<date>, <h:mm:ss AM/PM>` in UTC.
    ///
    /// Returns `None` when the timestamp is out of range.
    #[must_use]
    pub fn format_timestamp(self, millis: i64) -> Option<String> {
        let dt = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(format!(
            "{}, {}",
            dt.format(self.date_pattern()),
            dt.format("%-I:%M:%S %p")
        ))
    }

    /// Like [`Self::format_timestamp`] but for optional timestamps.
    #[must_use]
    pub fn format_optional(self, millis: Option<i64>) -> String {
        millis
            .and_then(|ms| self.format_timestamp(ms))
            .unwrap_or_else(|| "Unknown time".to_string())
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown date format: {s}. Use: MM/DD/YYYY, DD/MM/YYYY, YYYY-MM-DD, DD.MM.YYYY"
                )
            })
    }
}

/// A counterpart listed in the inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique username of the counterpart.
    pub identity: String,
    /// Last activity in unix milliseconds, if the API provided a valid one.
    #[serde(default)]
    pub most_recent_activity_time: Option<i64>,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    #[serde(default)]
    pub file_size_bytes: u64,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Derived from `created_at`.
    #[serde(default)]
    pub formatted_time: String,
}

impl Attachment {
    /// Human readable file size.
    #[must_use]
    pub fn human_size(&self) -> String {
        format_bytes(self.file_size_bytes)
    }
}

/// The message a reply points at. Only one level is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepliedMessage {
    pub id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub formatted_time: String,
}

/// A single inbox message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub body: String,
    /// Creation time in unix milliseconds.
    pub created_at: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub replied_to: Option<RepliedMessage>,
    /// Derived from `created_at`.
    #[serde(default)]
    pub formatted_time: String,
}

impl Message {
    /// Recomputes every derived field under the given date format.
    pub fn apply_date_format(&mut self, format: DateFormat) {
        self.formatted_time = format.format_optional(self.created_at);
        for attachment in &mut self.attachments {
            attachment.formatted_time = format.format_optional(attachment.created_at);
        }
        if let Some(reply) = self.replied_to.as_mut() {
            reply.formatted_time = format.format_optional(reply.created_at);
        }
    }
}

/// A fully assembled conversation with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub counterpart_identity: String,
    /// Sorted ascending by `created_at`.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Total attachments across all messages.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.messages.iter().map(|m| m.attachments.len()).sum()
    }

    /// Timestamp of the first message with a known time.
    #[must_use]
    pub fn first_message_at(&self) -> Option<i64> {
        self.messages.iter().find_map(|m| m.created_at)
    }

    /// Timestamp of the last message with a known time.
    #[must_use]
    pub fn last_message_at(&self) -> Option<i64> {
        self.messages.iter().rev().find_map(|m| m.created_at)
    }

    /// Recomputes every derived field under the given date format.
    pub fn apply_date_format(&mut self, format: DateFormat) {
        for message in &mut self.messages {
            message.apply_date_format(format);
        }
    }

    /// Export filename stem: `fiverr_<identity>_<YYYY-MM-DD>`.
    #[must_use]
    pub fn filename(&self, date: NaiveDate) -> String {
        format!(
            "fiverr_{}_{}",
            sanitize_filename(&self.counterpart_identity),
            date.format("%Y-%m-%d")
        )
    }
}

/// Keeps filename-safe characters only.
#[must_use]
pub fn sanitize_filename(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Format bytes as human readable string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-14T15:04:05Z
    const PI_DAY: i64 = 1_710_428_645_000;

    #[test]
    fn test_format_timestamp_layouts() {
        assert_eq!(
            DateFormat::MonthDayYear.format_timestamp(PI_DAY).unwrap(),
            "03/14/2024, 3:04:05 PM"
        );
        assert_eq!(
            DateFormat::DayMonthYear.format_timestamp(PI_DAY).unwrap(),
            "14/03/2024, 3:04:05 PM"
        );
        assert_eq!(
            DateFormat::Iso.format_timestamp(PI_DAY).unwrap(),
            "2024-03-14, 3:04:05 PM"
        );
        assert_eq!(
            DateFormat::Dotted.format_timestamp(PI_DAY).unwrap(),
            "14.03.2024, 3:04:05 PM"
        );
    }

    #[test]
    fn test_midnight_is_twelve_am() {
        // 2024-01-01T00:00:09Z
        let ts = 1_704_067_209_000;
        assert_eq!(
            DateFormat::Iso.format_timestamp(ts).unwrap(),
            "2024-01-01, 12:00:09 AM"
        );
    }

    #[test]
    fn test_unknown_preference_falls_back() {
        assert_eq!(DateFormat::from_preference(None), DateFormat::MonthDayYear);
        assert_eq!(
            DateFormat::from_preference(Some("weekday first")),
            DateFormat::MonthDayYear
        );
        assert_eq!(
            DateFormat::from_preference(Some("DD.MM.YYYY")),
            DateFormat::Dotted
        );
    }

    #[test]
    fn test_date_format_from_str() {
        assert_eq!("yyyy-mm-dd".parse::<DateFormat>(), Ok(DateFormat::Iso));
        assert!("nonsense".parse::<DateFormat>().is_err());
    }

    #[test]
    fn test_date_format_serde_uses_key() {
        let json = serde_json::to_string(&DateFormat::DayMonthYear).unwrap();
        assert_eq!(json, "\"DD/MM/YYYY\"");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536 * 1024), "1.50 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_filename_embeds_identity_and_date() {
        let conv = Conversation {
            conversation_id: "c1".into(),
            counterpart_identity: "jane.doe".into(),
            messages: Vec::new(),
        };
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert_eq!(conv.filename(date), "fiverr_jane_doe_2024-03-14");
    }

    #[test]
    fn test_apply_date_format_reaches_reply_and_attachments() {
        let mut msg = Message {
            id: "m1".into(),
            sender: "a".into(),
            recipient: "b".into(),
            body: "hi".into(),
            created_at: Some(PI_DAY),
            attachments: vec![Attachment {
                file_name: "x.png".into(),
                file_size_bytes: 10,
                download_url: String::new(),
                content_type: "image/png".into(),
                created_at: Some(PI_DAY),
                formatted_time: String::new(),
            }],
            replied_to: Some(RepliedMessage {
                id: "m0".into(),
                sender: "b".into(),
                body: "hello".into(),
                created_at: None,
                formatted_time: String::new(),
            }),
            formatted_time: String::new(),
        };

        msg.apply_date_format(DateFormat::Iso);

        assert_eq!(msg.formatted_time, "2024-03-14, 3:04:05 PM");
        assert_eq!(msg.attachments[0].formatted_time, "2024-03-14, 3:04:05 PM");
        assert_eq!(msg.replied_to.unwrap().formatted_time, "Unknown time");
    }
}
