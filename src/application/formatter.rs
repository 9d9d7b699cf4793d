//! Output formatting for extracted inbox data.
//!
//! Supports Markdown, a metadata-only JSON summary, CSV and plain text for
//! conversations, plus table, JSON and CSV views of the contact list. Every
//! renderer derives formatted times from the raw timestamps, so output depends
//! only on the conversation and the requested date format.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{AppError, Contact, Conversation, DateFormat, Message, Result};

/// Conversation output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Human-readable Markdown.
    #[default]
    Markdown,
    /// Metadata-only JSON summary.
    Json,
    Csv,
    Text,
}

impl ExportFormat {
    pub const ALL: [Self; 4] = [Self::Markdown, Self::Json, Self::Csv, Self::Text];

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Unknown format: {s}. Use: md, json, csv, txt")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Contact list output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactFormat {
    #[default]
    Json,
    Csv,
}

impl ContactFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ContactFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown contact format: {s}. Use: json, csv")),
        }
    }
}

/// Renders `conv` in `format` under the given date layout.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render(conv: &Conversation, date_format: DateFormat, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Markdown => Ok(render_markdown(conv, date_format)),
        ExportFormat::Json => render_json_summary(conv, date_format),
        ExportFormat::Csv => Ok(render_csv(conv, date_format)),
        ExportFormat::Text => Ok(render_text(conv, date_format)),
    }
}

/// Formats a conversation as Markdown.
#[must_use]
pub fn render_markdown(conv: &Conversation, date_format: DateFormat) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Conversation with {}\n\n", conv.counterpart_identity));
    if !conv.conversation_id.is_empty() {
        out.push_str(&format!("**Conversation ID:** {}\n", conv.conversation_id));
    }
    out.push_str(&format!("**Messages:** {}\n", conv.message_count()));
    out.push_str(&format!("**Attachments:** {}\n", conv.attachment_count()));
    out.push_str(&format!(
        "**First message:** {}\n",
        date_format.format_optional(conv.first_message_at())
    ));
    out.push_str(&format!(
        "**Last message:** {}\n\n",
        date_format.format_optional(conv.last_message_at())
    ));
    out.push_str("---\n\n");

    for message in &conv.messages {
        out.push_str(&format!("### {} → {}\n\n", message.sender, message.recipient));
        out.push_str(&format!("*{}*\n\n", date_format.format_optional(message.created_at)));

        if let Some(reply) = &message.replied_to {
            out.push_str(&format!(
                "> **Replying to {}** ({})\n",
                reply.sender,
                date_format.format_optional(reply.created_at)
            ));
            for line in reply.body.lines() {
                out.push_str(&format!("> {line}\n"));
            }
            out.push('\n');
        }

        if !message.body.is_empty() {
            out.push_str(&message.body);
            out.push_str("\n\n");
        }

        if !message.attachments.is_empty() {
            out.push_str("**Attachments:**\n");
            for attachment in &message.attachments {
                let name = if attachment.download_url.is_empty() {
                    attachment.file_name.clone()
                } else {
                    format!("[{}]({})", attachment.file_name, attachment.download_url)
                };
                out.push_str(&format!(
                    "- {name} ({}, {})\n",
                    attachment.human_size(),
                    date_format.format_optional(attachment.created_at)
                ));
            }
            out.push('\n');
        }

        out.push_str("---\n\n");
    }

    out
}

#[derive(Serialize)]
struct ConversationSummary<'a> {
    conversation_id: &'a str,
    counterpart_identity: &'a str,
    date_format: &'static str,
    message_count: usize,
    attachment_count: usize,
    messages: Vec<MessageSummary<'a>>,
}

#[derive(Serialize)]
struct MessageSummary<'a> {
    id: &'a str,
    sender: &'a str,
    created_at: Option<i64>,
    formatted_time: String,
    body_length: usize,
    attachment_count: usize,
    replied_to_id: Option<&'a str>,
}

impl<'a> MessageSummary<'a> {
    fn new(message: &'a Message, date_format: DateFormat) -> Self {
        Self {
            id: &message.id,
            sender: &message.sender,
            created_at: message.created_at,
            formatted_time: date_format.format_optional(message.created_at),
            body_length: message.body.chars().count(),
            attachment_count: message.attachments.len(),
            replied_to_id: message.replied_to.as_ref().map(|r| r.id.as_str()),
        }
    }
}

/// Formats conversation metadata as pretty JSON. Message bodies are left out.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_json_summary(conv: &Conversation, date_format: DateFormat) -> Result<String> {
    let summary = ConversationSummary {
        conversation_id: &conv.conversation_id,
        counterpart_identity: &conv.counterpart_identity,
        date_format: date_format.key(),
        message_count: conv.message_count(),
        attachment_count: conv.attachment_count(),
        messages: conv
            .messages
            .iter()
            .map(|m| MessageSummary::new(m, date_format))
            .collect(),
    };
    serde_json::to_string_pretty(&summary).map_err(AppError::json_parse)
}

/// Formats a conversation as CSV, one row per message.
#[must_use]
pub fn render_csv(conv: &Conversation, date_format: DateFormat) -> String {
    let mut out = csv_row(&[
        "id",
        "time",
        "sender",
        "recipient",
        "body",
        "attachments",
        "replied_to_id",
    ]);

    for message in &conv.messages {
        let time = date_format.format_optional(message.created_at);
        let attachments = message
            .attachments
            .iter()
            .map(|a| a.file_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let replied_to = message.replied_to.as_ref().map_or("", |r| r.id.as_str());

        out.push_str(&csv_row(&[
            &message.id,
            &time,
            &message.sender,
            &message.recipient,
            &message.body,
            &attachments,
            replied_to,
        ]));
    }

    out
}

/// Formats a conversation as plain text.
#[must_use]
pub fn render_text(conv: &Conversation, date_format: DateFormat) -> String {
    let mut out = format!(
        "Conversation with {} ({} messages)\n\n",
        conv.counterpart_identity,
        conv.message_count()
    );

    for message in &conv.messages {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            date_format.format_optional(message.created_at),
            message.sender,
            message.body
        ));
        if let Some(reply) = &message.replied_to {
            out.push_str(&format!("    reply to {}: {}\n", reply.sender, first_line(&reply.body)));
        }
        for attachment in &message.attachments {
            out.push_str(&format!(
                "    attachment: {} ({})\n",
                attachment.file_name,
                attachment.human_size()
            ));
        }
        out.push('\n');
    }

    out
}

#[derive(Serialize)]
struct ContactRow<'a> {
    identity: &'a str,
    most_recent_activity_time: Option<i64>,
    formatted_time: String,
}

/// Formats the contact list as pretty JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_contacts_json(contacts: &[Contact], date_format: DateFormat) -> Result<String> {
    let rows: Vec<_> = contacts
        .iter()
        .map(|c| ContactRow {
            identity: &c.identity,
            most_recent_activity_time: c.most_recent_activity_time,
            formatted_time: date_format.format_optional(c.most_recent_activity_time),
        })
        .collect();
    serde_json::to_string_pretty(&rows).map_err(AppError::json_parse)
}

#[must_use]
pub fn render_contacts_csv(contacts: &[Contact], date_format: DateFormat) -> String {
    let mut out = csv_row(&["identity", "most_recent_activity_time", "formatted_time"]);
    for contact in contacts {
        let raw = contact
            .most_recent_activity_time
            .map(|t| t.to_string())
            .unwrap_or_default();
        let time = date_format.format_optional(contact.most_recent_activity_time);
        out.push_str(&csv_row(&[&contact.identity, &raw, &time]));
    }
    out
}

/// Renders contacts in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render_contacts(
    contacts: &[Contact],
    date_format: DateFormat,
    format: ContactFormat,
) -> Result<String> {
    match format {
        ContactFormat::Json => render_contacts_json(contacts, date_format),
        ContactFormat::Csv => Ok(render_contacts_csv(contacts, date_format)),
    }
}

/// Formats a table listing of contacts.
#[must_use]
pub fn format_contacts_table(contacts: &[Contact], date_format: DateFormat) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Identity", "Last activity"]);

    for (i, contact) in contacts.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            truncate(&contact.identity, 32),
            date_format.format_optional(contact.most_recent_activity_time),
        ]);
    }

    table.to_string()
}

/// Formats conversation statistics for display.
#[must_use]
pub fn format_conversation_stats(conv: &Conversation, date_format: DateFormat) -> String {
    format!(
        "{}\n  Counterpart: {}\n  Messages: {}\n  Attachments: {}\n  First: {}\n  Last: {}",
        "📊 Conversation".bold(),
        conv.counterpart_identity.cyan(),
        conv.message_count().to_string().cyan(),
        conv.attachment_count().to_string().yellow(),
        date_format.format_optional(conv.first_message_at()),
        date_format.format_optional(conv.last_message_at())
    )
}

fn csv_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = first_line(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attachment, RepliedMessage};

    // 2024-03-14T15:04:05Z
    const PI_DAY: i64 = 1_710_428_645_000;

    fn sample(format_as: DateFormat) -> Conversation {
        let mut conv = Conversation {
            conversation_id: "c-42".into(),
            counterpart_identity: "bob".into(),
            messages: vec![
                Message {
                    id: "m1".into(),
                    sender: "bob".into(),
                    recipient: "alice".into(),
                    body: "Hi, \"quoted\" text".into(),
                    created_at: Some(PI_DAY),
                    attachments: vec![
                        Attachment {
                            file_name: "brief.pdf".into(),
                            file_size_bytes: 2048,
                            download_url: "https://files.example/brief.pdf".into(),
                            content_type: "application/pdf".into(),
                            created_at: Some(PI_DAY),
                            formatted_time: String::new(),
                        },
                        Attachment {
                            file_name: "logo.png".into(),
                            file_size_bytes: 10,
                            download_url: String::new(),
                            content_type: "image/png".into(),
                            created_at: None,
                            formatted_time: String::new(),
                        },
                    ],
                    replied_to: None,
                    formatted_time: String::new(),
                },
                Message {
                    id: "m2".into(),
                    sender: "alice".into(),
                    recipient: "bob".into(),
                    body: "héllo".into(),
                    created_at: Some(PI_DAY + 60_000),
                    attachments: Vec::new(),
                    replied_to: Some(RepliedMessage {
                        id: "m1".into(),
                        sender: "bob".into(),
                        body: "Hi".into(),
                        created_at: Some(PI_DAY),
                        formatted_time: String::new(),
                    }),
                    formatted_time: String::new(),
                },
            ],
        };
        conv.apply_date_format(format_as);
        conv
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("md".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("txt".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert!("table".parse::<ExportFormat>().is_err());
        assert!("xml".parse::<ContactFormat>().is_err());
    }

    #[test]
    fn test_render_is_idempotent_for_every_format() {
        for date_format in DateFormat::ALL {
            for format in ExportFormat::ALL {
                let conv = sample(date_format);
                let first = render(&conv, date_format, format).unwrap();
                let second = render(&conv, date_format, format).unwrap();
                assert_eq!(first, second, "{format} / {date_format}");
            }
        }
    }

    #[test]
    fn test_render_ignores_stale_formatted_fields() {
        for date_format in DateFormat::ALL {
            for format in ExportFormat::ALL {
                let fresh = sample(date_format);
                let stale = sample(DateFormat::Dotted);
                assert_eq!(
                    render(&fresh, date_format, format).unwrap(),
                    render(&stale, date_format, format).unwrap(),
                    "{format} / {date_format}"
                );
            }
        }
    }

    #[test]
    fn test_markdown_layout() {
        let md = render_markdown(&sample(DateFormat::Iso), DateFormat::Iso);

        assert!(md.starts_with("# Conversation with bob\n"));
        assert!(md.contains("**Conversation ID:** c-42"));
        assert!(md.contains("**Messages:** 2"));
        assert!(md.contains("**Attachments:** 2"));
        assert!(md.contains("*2024-03-14, 3:04:05 PM*"));
        assert!(md.contains("> **Replying to bob** (2024-03-14, 3:04:05 PM)\n> Hi\n"));
        assert!(md.contains("- [brief.pdf](https://files.example/brief.pdf) (2.00 KB, 2024-03-14, 3:04:05 PM)"));
        assert!(md.contains("- logo.png (10 B, Unknown time)"));
    }

    #[test]
    fn test_csv_quotes_every_field() {
        let csv = render_csv(&sample(DateFormat::MonthDayYear), DateFormat::MonthDayYear);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#""id","time","sender","recipient","body","attachments","replied_to_id""#
        );
        assert_eq!(
            lines[1],
            r#""m1","03/14/2024, 3:04:05 PM","bob","alice","Hi, ""quoted"" text","brief.pdf, logo.png","""#
        );
        assert!(lines[2].ends_with(r#","m1""#));
    }

    #[test]
    fn test_text_layout() {
        let text = render_text(&sample(DateFormat::Dotted), DateFormat::Dotted);

        assert!(text.contains("[14.03.2024, 3:04:05 PM] bob: Hi, \"quoted\" text\n"));
        assert!(text.contains("    attachment: brief.pdf (2.00 KB)\n"));
        assert!(text.contains("[14.03.2024, 3:05:05 PM] alice: héllo\n    reply to bob: Hi\n"));
    }

    #[test]
    fn test_json_summary_has_no_bodies() {
        let json = render_json_summary(&sample(DateFormat::Iso), DateFormat::Iso).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["message_count"], 2);
        assert_eq!(value["date_format"], "YYYY-MM-DD");
        let second = &value["messages"][1];
        assert_eq!(second["body_length"], 5);
        assert_eq!(second["replied_to_id"], "m1");
        assert_eq!(second["formatted_time"], "2024-03-14, 3:05:05 PM");
        assert_eq!(value["messages"][0]["attachment_count"], 2);
        assert!(!json.contains("héllo"));
    }

    #[test]
    fn test_contacts_renderings() {
        let contacts = vec![
            Contact {
                identity: "alice".into(),
                most_recent_activity_time: Some(PI_DAY),
            },
            Contact {
                identity: "bob".into(),
                most_recent_activity_time: None,
            },
        ];

        let csv = render_contacts(&contacts, DateFormat::Iso, ContactFormat::Csv).unwrap();
        assert!(csv.contains(r#""alice","1710428645000","2024-03-14, 3:04:05 PM""#));
        assert!(csv.contains(r#""bob","","Unknown time""#));

        let json = render_contacts(&contacts, DateFormat::Iso, ContactFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[1]["identity"], "bob");

        let table = format_contacts_table(&contacts, DateFormat::Iso);
        assert!(table.contains("alice"));
        assert!(table.contains("Unknown time"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("ééééééééé", 5), "éé...");
    }
}
