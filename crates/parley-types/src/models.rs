use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest message excerpt carried inside a notification body.
pub const SUMMARY_MAX_CHARS: usize = 50;

/// Identity mirrored from the external provider. The core stores these rows
/// so foreign keys resolve, but never originates or edits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// A direct message between two users, optionally a reply within a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    /// Creation time; never changes after insert.
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub edited: bool,
    /// Set iff `edited` is true.
    pub edited_at: Option<DateTime<Utc>>,
    /// Present iff this message is a reply.
    pub parent_id: Option<Uuid>,
}

impl Message {
    /// Excerpt used in notification bodies: at most [`SUMMARY_MAX_CHARS`]
    /// characters, ellipsis-terminated when truncated.
    pub fn summary(&self) -> String {
        summarize(&self.content)
    }
}

/// Free-function form of [`Message::summary`], for callers holding content
/// that is not yet persisted as a message.
pub fn summarize(content: &str) -> String {
    if content.chars().count() > SUMMARY_MAX_CHARS {
        let head: String = content.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

/// Immutable snapshot of a message's content taken before a committed edit.
/// Append-only: one row per content-changing edit, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHistory {
    pub id: Uuid,
    pub message_id: Uuid,
    pub old_content: String,
    pub edited_by: Uuid,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A new thread-starting message arrived.
    Message,
    /// A reply arrived in an existing thread.
    Reply,
    /// A received message was edited after delivery.
    Edit,
    /// Administrative notice, not tied to any message.
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message => "message",
            NotificationKind::Reply => "reply",
            NotificationKind::Edit => "edit",
            NotificationKind::System => "system",
        }
    }
}

impl ToSql for NotificationKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for NotificationKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "message" => Ok(NotificationKind::Message),
            "reply" => Ok(NotificationKind::Reply),
            "edit" => Ok(NotificationKind::Edit),
            "system" => Ok(NotificationKind::System),
            other => Err(FromSqlError::Other(
                format!("unknown notification kind: {other}").into(),
            )),
        }
    }
}

/// A per-user notice produced by message fan-out or the system API.
/// Mutated only to flip its read flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Absent only for `System` notifications.
    pub message_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
