//! Single-statement query helpers over `&Connection`. Every helper also
//! accepts a `rusqlite::Transaction` through deref, so multi-step mutations
//! in the core compose them inside one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use parley_types::{Message, MessageHistory, Notification, NotificationKind, User, UnreadMessage};

// -- Users --

/// Mirror an identity-provider record. Updates the username on conflict so
/// the mirror tracks renames upstream.
pub fn upsert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, username) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET username = excluded.username",
        params![user.id, user.username],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, username FROM users WHERE id = ?1",
        [id],
        |row| Ok(User { id: row.get(0)?, username: row.get(1)? }),
    )
    .optional()
}

pub fn get_username(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT username FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()
}

pub fn delete_user(conn: &Connection, id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM users WHERE id = ?1", [id])
}

// -- Messages --

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, timestamp, read, edited, edited_at, parent_id";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
        read: row.get(5)?,
        edited: row.get(6)?,
        edited_at: row.get(7)?,
        parent_id: row.get(8)?,
    })
}

pub fn insert_message(conn: &Connection, msg: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages
             (id, sender_id, receiver_id, content, timestamp, read, edited, edited_at, parent_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            msg.id,
            msg.sender_id,
            msg.receiver_id,
            msg.content,
            msg.timestamp,
            msg.read,
            msg.edited,
            msg.edited_at,
            msg.parent_id,
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [id],
        message_from_row,
    )
    .optional()
}

/// Commit an edit: new content plus the edited flag and timestamp, in one
/// statement so the flag can never drift from the content change.
pub fn update_message_content(
    conn: &Connection,
    id: Uuid,
    content: &str,
    edited_at: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET content = ?2, edited = 1, edited_at = ?3 WHERE id = ?1",
        params![id, content, edited_at],
    )
}

pub fn set_message_read(conn: &Connection, id: Uuid, read: bool) -> rusqlite::Result<usize> {
    conn.execute("UPDATE messages SET read = ?2 WHERE id = ?1", params![id, read])
}

pub fn delete_message(conn: &Connection, id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM messages WHERE id = ?1", [id])
}

/// Direct replies beneath a root, oldest first. Thread listing is flat by
/// contract: replies-to-replies are not gathered here.
pub fn direct_replies(conn: &Connection, root_id: Uuid) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE parent_id = ?1 ORDER BY timestamp ASC"
    ))?;
    let rows = stmt.query_map([root_id], message_from_row)?;
    rows.collect()
}

/// Thread roots the user participates in, newest first.
pub fn thread_roots_for_user(conn: &Connection, user_id: Uuid) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE parent_id IS NULL AND (sender_id = ?1 OR receiver_id = ?1)
         ORDER BY timestamp DESC"
    ))?;
    let rows = stmt.query_map([user_id], message_from_row)?;
    rows.collect()
}

/// Remove every message the user sent or received. Foreign-key cascades
/// take the referencing history and notification rows with them.
pub fn delete_messages_involving(conn: &Connection, user_id: Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM messages WHERE sender_id = ?1 OR receiver_id = ?1",
        [user_id],
    )
}

// -- Message history --

pub fn insert_history(conn: &Connection, entry: &MessageHistory) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO message_history (id, message_id, old_content, edited_by, edited_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id,
            entry.message_id,
            entry.old_content,
            entry.edited_by,
            entry.edited_at,
        ],
    )?;
    Ok(())
}

/// Edit snapshots for a message, oldest edit first.
pub fn history_for_message(conn: &Connection, message_id: Uuid) -> rusqlite::Result<Vec<MessageHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, old_content, edited_by, edited_at
         FROM message_history WHERE message_id = ?1
         ORDER BY edited_at ASC",
    )?;
    let rows = stmt.query_map([message_id], |row| {
        Ok(MessageHistory {
            id: row.get(0)?,
            message_id: row.get(1)?,
            old_content: row.get(2)?,
            edited_by: row.get(3)?,
            edited_at: row.get(4)?,
        })
    })?;
    rows.collect()
}

pub fn delete_history_by_editor(conn: &Connection, user_id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM message_history WHERE edited_by = ?1", [user_id])
}

// -- Notifications --

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, message_id, kind, title, content, read, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message_id: row.get(2)?,
        kind: row.get::<_, NotificationKind>(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_notification(conn: &Connection, n: &Notification) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, message_id, kind, title, content, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![n.id, n.user_id, n.message_id, n.kind, n.title, n.content, n.read, n.created_at],
    )?;
    Ok(())
}

pub fn notifications_for_user(conn: &Connection, user_id: Uuid) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([user_id], notification_from_row)?;
    rows.collect()
}

pub fn notifications_for_message(conn: &Connection, message_id: Uuid) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE message_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([message_id], notification_from_row)?;
    rows.collect()
}

pub fn unread_notification_count(conn: &Connection, user_id: Uuid) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
        [user_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
}

/// Read-state propagation target: the recipient's unread notifications
/// about one specific message.
pub fn mark_message_notifications_read(
    conn: &Connection,
    user_id: Uuid,
    message_id: Uuid,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET read = 1
         WHERE user_id = ?1 AND message_id = ?2 AND read = 0",
        params![user_id, message_id],
    )
}

pub fn set_notification_read(conn: &Connection, id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])
}

pub fn delete_notification(conn: &Connection, id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM notifications WHERE id = ?1", [id])
}

pub fn delete_notifications_for_user(conn: &Connection, user_id: Uuid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM notifications WHERE user_id = ?1", [user_id])
}

// -- Unread index --

/// Unread messages for a recipient, newest first. JOINs users once for the
/// sender name and projects only the fields the client list view needs.
pub fn unread_for_user(conn: &Connection, user_id: Uuid) -> rusqlite::Result<Vec<UnreadMessage>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, u.username, m.content, m.timestamp, m.read, m.parent_id
         FROM messages m
         LEFT JOIN users u ON m.sender_id = u.id
         WHERE m.receiver_id = ?1 AND m.read = 0
         ORDER BY m.timestamp DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(UnreadMessage {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            sender_name: row
                .get::<_, Option<String>>(2)?
                .unwrap_or_else(|| "unknown".to_string()),
            content: row.get(3)?,
            timestamp: row.get(4)?,
            read: row.get(5)?,
            parent_id: row.get(6)?,
        })
    })?;
    rows.collect()
}

pub fn unread_count_for_user(conn: &Connection, user_id: Uuid) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
        [user_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
}
