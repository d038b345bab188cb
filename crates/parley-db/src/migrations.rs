use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          BLOB PRIMARY KEY,
            username    TEXT NOT NULL
        );

        -- parent_id is SET NULL so replies orphaned by a parent's deletion
        -- survive as thread starters instead of vanishing with it.
        CREATE TABLE IF NOT EXISTS messages (
            id          BLOB PRIMARY KEY,
            sender_id   BLOB NOT NULL REFERENCES users(id),
            receiver_id BLOB NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            edited      INTEGER NOT NULL DEFAULT 0,
            edited_at   TEXT,
            parent_id   BLOB REFERENCES messages(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(receiver_id, read);
        CREATE INDEX IF NOT EXISTS idx_messages_parent
            ON messages(parent_id);
        CREATE INDEX IF NOT EXISTS idx_messages_timestamp
            ON messages(timestamp);

        -- Append-only edit snapshots. Cascade: removing a message removes
        -- its history regardless of who authored the edits.
        CREATE TABLE IF NOT EXISTS message_history (
            id          BLOB PRIMARY KEY,
            message_id  BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            old_content TEXT NOT NULL,
            edited_by   BLOB NOT NULL REFERENCES users(id),
            edited_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_message
            ON message_history(message_id);
        CREATE INDEX IF NOT EXISTS idx_history_editor
            ON message_history(edited_by);

        -- message_id is NULL only for system notifications. Cascade:
        -- removing a message removes every notification about it, even
        -- notifications owned by other users.
        CREATE TABLE IF NOT EXISTS notifications (
            id          BLOB PRIMARY KEY,
            user_id     BLOB NOT NULL REFERENCES users(id),
            message_id  BLOB REFERENCES messages(id) ON DELETE CASCADE,
            kind        TEXT NOT NULL,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_unread
            ON notifications(user_id, read);
        CREATE INDEX IF NOT EXISTS idx_notifications_message
            ON notifications(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
