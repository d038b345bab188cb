//! Edit-history recording. Runs on the edit transaction: the snapshot is
//! written before the content update commits, so a rollback takes both.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use parley_db::queries;
use parley_types::{Message, MessageHistory};

/// Compare the persisted content against the incoming content and, if they
/// differ, append one immutable snapshot of the old content. Returns the
/// snapshot, or `None` when the edit changes nothing. Creation never goes
/// through here; only updates of an already-persisted message do.
pub fn record_edit(
    conn: &Connection,
    message: &Message,
    new_content: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Option<MessageHistory>> {
    if message.content == new_content {
        return Ok(None);
    }
    let entry = MessageHistory {
        id: Uuid::new_v4(),
        message_id: message.id,
        old_content: message.content.clone(),
        edited_by: message.sender_id,
        edited_at: now,
    };
    queries::insert_history(conn, &entry)?;
    debug!("history snapshot {} recorded for message {}", entry.id, message.id);
    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use crate::store::MessageStore;
    use crate::testutil::{add_user, test_db};

    #[test]
    fn edit_snapshots_the_old_content() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db);

        let msg = store.send(alice, bob, "Hi").unwrap();
        let edited = store.edit(msg.id, "Hi there").unwrap();
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());
        assert_eq!(edited.content, "Hi there");
        // Creation time never moves.
        assert_eq!(edited.timestamp, msg.timestamp);

        let history = store.history(msg.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_content, "Hi");
        assert_eq!(history[0].edited_by, alice);
    }

    #[test]
    fn identical_content_records_nothing() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db);

        let msg = store.send(alice, bob, "same").unwrap();
        let unchanged = store.edit(msg.id, "same").unwrap();
        assert!(!unchanged.edited);
        assert!(unchanged.edited_at.is_none());
        assert!(store.history(msg.id).unwrap().is_empty());
    }

    #[test]
    fn each_committed_edit_appends_one_row() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db);

        let msg = store.send(alice, bob, "v1").unwrap();
        store.edit(msg.id, "v2").unwrap();
        store.edit(msg.id, "v3").unwrap();

        let history = store.history(msg.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old_content, "v1");
        assert_eq!(history[1].old_content, "v2");
        assert_eq!(store.get(msg.id).unwrap().content, "v3");
    }

    #[test]
    fn history_of_unknown_message_is_not_found() {
        let db = test_db();
        let store = MessageStore::new(db);
        assert!(store.history(uuid::Uuid::new_v4()).is_err());
    }
}
