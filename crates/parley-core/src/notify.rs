//! Notification fan-out. Lifecycle fan-out runs on the mutation's own
//! transaction (explicit synchronous calls from the message store, no hidden
//! observer registration); the dispatcher struct carries the standalone API
//! the presentation layer consumes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::{
    Message, Notification, NotificationKind, Result, StoreError, models::summarize,
};

/// One notification per triggering event: creation fans out to the receiver
/// with a kind matching parent presence; each committed content edit fans
/// out its own `Edit` notification, never deduplicated.
pub struct NotificationDispatcher {
    db: Arc<Database>,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Administrative notice outside the message lifecycle: kind `System`,
    /// no message reference.
    pub fn create_system_notification(
        &self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Notification> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation("notification title is required"));
        }
        if content.trim().is_empty() {
            return Err(StoreError::Validation("notification content is required"));
        }
        self.db.with_conn(|conn| {
            queries::get_user(conn, user_id)?.ok_or(StoreError::user_not_found(user_id))?;
            let n = Notification {
                id: Uuid::new_v4(),
                user_id,
                message_id: None,
                kind: NotificationKind::System,
                title: title.to_string(),
                content: content.to_string(),
                read: false,
                created_at: Utc::now(),
            };
            queries::insert_notification(conn, &n)?;
            info!("system notification {} created for {}", n.id, user_id);
            Ok(n)
        })
    }

    /// Notifications owned by the user, newest first.
    pub fn for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.db.with_conn(|conn| Ok(queries::notifications_for_user(conn, user_id)?))
    }

    /// Notifications referencing one message, oldest first.
    pub fn for_message(&self, message_id: Uuid) -> Result<Vec<Notification>> {
        self.db.with_conn(|conn| Ok(queries::notifications_for_message(conn, message_id)?))
    }

    pub fn unread_count_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.db.with_conn(|conn| Ok(queries::unread_notification_count(conn, user_id)?))
    }

    pub fn mark_read(&self, id: Uuid) -> Result<()> {
        self.db.with_conn(|conn| {
            if queries::set_notification_read(conn, id)? == 0 {
                return Err(StoreError::notification_not_found(id));
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.db.with_conn(|conn| {
            if queries::delete_notification(conn, id)? == 0 {
                return Err(StoreError::notification_not_found(id));
            }
            Ok(())
        })
    }
}

/// Fan-out for a freshly inserted message: one notification to the
/// receiver, `Reply` kind iff the message has a parent.
pub(crate) fn message_created(conn: &Connection, msg: &Message) -> rusqlite::Result<Notification> {
    let sender = sender_name(conn, msg.sender_id)?;
    let summary = msg.summary();
    let (kind, title, content) = if msg.parent_id.is_some() {
        (
            NotificationKind::Reply,
            format!("New reply from {sender}"),
            format!("{sender} replied to your message: \"{summary}\""),
        )
    } else {
        (
            NotificationKind::Message,
            format!("New message from {sender}"),
            format!("You received a new message: \"{summary}\""),
        )
    };
    insert(conn, msg.receiver_id, Some(msg.id), kind, title, content, msg.timestamp)
}

/// Fan-out for a committed content change: one `Edit` notification to the
/// receiver, summarizing the new content.
pub(crate) fn message_edited(
    conn: &Connection,
    msg: &Message,
    new_content: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Notification> {
    let sender = sender_name(conn, msg.sender_id)?;
    insert(
        conn,
        msg.receiver_id,
        Some(msg.id),
        NotificationKind::Edit,
        format!("Message edited by {sender}"),
        format!("A message you received was edited: \"{}\"", summarize(new_content)),
        now,
    )
}

/// Read-state propagation: flip the receiver's unread notifications about
/// this message to read. One-directional; marking the message unread later
/// never reverts these.
pub(crate) fn propagate_read(
    conn: &Connection,
    receiver_id: Uuid,
    message_id: Uuid,
) -> rusqlite::Result<usize> {
    queries::mark_message_notifications_read(conn, receiver_id, message_id)
}

fn sender_name(conn: &Connection, sender_id: Uuid) -> rusqlite::Result<String> {
    Ok(queries::get_username(conn, sender_id)?.unwrap_or_else(|| "unknown".to_string()))
}

fn insert(
    conn: &Connection,
    user_id: Uuid,
    message_id: Option<Uuid>,
    kind: NotificationKind,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
) -> rusqlite::Result<Notification> {
    let n = Notification {
        id: Uuid::new_v4(),
        user_id,
        message_id,
        kind,
        title,
        content,
        read: false,
        created_at,
    };
    queries::insert_notification(conn, &n)?;
    debug!("{} notification {} created for {}", n.kind.as_str(), n.id, user_id);
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MessageStore;
    use crate::testutil::{add_user, test_db};

    #[test]
    fn creation_notifies_the_receiver() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "Hi Bob").unwrap();

        let notifications = dispatcher.for_user(bob).unwrap();
        assert_eq!(notifications.len(), 1);
        let n = &notifications[0];
        assert_eq!(n.kind, NotificationKind::Message);
        assert_eq!(n.message_id, Some(msg.id));
        assert_eq!(n.title, "New message from alice");
        assert_eq!(n.content, "You received a new message: \"Hi Bob\"");
        assert!(!n.read);

        // The sender gets nothing.
        assert!(dispatcher.for_user(alice).unwrap().is_empty());
    }

    #[test]
    fn reply_notification_has_reply_kind() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let root = store.send(alice, bob, "Hi").unwrap();
        let reply = store.reply(bob, root.id, "Hello back").unwrap();

        let notifications = dispatcher.for_user(alice).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Reply);
        assert_eq!(notifications[0].message_id, Some(reply.id));
        assert_eq!(notifications[0].title, "New reply from bob");
    }

    #[test]
    fn long_content_is_truncated_in_the_summary() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let long = "x".repeat(80);
        store.send(alice, bob, &long).unwrap();

        let n = &dispatcher.for_user(bob).unwrap()[0];
        let expected = format!("You received a new message: \"{}...\"", "x".repeat(50));
        assert_eq!(n.content, expected);
    }

    #[test]
    fn every_edit_fans_out_its_own_notification() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "v1").unwrap();
        store.edit(msg.id, "v2").unwrap();
        store.edit(msg.id, "v3").unwrap();

        let kinds: Vec<NotificationKind> = dispatcher
            .for_message(msg.id)
            .unwrap()
            .iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Message,
                NotificationKind::Edit,
                NotificationKind::Edit
            ]
        );
    }

    #[test]
    fn no_op_edit_fans_out_nothing() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "same").unwrap();
        store.edit(msg.id, "same").unwrap();

        assert_eq!(dispatcher.for_message(msg.id).unwrap().len(), 1);
    }

    #[test]
    fn read_propagation_is_one_directional() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "Hi").unwrap();
        store.edit(msg.id, "Hi there").unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 2);

        store.mark_read(msg.id).unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 0);
        assert!(dispatcher.for_message(msg.id).unwrap().iter().all(|n| n.read));

        // Flipping the message back does not revert the notifications.
        store.mark_unread(msg.id).unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 0);
    }

    #[test]
    fn marking_read_twice_propagates_once() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "Hi").unwrap();
        store.mark_read(msg.id).unwrap();
        store.mark_read(msg.id).unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 0);
    }

    #[test]
    fn system_notification_bypasses_message_lifecycle() {
        let db = test_db();
        let charlie = add_user(&db, "charlie");
        let dispatcher = NotificationDispatcher::new(db);

        let n = dispatcher
            .create_system_notification(charlie, "Maintenance", "Down Sunday at 2 AM.")
            .unwrap();
        assert_eq!(n.kind, NotificationKind::System);
        assert!(n.message_id.is_none());

        let listed = dispatcher.for_user(charlie).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Maintenance");
    }

    #[test]
    fn system_notification_requires_title_and_content() {
        let db = test_db();
        let charlie = add_user(&db, "charlie");
        let dispatcher = NotificationDispatcher::new(db);

        assert!(matches!(
            dispatcher.create_system_notification(charlie, "", "body"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            dispatcher.create_system_notification(charlie, "title", "  "),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn mark_read_and_delete_require_existing_notification() {
        let db = test_db();
        let charlie = add_user(&db, "charlie");
        let dispatcher = NotificationDispatcher::new(db);

        let n = dispatcher
            .create_system_notification(charlie, "t", "c")
            .unwrap();
        dispatcher.mark_read(n.id).unwrap();
        dispatcher.delete(n.id).unwrap();

        assert!(matches!(
            dispatcher.mark_read(n.id),
            Err(StoreError::NotFound { entity: "notification", .. })
        ));
        assert!(matches!(
            dispatcher.delete(n.id),
            Err(StoreError::NotFound { entity: "notification", .. })
        ));
    }

    // Scenario: Alice messages Bob, edits it, Bob reads it.
    #[test]
    fn edit_then_read_full_flow() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let store = MessageStore::new(db.clone());
        let dispatcher = NotificationDispatcher::new(db);

        let msg = store.send(alice, bob, "Hi").unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 1);
        assert_eq!(
            dispatcher.for_user(bob).unwrap()[0].kind,
            NotificationKind::Message
        );

        store.edit(msg.id, "Hi there").unwrap();
        let history = store.history(msg.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_content, "Hi");
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 2);

        store.mark_read(msg.id).unwrap();
        assert_eq!(dispatcher.unread_count_for_user(bob).unwrap(), 0);
    }
}
