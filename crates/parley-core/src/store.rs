use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::{Message, MessageHistory, Result, StoreError, User};

use crate::{history, notify};

/// Hard cap on parent-chain ascent. Real threads never get close; walking
/// past this means the parent references are corrupted.
pub const MAX_THREAD_DEPTH: u32 = 1000;

/// Owns message rows and thread navigation. Mutations open one transaction
/// covering the direct write plus the history and notification side effects,
/// so callers observe full consistency on return.
pub struct MessageStore {
    db: Arc<Database>,
}

impl MessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // -- Identity mirror --

    /// Mirror an identity-provider record so foreign keys resolve. The core
    /// never originates users; it only tracks what the provider supplies.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.db.with_conn(|conn| Ok(queries::upsert_user(conn, user)?))
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.db.with_conn(|conn| {
            queries::get_user(conn, id)?.ok_or(StoreError::user_not_found(id))
        })
    }

    // -- Creation --

    /// Send a thread-starting message. Fans out one `Message`-kind
    /// notification to the receiver within the same transaction.
    pub fn send(&self, sender: Uuid, receiver: Uuid, content: &str) -> Result<Message> {
        validate_content(content)?;
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            queries::get_user(&tx, sender)?.ok_or(StoreError::user_not_found(sender))?;
            queries::get_user(&tx, receiver)?.ok_or(StoreError::user_not_found(receiver))?;
            let msg = create_in_tx(&tx, sender, receiver, content, None)?;
            tx.commit()?;
            info!("message {} sent from {} to {}", msg.id, sender, receiver);
            Ok(msg)
        })
    }

    /// Reply within a thread. The receiver is computed as the parent's other
    /// participant, not caller-supplied; only participants may reply.
    pub fn reply(&self, author: Uuid, parent_id: Uuid, content: &str) -> Result<Message> {
        validate_content(content)?;
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let parent = queries::get_message(&tx, parent_id)?
                .ok_or(StoreError::message_not_found(parent_id))?;
            if !Self::can_reply(&parent, author) {
                return Err(StoreError::PermissionDenied { user: author, message: parent_id });
            }
            let receiver = if parent.sender_id == author {
                parent.receiver_id
            } else {
                parent.sender_id
            };
            let msg = create_in_tx(&tx, author, receiver, content, Some(parent.id))?;
            tx.commit()?;
            info!("reply {} to message {} sent by {}", msg.id, parent_id, author);
            Ok(msg)
        })
    }

    /// True iff `user` is a participant (sender or receiver) of `message`.
    pub fn can_reply(message: &Message, user: Uuid) -> bool {
        message.sender_id == user || message.receiver_id == user
    }

    // -- Lookup & thread navigation --

    pub fn get(&self, id: Uuid) -> Result<Message> {
        self.db.with_conn(|conn| {
            queries::get_message(conn, id)?.ok_or(StoreError::message_not_found(id))
        })
    }

    /// Ascend parent references iteratively until a parentless message is
    /// reached. Depth-capped: a chain longer than [`MAX_THREAD_DEPTH`] is
    /// treated as corrupted rather than walked forever.
    pub fn thread_root(&self, id: Uuid) -> Result<Message> {
        self.db.with_conn(|conn| {
            let mut current =
                queries::get_message(conn, id)?.ok_or(StoreError::message_not_found(id))?;
            let mut hops = 0u32;
            while let Some(parent_id) = current.parent_id {
                hops += 1;
                if hops > MAX_THREAD_DEPTH {
                    return Err(StoreError::ThreadCycleDetected {
                        message: id,
                        max_depth: MAX_THREAD_DEPTH,
                    });
                }
                current = queries::get_message(conn, parent_id)?
                    .ok_or(StoreError::message_not_found(parent_id))?;
            }
            Ok(current)
        })
    }

    /// The root plus its direct replies, chronological. Thread listing is
    /// flat by contract: replies targeting a non-root parent are reachable
    /// through their own parent, not gathered here.
    pub fn thread_messages(&self, root_id: Uuid) -> Result<Vec<Message>> {
        self.db.with_conn(|conn| {
            let root = queries::get_message(conn, root_id)?
                .ok_or(StoreError::message_not_found(root_id))?;
            let mut thread = vec![root];
            thread.extend(queries::direct_replies(conn, root_id)?);
            Ok(thread)
        })
    }

    /// Every sender and receiver across the root and its direct replies.
    pub fn participants(&self, root_id: Uuid) -> Result<HashSet<Uuid>> {
        let thread = self.thread_messages(root_id)?;
        let mut users = HashSet::new();
        for msg in &thread {
            users.insert(msg.sender_id);
            users.insert(msg.receiver_id);
        }
        Ok(users)
    }

    /// Thread roots the user participates in, newest first.
    pub fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Message>> {
        self.db.with_conn(|conn| Ok(queries::thread_roots_for_user(conn, user_id)?))
    }

    /// Edit snapshots for a message, oldest edit first.
    pub fn history(&self, message_id: Uuid) -> Result<Vec<MessageHistory>> {
        self.db.with_conn(|conn| {
            queries::get_message(conn, message_id)?
                .ok_or(StoreError::message_not_found(message_id))?;
            Ok(queries::history_for_message(conn, message_id)?)
        })
    }

    // -- Mutation --

    /// Update message content. A real content change snapshots the old
    /// content, flips the edited flag, and fans out an `Edit` notification;
    /// an identical-content edit commits nothing at all.
    pub fn edit(&self, id: Uuid, new_content: &str) -> Result<Message> {
        validate_content(new_content)?;
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let msg =
                queries::get_message(&tx, id)?.ok_or(StoreError::message_not_found(id))?;
            let now = Utc::now();
            let Some(entry) = history::record_edit(&tx, &msg, new_content, now)? else {
                // No content change: no history row, no flag, no notification.
                return Ok(msg);
            };
            queries::update_message_content(&tx, id, new_content, now)?;
            notify::message_edited(&tx, &msg, new_content, now)?;
            tx.commit()?;
            info!("message {} edited, history row {} recorded", id, entry.id);
            Ok(Message {
                content: new_content.to_string(),
                edited: true,
                edited_at: Some(now),
                ..msg
            })
        })
    }

    /// Mark a message read. The false→true transition also marks the
    /// receiver's unread notifications about this message as read.
    pub fn mark_read(&self, id: Uuid) -> Result<()> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let msg =
                queries::get_message(&tx, id)?.ok_or(StoreError::message_not_found(id))?;
            if !msg.read {
                queries::set_message_read(&tx, id, true)?;
                let propagated = notify::propagate_read(&tx, msg.receiver_id, id)?;
                tx.commit()?;
                debug!("message {} read, {} notifications propagated", id, propagated);
            }
            Ok(())
        })
    }

    /// Flip the message back to unread. One-directional propagation:
    /// notifications already marked read stay read.
    pub fn mark_unread(&self, id: Uuid) -> Result<()> {
        self.db.with_conn(|conn| {
            let changed = queries::set_message_read(conn, id, false)?;
            if changed == 0 {
                return Err(StoreError::message_not_found(id));
            }
            Ok(())
        })
    }

    /// Explicit single-message deletion. Foreign-key cascades remove every
    /// notification and history row referencing the message, whoever owns
    /// them; direct replies are orphaned into thread starters.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.db.with_conn(|conn| {
            let removed = queries::delete_message(conn, id)?;
            if removed == 0 {
                return Err(StoreError::message_not_found(id));
            }
            info!("message {} deleted", id);
            Ok(())
        })
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(StoreError::Validation("message content is required"));
    }
    Ok(())
}

/// Insert a message and fan out its creation notification on the caller's
/// transaction.
fn create_in_tx(
    conn: &Connection,
    sender: Uuid,
    receiver: Uuid,
    content: &str,
    parent_id: Option<Uuid>,
) -> Result<Message> {
    let msg = Message {
        id: Uuid::new_v4(),
        sender_id: sender,
        receiver_id: receiver,
        content: content.to_string(),
        timestamp: Utc::now(),
        read: false,
        edited: false,
        edited_at: None,
        parent_id,
    };
    queries::insert_message(conn, &msg)?;
    notify::message_created(conn, &msg)?;
    Ok(msg)
}
