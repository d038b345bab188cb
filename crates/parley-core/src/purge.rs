//! Transactional account purge: one transaction removes everything the user
//! owns or participates in, then the identity mirror row itself.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::Result;

pub struct AccountPurge {
    db: Arc<Database>,
}

/// Row counts removed by a purge; zeroes everywhere means the account was
/// already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub messages: usize,
    pub notifications: usize,
    pub history: usize,
    pub user_removed: bool,
}

impl AccountPurge {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Delete every message the user sent or received (cascades take every
    /// notification and history row referencing those messages, whoever
    /// owns them), the user's remaining notifications, the history rows
    /// they authored, and finally the user row. All-or-nothing: any step
    /// failing rolls the whole purge back. Safe to invoke twice; deleting
    /// already-absent rows is a no-op.
    pub fn delete_account(&self, user_id: Uuid) -> Result<PurgeReport> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let messages = queries::delete_messages_involving(&tx, user_id)?;
            let notifications = queries::delete_notifications_for_user(&tx, user_id)?;
            let history = queries::delete_history_by_editor(&tx, user_id)?;
            let user_removed = queries::delete_user(&tx, user_id)? > 0;
            tx.commit()?;
            let report = PurgeReport { messages, notifications, history, user_removed };
            info!(
                "account {} purged: {} messages, {} notifications, {} history rows",
                user_id, messages, notifications, history
            );
            Ok(report)
        })
    }
}
