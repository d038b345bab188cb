//! Read-optimized query surface over unread messages. Pure read path: no
//! transaction, no side effects.

use std::sync::Arc;

use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::{Result, UnreadMessage};

pub struct UnreadIndex {
    db: Arc<Database>,
}

impl UnreadIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Unread messages received by the user, newest first, projected down to
    /// the fields a client list view needs. Messages the user sent never
    /// appear here, whatever their read flag.
    pub fn for_user(&self, user_id: Uuid) -> Result<Vec<UnreadMessage>> {
        self.db.with_conn(|conn| Ok(queries::unread_for_user(conn, user_id)?))
    }

    /// Same filter as [`Self::for_user`], counted in the engine without
    /// materializing rows.
    pub fn count_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.db.with_conn(|conn| Ok(queries::unread_count_for_user(conn, user_id)?))
    }
}
