use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload-minimized projection served by the unread index. Carries only
/// what a client list view needs; notably no receiver, no edit metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub parent_id: Option<Uuid>,
}
