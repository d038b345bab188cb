//! Threaded direct-messaging core: message store with thread navigation,
//! edit-history auditing, notification fan-out, an unread index, and
//! transactional account purge. Consumed in-process by a presentation
//! layer; every mutation commits its side effects in one transaction.

pub mod history;
pub mod notify;
pub mod purge;
pub mod store;
pub mod unread;

pub use notify::NotificationDispatcher;
pub use purge::{AccountPurge, PurgeReport};
pub use store::{MAX_THREAD_DEPTH, MessageStore};
pub use unread::UnreadIndex;

pub use parley_types::{
    Message, MessageHistory, Notification, NotificationKind, Result, StoreError, UnreadMessage,
    User,
};
