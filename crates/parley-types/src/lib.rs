pub mod error;
pub mod models;
pub mod views;

pub use error::{Result, StoreError};
pub use models::{Message, MessageHistory, Notification, NotificationKind, User};
pub use views::UnreadMessage;
