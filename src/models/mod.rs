//! Data models persisted through the document store.

pub mod mail;
pub mod notification;
pub mod offer;
pub mod suppression;
pub mod user;

pub use mail::{MailRecord, MailStatus, TemplateRef};
pub use notification::{NotificationKind, NotificationRecord};
pub use offer::{CustomerResponse, OfferRecord, StatusHistoryEntry};
pub use suppression::{
    SuppressionAction, SuppressionAuditEntry, SuppressionReason, SuppressionRecord,
};
pub use user::UserRecord;
