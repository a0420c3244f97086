mod alerts;
mod sync_log;

pub use alerts::{
    default_recipients, parse_recipient_list, AlertRecipient, AlertRecord, AlertStats, AlertStatus,
    AlertSummary, InvalidRecipient, SYNC_FAILURE_ALERT_TYPE,
};
pub use sync_log::{SyncLogEntry, SyncStatus};

/// Opaque identifier of a sync log entry.
pub type Id = uuid::Uuid;
