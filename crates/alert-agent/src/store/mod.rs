//! Access to the sync log and alert log tables.
//!
//! Both tables are owned by other systems. The alert agent only ever reads
//! `sync_logs` and only ever appends to `alert_logs`.
use chrono::{DateTime, Utc};
use models::{AlertRecord, AlertStats, AlertStatus, SyncLogEntry};
use std::collections::HashSet;
use std::future::Future;

mod postgres;

pub use postgres::PgStore;

/// Failure to append an alert record. Callers treat alert bookkeeping as
/// best-effort, so this is a distinct type from read errors.
#[derive(Debug, thiserror::Error)]
#[error("failed to record {status} alert to {recipient_email} for sync log {log_id}")]
pub struct WriteError {
    pub log_id: models::Id,
    pub recipient_email: String,
    pub status: AlertStatus,
    #[source]
    pub source: anyhow::Error,
}

impl WriteError {
    pub fn new(record: &AlertRecord, source: impl Into<anyhow::Error>) -> WriteError {
        WriteError {
            log_id: record.log_id,
            recipient_email: record.recipient_email.clone(),
            status: record.status,
            source: source.into(),
        }
    }
}

pub trait SyncLogStore: std::fmt::Debug + Send + Sync + 'static {
    /// Returns all entries with status `error`, and all entries with status
    /// `stale` which were last synced at or before `stale_cutoff`.
    fn fetch_alertable<'s>(
        &'s self,
        stale_cutoff: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<Vec<SyncLogEntry>>> + Send + 's;
}

pub trait AlertLogStore: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the ids of sync log entries having a `sent` alert created at or after `since`.
    fn fetch_alerted_log_ids<'s>(
        &'s self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<HashSet<models::Id>>> + Send + 's;

    fn insert_alert<'s>(
        &'s self,
        record: AlertRecord,
    ) -> impl Future<Output = Result<(), WriteError>> + Send + 's;

    fn fetch_stats<'s>(
        &'s self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<AlertStats>> + Send + 's;
}
