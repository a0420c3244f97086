use crate::store::{AlertLogStore, SyncLogStore};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use models::{SyncLogEntry, SyncStatus};

/// A `stale` sync becomes alert-worthy once it has gone this long without activity.
pub fn stale_threshold() -> Duration {
    Duration::minutes(15)
}

/// A `sent` alert suppresses further alerts for the same sync log within this window.
pub fn dedup_window() -> Duration {
    Duration::hours(24)
}

/// Returns whether `entry` warrants an alert as of `now`, ignoring any alerts
/// already sent for it. Failed syncs always do. Stale syncs do once they've
/// gone at least `stale_threshold()` without activity.
pub fn is_alert_worthy(entry: &SyncLogEntry, now: DateTime<Utc>) -> bool {
    match entry.status {
        SyncStatus::Error => true,
        SyncStatus::Stale => now - entry.last_synced_at >= stale_threshold(),
        SyncStatus::Success => false,
    }
}

/// Returns the sync log entries which currently warrant an alert and have not
/// already been successfully alerted within the dedup window. Only `sent`
/// alerts count, so an entry whose alerts all failed is selected again.
///
/// Both reads must succeed: if either fails then nothing is selected and the
/// error is returned.
pub async fn select_failures<DB>(now: DateTime<Utc>, store: &DB) -> anyhow::Result<Vec<SyncLogEntry>>
where
    DB: SyncLogStore + AlertLogStore,
{
    let stale_cutoff = now - stale_threshold();
    let dedup_since = now - dedup_window();

    let candidates = store
        .fetch_alertable(stale_cutoff)
        .await
        .context("fetching failed and stale syncs")?;
    let already_alerted = store
        .fetch_alerted_log_ids(dedup_since)
        .await
        .context("fetching recently alerted sync logs")?;

    let candidate_count = candidates.len();
    let selected: Vec<SyncLogEntry> = candidates
        .into_iter()
        .filter(|entry| is_alert_worthy(entry, now) && !already_alerted.contains(&entry.id))
        .collect();

    tracing::debug!(
        %candidate_count,
        already_alerted = already_alerted.len(),
        selected = selected.len(),
        %stale_cutoff,
        "selected sync failures"
    );
    Ok(selected)
}
