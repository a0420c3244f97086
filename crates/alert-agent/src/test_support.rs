use crate::dispatch::EmailSender;
use crate::selector::{is_alert_worthy, stale_threshold};
use crate::store::{AlertLogStore, SyncLogStore, WriteError};
use chrono::{DateTime, Utc};
use models::{AlertRecipient, AlertRecord, AlertStats, AlertStatus, SyncLogEntry, SyncStatus};
use notifications::NotificationEmail;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn sync_log(status: SyncStatus, last_synced_at: DateTime<Utc>) -> SyncLogEntry {
    SyncLogEntry {
        id: uuid::Uuid::new_v4(),
        module_name: "hris-sync".to_string(),
        status,
        last_synced_at,
        error_message: match status {
            SyncStatus::Error => Some("upstream returned 503".to_string()),
            _ => None,
        },
        retry_count: 0,
        origin_module: Some("hris".to_string()),
        target_module: Some("payroll".to_string()),
        sync_duration_ms: None,
        records_processed: 0,
        created_at: last_synced_at,
    }
}

pub fn recipients(emails: &[&str]) -> Vec<AlertRecipient> {
    emails
        .iter()
        .map(|email| AlertRecipient {
            email: email.to_string(),
            name: None,
        })
        .collect()
}

/// In-memory sync and alert logs, with switches for injecting failures.
#[derive(Debug, Clone)]
pub struct MemoryStore(Arc<Mutex<MemoryStoreInner>>);

#[derive(Debug, Default)]
struct MemoryStoreInner {
    sync_logs: Vec<SyncLogEntry>,
    alerts: Vec<AlertRecord>,
    fail_sync_log_reads: bool,
    fail_alert_log_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new(sync_logs: Vec<SyncLogEntry>) -> Self {
        Self(Arc::new(Mutex::new(MemoryStoreInner {
            sync_logs,
            ..Default::default()
        })))
    }

    pub async fn push_alerts(&self, alerts: Vec<AlertRecord>) {
        self.0.lock().await.alerts.extend(alerts);
    }

    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.0.lock().await.alerts.clone()
    }

    pub async fn set_fail_sync_log_reads(&self, fail: bool) {
        self.0.lock().await.fail_sync_log_reads = fail;
    }

    pub async fn set_fail_alert_log_reads(&self, fail: bool) {
        self.0.lock().await.fail_alert_log_reads = fail;
    }

    pub async fn set_fail_writes(&self, fail: bool) {
        self.0.lock().await.fail_writes = fail;
    }
}

impl SyncLogStore for MemoryStore {
    async fn fetch_alertable<'s>(
        &'s self,
        stale_cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SyncLogEntry>> {
        let lock = self.0.lock().await;
        if lock.fail_sync_log_reads {
            anyhow::bail!("mock error reading sync logs");
        }
        // The cutoff is always `now - stale_threshold()`.
        let now = stale_cutoff + stale_threshold();
        Ok(lock
            .sync_logs
            .iter()
            .filter(|entry| is_alert_worthy(entry, now))
            .cloned()
            .collect())
    }
}

impl AlertLogStore for MemoryStore {
    async fn fetch_alerted_log_ids<'s>(
        &'s self,
        since: DateTime<Utc>,
    ) -> anyhow::Result<HashSet<models::Id>> {
        let lock = self.0.lock().await;
        if lock.fail_alert_log_reads {
            anyhow::bail!("mock error reading alert logs");
        }
        Ok(lock
            .alerts
            .iter()
            .filter(|alert| alert.status == AlertStatus::Sent && alert.created_at >= since)
            .map(|alert| alert.log_id)
            .collect())
    }

    async fn insert_alert<'s>(&'s self, record: AlertRecord) -> Result<(), WriteError> {
        let mut lock = self.0.lock().await;
        if lock.fail_writes {
            return Err(WriteError::new(
                &record,
                anyhow::anyhow!("mock error writing alert log"),
            ));
        }
        lock.alerts.push(record);
        Ok(())
    }

    async fn fetch_stats<'s>(&'s self, since: DateTime<Utc>) -> anyhow::Result<AlertStats> {
        let lock = self.0.lock().await;
        if lock.fail_alert_log_reads {
            anyhow::bail!("mock error reading alert logs");
        }
        let recent = lock.alerts.iter().filter(|a| a.created_at >= since);

        let mut stats = AlertStats {
            since,
            sent: 0,
            failed: 0,
            alerted_logs: 0,
        };
        let mut alerted = HashSet::new();
        for alert in recent {
            match alert.status {
                AlertStatus::Sent => {
                    stats.sent += 1;
                    alerted.insert(alert.log_id);
                }
                AlertStatus::Failed => stats.failed += 1,
            }
        }
        stats.alerted_logs = alerted.len() as u64;
        Ok(stats)
    }
}

/// Records sent emails, failing sends to chosen recipients.
#[derive(Debug, Clone)]
pub struct TestSender(Arc<Mutex<TestSenderInner>>);

#[derive(Debug, Default)]
struct TestSenderInner {
    fail_for: HashSet<String>,
    delay: Option<std::time::Duration>,
    attempts: usize,
    sent: Vec<(String, NotificationEmail)>,
}

impl TestSender {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(TestSenderInner::default())))
    }

    pub async fn take_sent(&self) -> Vec<(String, NotificationEmail)> {
        std::mem::take(&mut self.0.lock().await.sent)
    }

    pub async fn attempts(&self) -> usize {
        self.0.lock().await.attempts
    }

    pub async fn fail_for(&self, email: &str) {
        self.0.lock().await.fail_for.insert(email.to_string());
    }

    pub async fn set_delay(&self, delay: std::time::Duration) {
        self.0.lock().await.delay = Some(delay);
    }
}

impl EmailSender for TestSender {
    async fn send<'s>(
        &'s self,
        recipient: &'s AlertRecipient,
        email: &'s NotificationEmail,
    ) -> anyhow::Result<()> {
        let delay = {
            let mut lock = self.0.lock().await;
            lock.attempts += 1;
            lock.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut lock = self.0.lock().await;
        if lock.fail_for.contains(&recipient.email) {
            anyhow::bail!(
                "mock error sending alert email for '{}' to '{}'",
                email.log_id,
                recipient.email
            );
        }
        lock.sent.push((recipient.email.clone(), email.clone()));
        Ok(())
    }
}
