use super::{AlertLogStore, SyncLogStore, WriteError};
use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{AlertRecord, AlertStats, SyncLogEntry, SyncStatus};
use std::collections::HashSet;

/// Stores backed by the `sync_logs` and `alert_logs` postgres tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> PgStore {
        PgStore { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SyncLogRow {
    id: uuid::Uuid,
    module_name: String,
    status: SyncStatus,
    last_synced_at: DateTime<Utc>,
    error_message: Option<String>,
    retry_count: i32,
    origin_module: Option<String>,
    target_module: Option<String>,
    sync_duration_ms: Option<i64>,
    records_processed: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<SyncLogRow> for SyncLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: SyncLogRow) -> anyhow::Result<SyncLogEntry> {
        let SyncLogRow {
            id,
            module_name,
            status,
            last_synced_at,
            error_message,
            retry_count,
            origin_module,
            target_module,
            sync_duration_ms,
            records_processed,
            created_at,
        } = row;

        Ok(SyncLogEntry {
            id,
            module_name,
            status,
            last_synced_at,
            error_message,
            retry_count: u32::try_from(retry_count)
                .with_context(|| format!("sync log {id} has invalid retry_count {retry_count}"))?,
            origin_module,
            target_module,
            sync_duration_ms: sync_duration_ms
                .map(u64::try_from)
                .transpose()
                .with_context(|| format!("sync log {id} has negative sync_duration_ms"))?,
            records_processed: u64::try_from(records_processed).with_context(|| {
                format!("sync log {id} has invalid records_processed {records_processed}")
            })?,
            created_at,
        })
    }
}

impl SyncLogStore for PgStore {
    async fn fetch_alertable<'s>(
        &'s self,
        stale_cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            r#"select
                id,
                module_name,
                status::text as status,
                last_synced_at,
                error_message,
                retry_count::int4 as retry_count,
                origin_module,
                target_module,
                sync_duration_ms::int8 as sync_duration_ms,
                coalesce(records_processed, 0)::int8 as records_processed,
                created_at
            from sync_logs
            where status = 'error'
            or (status = 'stale' and last_synced_at <= $1)
            "#,
        )
        .bind(stale_cutoff)
        .fetch_all(&self.pool)
        .await
        .context("querying sync_logs")?;

        rows.into_iter().map(SyncLogEntry::try_from).collect()
    }
}

impl AlertLogStore for PgStore {
    async fn fetch_alerted_log_ids<'s>(
        &'s self,
        since: DateTime<Utc>,
    ) -> anyhow::Result<HashSet<models::Id>> {
        let ids = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"select distinct log_id
            from alert_logs
            where status = 'sent'
            and created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("querying alert_logs")?;

        Ok(ids.into_iter().collect())
    }

    async fn insert_alert<'s>(&'s self, record: AlertRecord) -> Result<(), WriteError> {
        sqlx::query(
            r#"insert into alert_logs (log_id, recipient_email, status, alert_type, created_at)
            values ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.log_id)
        .bind(record.recipient_email.as_str())
        .bind(record.status)
        .bind(record.alert_type.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| WriteError::new(&record, err))?;

        Ok(())
    }

    async fn fetch_stats<'s>(&'s self, since: DateTime<Utc>) -> anyhow::Result<AlertStats> {
        let (sent, failed, alerted_logs) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"select
                count(*) filter (where status = 'sent'),
                count(*) filter (where status = 'failed'),
                count(distinct log_id) filter (where status = 'sent')
            from alert_logs
            where created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("querying alert_logs stats")?;

        Ok(AlertStats {
            since,
            sent: sent.max(0) as u64,
            failed: failed.max(0) as u64,
            alerted_logs: alerted_logs.max(0) as u64,
        })
    }
}
