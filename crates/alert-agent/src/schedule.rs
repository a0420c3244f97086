use crate::api::App;
use crate::dispatch::EmailSender;
use crate::store::{AlertLogStore, SyncLogStore};
use std::sync::Arc;

/// Runs an alert pass every `interval` until `shutdown` resolves. The first
/// pass runs immediately. A failed pass is logged, and is retried at the next
/// interval.
pub async fn serve<DB, ES>(
    app: Arc<App<DB, ES>>,
    interval: std::time::Duration,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(interval = %humantime::format_duration(interval), "starting scheduled alert passes");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        // A pass in progress is allowed to complete before shutdown is observed.
        match app.run_pass(chrono::Utc::now(), None).await {
            Ok(summary) if summary.processed > 0 => {
                tracing::info!(?summary, "scheduled alert pass completed");
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(?error, "scheduled alert pass failed");
            }
        }
    }
    tracing::info!("scheduled alert passes stopped");
    Ok(())
}
