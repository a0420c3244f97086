use crate::dispatch::{Dispatcher, EmailSender};
use crate::selector::select_failures;
use crate::store::{AlertLogStore, SyncLogStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{AlertRecipient, AlertSummary, SyncLogEntry};
use notifications::{NotificationEmail, Renderer};

/// Renders the alert email for a sync log entry.
pub trait Formatter: std::fmt::Debug + Send + Sync + 'static {
    fn render(&self, entry: &SyncLogEntry) -> anyhow::Result<NotificationEmail>;
}

impl Formatter for Renderer {
    fn render(&self, entry: &SyncLogEntry) -> anyhow::Result<NotificationEmail> {
        Renderer::render(self, entry)
    }
}

/// Runs alert passes: selects sync failures which need alerting, and
/// renders and dispatches an alert for each one.
///
/// Nothing prevents two passes from running at once. Overlapping passes may
/// both select the same failure before either records a `sent` alert for it,
/// in which case recipients receive the alert twice.
#[derive(Debug)]
pub struct Orchestrator<DB, ES, F = Renderer> {
    store: DB,
    renderer: F,
    dispatcher: Dispatcher<ES>,
    default_recipients: Vec<AlertRecipient>,
}

impl<DB, ES, F> Orchestrator<DB, ES, F>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
    F: Formatter,
{
    pub fn new(
        store: DB,
        renderer: F,
        dispatcher: Dispatcher<ES>,
        default_recipients: Vec<AlertRecipient>,
    ) -> Orchestrator<DB, ES, F> {
        Orchestrator {
            store,
            renderer,
            dispatcher,
            default_recipients,
        }
    }

    pub fn store(&self) -> &DB {
        &self.store
    }

    /// Runs a single alert pass as of `now`, alerting `recipients` or the
    /// default recipients if none are given. Each selected failure is handled
    /// independently, and a failure to render or dispatch one alert is counted
    /// in `errors` rather than being returned. Only a failure to select
    /// returns an error, and in that case no alerts are sent.
    #[tracing::instrument(skip_all, fields(%now))]
    pub async fn run_pass(
        &self,
        now: DateTime<Utc>,
        recipients: Option<&[AlertRecipient]>,
    ) -> anyhow::Result<AlertSummary> {
        let failures = select_failures(now, &self.store)
            .await
            .context("selecting sync failures")?;

        if failures.is_empty() {
            tracing::debug!("no sync failures to alert on");
            return Ok(AlertSummary::default());
        }
        let recipients = recipients.unwrap_or(self.default_recipients.as_slice());

        let mut summary = AlertSummary {
            processed: failures.len(),
            ..Default::default()
        };
        for entry in &failures {
            match self.alert(entry, recipients).await {
                Ok(()) => summary.alerted += 1,
                Err(error) => {
                    tracing::error!(log_id = %entry.id, module_name = %entry.module_name, ?error, "failed to alert on sync failure");
                    summary.errors += 1;
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            alerted = summary.alerted,
            errors = summary.errors,
            "finished alert pass"
        );
        Ok(summary)
    }

    async fn alert(&self, entry: &SyncLogEntry, recipients: &[AlertRecipient]) -> anyhow::Result<()> {
        let email = self
            .renderer
            .render(entry)
            .with_context(|| format!("rendering alert for sync log {}", entry.id))?;
        self.dispatcher
            .dispatch(&self.store, &email, recipients)
            .await?;
        Ok(())
    }
}
