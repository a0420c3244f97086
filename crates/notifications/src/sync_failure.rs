use super::{format_timestamp, template_names};
use anyhow::Context;
use models::{SyncLogEntry, SyncStatus};

const UNKNOWN: &str = "Unknown";

const SUBJECT: &str = r#"[Alert] Sync Failed: {{{subject_origin}}} → {{{subject_target}}}"#;

const DETAILS: &str = r#"<table class="details">
                <tr><th>Module</th><td>{{module_name}}</td></tr>
                <tr><th>Origin</th><td>{{origin}}</td></tr>
                <tr><th>Target</th><td>{{target}}</td></tr>
                <tr><th>Last Sync</th><td>{{last_synced_at}}</td></tr>
                <tr><th>Retry Count</th><td>{{retry_count}}</td></tr>
                <tr><th>Records Processed</th><td>{{records_processed}}</td></tr>
                {{#if has_duration}}<tr><th>Sync Duration</th><td>{{sync_duration_ms}} ms</td></tr>{{/if}}
                <tr><th>Logged At</th><td>{{created_at}}</td></tr>
                <tr><th>Log ID</th><td><code>{{log_id}}</code></td></tr>
            </table>"#;

/// Arguments available to the sync failure templates.
#[derive(Debug, serde::Serialize)]
pub struct SyncFailureArgs<'a> {
    log_id: String,
    module_name: &'a str,
    origin: &'a str,
    target: &'a str,
    subject_origin: &'a str,
    subject_target: &'a str,
    last_synced_at: String,
    created_at: String,
    retry_count: u32,
    records_processed: u64,
    has_duration: bool,
    sync_duration_ms: Option<u64>,
    error_message: Option<&'a str>,
}

impl<'a> SyncFailureArgs<'a> {
    pub fn new(entry: &'a SyncLogEntry) -> SyncFailureArgs<'a> {
        let origin = entry.origin_module.as_deref();
        let target = entry.target_module.as_deref().unwrap_or(UNKNOWN);

        SyncFailureArgs {
            log_id: entry.id.to_string(),
            module_name: &entry.module_name,
            origin: origin.unwrap_or(UNKNOWN),
            target,
            subject_origin: origin.unwrap_or(&entry.module_name),
            subject_target: target,
            last_synced_at: format_timestamp(entry.last_synced_at),
            created_at: format_timestamp(entry.created_at),
            retry_count: entry.retry_count,
            records_processed: entry.records_processed,
            has_duration: entry.sync_duration_ms.is_some(),
            sync_duration_ms: entry.sync_duration_ms,
            error_message: entry.error_message.as_deref(),
        }
    }
}

pub fn register_templates<'a>(registry: &mut handlebars::Handlebars<'a>) -> anyhow::Result<()> {
    let (error_subject, error_body) = template_names(SyncStatus::Error);
    registry
        .register_template_string(&error_subject, SUBJECT)
        .context("registering sync_failure-error-subject template")?;

    registry
        .register_template_string(
            &error_body,
            format!(
                r#"        <div class="banner" style="background-color: #dc2626;">
            <h1>Sync FAILED</h1>
        </div>
        <div class="content">
            <p class="body-text">
                A sync from <strong>{{{{origin}}}}</strong> to <strong>{{{{target}}}}</strong> reported by module <strong>{{{{module_name}}}}</strong> has failed.
            </p>
            {DETAILS}
            {{{{#if error_message}}}}
            <p class="body-text"><strong>Error Message</strong></p>
            <pre class="error"><code>{{{{error_message}}}}</code></pre>
            {{{{/if}}}}
        </div>"#
            ),
        )
        .context("registering sync_failure-error-body template")?;

    let (stale_subject, stale_body) = template_names(SyncStatus::Stale);
    registry
        .register_template_string(&stale_subject, SUBJECT)
        .context("registering sync_failure-stale-subject template")?;

    registry
        .register_template_string(
            &stale_body,
            format!(
                r#"        <div class="banner" style="background-color: #d97706;">
            <h1>Sync STALE</h1>
        </div>
        <div class="content">
            <p class="body-text">
                No sync activity from <strong>{{{{origin}}}}</strong> to <strong>{{{{target}}}}</strong> has been recorded by module <strong>{{{{module_name}}}}</strong> since {{{{last_synced_at}}}}.
            </p>
            {DETAILS}
        </div>"#
            ),
        )
        .context("registering sync_failure-stale-body template")?;

    Ok(())
}
