//! Rendering of sync failure alert emails.
//!
//! Templates are registered with a handlebars registry once, when the
//! `Renderer` is created. Each email body is rendered from a fixed set of
//! arguments derived from the `SyncLogEntry`, and then wrapped in a common
//! layout. Rendering never reads the clock, so rendering the same entry twice
//! produces identical output.
use anyhow::Context;
use models::{SyncLogEntry, SyncStatus};

mod sync_failure;

const LAYOUT_TEMPLATE: &str = "layout";

/// A rendered alert, ready to be sent to any number of recipients.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NotificationEmail {
    /// The sync log entry that this email alerts on.
    pub log_id: models::Id,
    pub subject: String,
    /// Complete HTML document.
    pub body: String,
}

#[derive(Debug)]
pub struct Renderer {
    registry: handlebars::Handlebars<'static>,
}

impl Renderer {
    pub fn try_new() -> anyhow::Result<Renderer> {
        let mut registry = handlebars::Handlebars::new();
        registry
            .register_template_string(LAYOUT_TEMPLATE, LAYOUT)
            .context("registering layout template")?;
        sync_failure::register_templates(&mut registry)?;
        Ok(Renderer { registry })
    }

    pub fn render(&self, entry: &SyncLogEntry) -> anyhow::Result<NotificationEmail> {
        let (subject_name, body_name) = template_names(entry.status);
        let args = sync_failure::SyncFailureArgs::new(entry);

        let subject = self
            .registry
            .render(&subject_name, &args)
            .with_context(|| format!("rendering template '{subject_name}'"))?;
        let body = self
            .registry
            .render(&body_name, &args)
            .with_context(|| format!("rendering template '{body_name}'"))?;
        let document = self
            .registry
            .render(
                LAYOUT_TEMPLATE,
                &serde_json::json!({
                    "title": &subject,
                    "body": body,
                }),
            )
            .context("rendering email layout")?;

        tracing::debug!(log_id = %entry.id, %subject, "rendered sync failure email");

        Ok(NotificationEmail {
            log_id: entry.id,
            subject,
            body: document,
        })
    }
}

/// Returns the subject and body template names used for entries of the given status.
/// Only `error` entries have their own templates; every other status renders as stale.
fn template_names(status: SyncStatus) -> (String, String) {
    let kind = match status {
        SyncStatus::Error => SyncStatus::Error,
        SyncStatus::Stale | SyncStatus::Success => SyncStatus::Stale,
    };
    (
        format!("sync_failure-{kind}-subject"),
        format!("sync_failure-{kind}-body"),
    )
}

/// Formats a timestamp for display in an email.
pub fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%B %-d, %Y at %H:%M:%S UTC").to_string()
}

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{{title}}</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background-color: #f3f4f6; margin: 0; padding: 24px; }
        .container { max-width: 640px; margin: 0 auto; background-color: #ffffff; border-radius: 6px; overflow: hidden; }
        .banner { color: #ffffff; padding: 16px 24px; }
        .banner h1 { margin: 0; font-size: 20px; }
        .content { padding: 24px; }
        .body-text { color: #111827; font-size: 14px; line-height: 1.5; }
        .details { border-collapse: collapse; width: 100%; font-size: 14px; }
        .details th { text-align: left; color: #6b7280; padding: 6px 12px 6px 0; width: 40%; }
        .details td { color: #111827; padding: 6px 0; }
        .error { background-color: #fef2f2; border: 1px solid #fecaca; padding: 12px; white-space: pre-wrap; word-break: break-word; font-size: 13px; }
        .footer { color: #9ca3af; font-size: 12px; padding: 0 24px 24px; }
    </style>
</head>
<body>
    <div class="container">
{{{body}}}
        <p class="footer">This alert was generated by the DataBridge sync monitor.</p>
    </div>
</body>
</html>
"#;
