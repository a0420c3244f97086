use crate::store::AlertLogStore;
use anyhow::Context;
use chrono::Utc;
use models::{AlertRecipient, AlertRecord, AlertStatus};
use notifications::NotificationEmail;

pub trait EmailSender: std::fmt::Debug + Send + Sync + 'static {
    fn send<'s>(
        &'s self,
        recipient: &'s AlertRecipient,
        email: &'s NotificationEmail,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 's;
}

/// Sends emails using resend.
#[derive(Debug)]
pub struct ResendSender {
    from_address: String,
    reply_to_address: String,
    resend_client: resend_rs::Resend,
}

impl ResendSender {
    async fn send(
        &self,
        recipient: &AlertRecipient,
        email: &NotificationEmail,
    ) -> anyhow::Result<()> {
        let Self {
            from_address,
            reply_to_address,
            resend_client,
        } = self;

        let to = match &recipient.name {
            Some(name) => format!("{name} <{}>", recipient.email),
            None => recipient.email.clone(),
        };
        let resend_req = resend_rs::types::CreateEmailBaseOptions::new(
            from_address.as_str(),
            [to.as_str()],
            email.subject.as_str(),
        )
        .with_reply(reply_to_address.as_str())
        .with_html(email.body.as_str());

        let response = resend_client
            .emails
            .send(resend_req)
            .await
            .context("calling resend API")?;

        tracing::debug!(log_id = %email.log_id, to = %recipient.email, email_id = ?response.id, "successfully sent alert email");

        Ok(())
    }
}

#[derive(Debug)]
pub enum Sender {
    Disabled,
    Resend(ResendSender),
}

impl Sender {
    pub fn resend(
        api_key: &str,
        from_address: String,
        reply_to_address: String,
        http_client: reqwest::Client,
    ) -> Sender {
        let resend_client = resend_rs::Resend::with_client(api_key, http_client);
        Sender::Resend(ResendSender {
            from_address,
            reply_to_address,
            resend_client,
        })
    }
}

impl EmailSender for Sender {
    async fn send<'s>(
        &'s self,
        recipient: &'s AlertRecipient,
        email: &'s NotificationEmail,
    ) -> anyhow::Result<()> {
        match self {
            Sender::Disabled => {
                tracing::warn!(
                    to = %recipient.email,
                    subject = %email.subject,
                    log_id = %email.log_id,
                    "skipping sending alert email (disabled)"
                );
                Ok(())
            }
            Sender::Resend(resend) => resend.send(recipient, email).await,
        }
    }
}

/// Outcome of delivering one alert email to all of its recipients.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Attempts whose alert record could not be written.
    pub unrecorded: usize,
}

/// Delivers rendered alerts to recipients and records each attempt.
#[derive(Debug)]
pub struct Dispatcher<ES> {
    sender: ES,
    send_timeout: std::time::Duration,
}

impl<ES: EmailSender> Dispatcher<ES> {
    pub fn new(sender: ES, send_timeout: std::time::Duration) -> Dispatcher<ES> {
        Dispatcher {
            sender,
            send_timeout,
        }
    }

    /// Sends `email` to each recipient in turn, and appends one alert record
    /// per recipient with the outcome of its send. A failed send to one
    /// recipient does not prevent sending to the others. Failures to write an
    /// alert record are logged and counted, but are otherwise ignored.
    ///
    /// Returns an error only if `recipients` is empty.
    #[tracing::instrument(skip_all, fields(log_id = %email.log_id, recipients = recipients.len()))]
    pub async fn dispatch<DB: AlertLogStore>(
        &self,
        store: &DB,
        email: &NotificationEmail,
        recipients: &[AlertRecipient],
    ) -> anyhow::Result<DispatchReport> {
        if recipients.is_empty() {
            anyhow::bail!("cannot dispatch alert for sync log {}: no recipients", email.log_id);
        }

        let mut report = DispatchReport::default();
        for recipient in recipients {
            let status = match self.send_one(recipient, email).await {
                Ok(()) => {
                    report.sent += 1;
                    AlertStatus::Sent
                }
                Err(error) => {
                    tracing::warn!(to = %recipient.email, ?error, "sending alert email failed");
                    report.failed += 1;
                    AlertStatus::Failed
                }
            };

            let record =
                AlertRecord::sync_failure(email.log_id, recipient.email.as_str(), status, Utc::now());
            let written: Result<(), crate::store::WriteError> = store.insert_alert(record).await;
            if let Err(error) = written {
                // Alert records are bookkeeping: a missing `sent` record only
                // means this log may be alerted again on the next pass.
                tracing::error!(?error, "recording alert outcome failed");
                report.unrecorded += 1;
            }
        }

        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            unrecorded = report.unrecorded,
            "dispatched sync failure alert"
        );
        Ok(report)
    }

    async fn send_one(
        &self,
        recipient: &AlertRecipient,
        email: &NotificationEmail,
    ) -> anyhow::Result<()> {
        match tokio::time::timeout(self.send_timeout, self.sender.send(recipient, email)).await {
            Ok(result) => result,
            Err(_elapsed) => anyhow::bail!(
                "timed out after {} sending alert email",
                humantime::format_duration(self.send_timeout)
            ),
        }
    }
}
