use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `alert_type` tag written with every alert record for a sync failure.
pub const SYNC_FAILURE_ALERT_TYPE: &str = "sync_failure";

/// Outcome of a single attempt to notify one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl AlertStatus {
    pub fn name(&self) -> &'static str {
        match self {
            AlertStatus::Sent => "sent",
            AlertStatus::Failed => "failed",
        }
    }

    pub fn from_str(name: &str) -> Option<AlertStatus> {
        [AlertStatus::Sent, AlertStatus::Failed]
            .into_iter()
            .find(|status| name.eq_ignore_ascii_case(status.name()))
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Type<sqlx::postgres::Postgres> for AlertStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::postgres::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::postgres::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Encode<'_, sqlx::postgres::Postgres> for AlertStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.name(), buf)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Decode<'_, sqlx::postgres::Postgres> for AlertStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::postgres::Postgres>>::decode(value)?;
        AlertStatus::from_str(s).ok_or_else(|| format!("Invalid alert status: {}", s).into())
    }
}

/// A single recorded attempt to alert one recipient about one sync log entry.
/// Records are append-only, and a `Sent` record within the dedup window
/// suppresses further alerts for the same `log_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub log_id: crate::Id,
    pub recipient_email: String,
    pub status: AlertStatus,
    pub alert_type: String,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn sync_failure(
        log_id: crate::Id,
        recipient_email: impl Into<String>,
        status: AlertStatus,
        created_at: DateTime<Utc>,
    ) -> AlertRecord {
        AlertRecord {
            log_id,
            recipient_email: recipient_email.into(),
            status,
            alert_type: SYNC_FAILURE_ALERT_TYPE.to_string(),
            created_at,
        }
    }
}

/// Someone who receives sync failure alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("invalid alert recipient email address: '{0}'")]
pub struct InvalidRecipient(pub String);

impl std::str::FromStr for AlertRecipient {
    type Err = InvalidRecipient;

    /// Parses a bare email address, as given in comma-separated configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = s.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(AlertRecipient {
                    email: email.to_string(),
                    name: None,
                })
            }
            _ => Err(InvalidRecipient(s.to_string())),
        }
    }
}

/// Parses a comma-separated list of email addresses. Empty segments, such as
/// those left by a trailing comma, are skipped.
pub fn parse_recipient_list(list: &str) -> Result<Vec<AlertRecipient>, InvalidRecipient> {
    list.split(',')
        .filter(|segment| !segment.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Recipients used when none are configured.
pub fn default_recipients() -> Vec<AlertRecipient> {
    vec![
        AlertRecipient {
            email: "engineering@databridge.dev".to_string(),
            name: Some("DataBridge Engineering".to_string()),
        },
        AlertRecipient {
            email: "ops@databridge.dev".to_string(),
            name: Some("DataBridge Operations".to_string()),
        },
    ]
}

/// Aggregate outcome of one alert pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    /// Number of failures selected for alerting.
    pub processed: usize,
    /// Failures for which dispatch completed.
    pub alerted: usize,
    /// Failures which could not be rendered or dispatched.
    pub errors: usize,
}

/// Counts of alert records written since `since`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub since: DateTime<Utc>,
    pub sent: u64,
    pub failed: u64,
    /// Distinct sync log entries with at least one sent alert.
    pub alerted_logs: u64,
}
