use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a synchronization between two modules, as reported by the
/// external sync subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Stale,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl SyncStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Stale => "stale",
            SyncStatus::Error => "error",
        }
    }

    fn all() -> &'static [SyncStatus] {
        &[SyncStatus::Success, SyncStatus::Stale, SyncStatus::Error]
    }

    pub fn from_str(name: &str) -> Option<SyncStatus> {
        SyncStatus::all()
            .iter()
            .find(|status| name.eq_ignore_ascii_case(status.name()))
            .copied()
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Type<sqlx::postgres::Postgres> for SyncStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::postgres::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::postgres::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Encode<'_, sqlx::postgres::Postgres> for SyncStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.name(), buf)
    }
}

#[cfg(feature = "sqlx-support")]
impl sqlx::Decode<'_, sqlx::postgres::Postgres> for SyncStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::postgres::Postgres>>::decode(value)?;
        SyncStatus::from_str(s).ok_or_else(|| format!("Invalid sync status: {}", s).into())
    }
}

/// One recorded synchronization attempt. Entries are written by the sync
/// subsystem and are only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: crate::Id,
    /// Name of the module which reported the sync.
    pub module_name: String,
    pub status: SyncStatus,
    pub last_synced_at: DateTime<Utc>,
    /// Diagnostic message, generally only present when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_duration_ms: Option<u64>,
    #[serde(default)]
    pub records_processed: u64,
    pub created_at: DateTime<Utc>,
}
