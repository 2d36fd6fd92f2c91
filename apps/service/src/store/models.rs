use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::Target;

/// Target row as stored, including soft-delete and bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: Uuid,
    pub url: String,
    pub frequency_seconds: u64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bootstrap row: an active target with its most recent probe time.
#[derive(Debug, Clone)]
pub struct TargetWithLastProbe {
    pub target: Target,
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Stored probe observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub id: i64,
    pub target_id: Uuid,
    pub observed_at: DateTime<Utc>,
    pub status_code: u16,
}

/// Instants are stored as unix milliseconds.
pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
