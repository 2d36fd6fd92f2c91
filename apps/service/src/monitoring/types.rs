use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status code recorded when a probe could not reach the target at all
/// (timeout, connection refused, DNS failure).
pub const STATUS_UNREACHABLE: u16 = 600;

/// A registered URL with its desired check interval.
///
/// Scheduling identity is the URL: two targets never share a URL while
/// both are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub url: String,
    /// Seconds between probes; 0 falls back to a fixed daily period.
    pub frequency_seconds: u64,
}

/// One probe observation, write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target_id: Uuid,
    pub observed_at: DateTime<Utc>,
    /// Real HTTP status, or [`STATUS_UNREACHABLE`].
    pub status_code: u16,
}

/// Lifecycle of one monitor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    /// Waiting out a one-shot delay before the first probe.
    Recovering,
    /// Probing every period.
    Ticking,
    /// Terminal; no further probes.
    Stopped,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorState::Recovering => write!(f, "recovering"),
            MonitorState::Ticking => write!(f, "ticking"),
            MonitorState::Stopped => write!(f, "stopped"),
        }
    }
}
