//! Persistence layer for targets and probe history.
//!
//! The monitoring core only sees the [`Store`] trait; the libsql
//! implementation lives in [`repository`].

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::Repository;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::monitoring::types::{ProbeResult, Target};
use models::{ProbeRecord, TargetRecord, TargetWithLastProbe};

/// Storage operations consumed by the monitoring core and the external
/// CRUD boundary.
#[async_trait]
pub trait Store: Send + Sync {
    /// All non-deleted targets with their most recent probe time, read
    /// once at bootstrap.
    async fn active_targets_with_last_probe(&self) -> Result<Vec<TargetWithLastProbe>>;

    /// Persist one probe observation.
    async fn record_probe(&self, result: &ProbeResult) -> Result<()>;

    /// Register a new target; the URL must be unique among non-deleted
    /// targets.
    async fn create_target(&self, url: &str, frequency_seconds: u64) -> Result<TargetRecord>;

    /// Fetch one target by id, soft-deleted rows included.
    async fn target_by_id(&self, id: Uuid) -> Result<Option<TargetRecord>>;

    /// All non-deleted targets.
    async fn list_targets(&self) -> Result<Vec<TargetRecord>>;

    /// Change url or frequency of an existing non-deleted target.
    async fn update_target(&self, target: &Target) -> Result<()>;

    /// Soft-delete a target; its probe history is kept.
    async fn remove_target(&self, id: Uuid) -> Result<()>;

    /// Most recent probes for a URL, newest first.
    async fn recent_probes(&self, url: &str, limit: usize) -> Result<Vec<ProbeRecord>>;
}

/// Initialize the schema.
pub async fn initialize_store(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
