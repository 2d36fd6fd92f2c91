#![allow(dead_code)]
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use libsql::params;
use uuid::Uuid;

use super::Store;
use super::models::{self, ProbeRecord, TargetRecord, TargetWithLastProbe};
use crate::monitoring::types::{ProbeResult, Target};
use crate::monitoring::validation::validate_target_url;
use crate::pool::LibsqlPool;

/// LibSQL-backed [`Store`].
pub struct Repository {
    pool: LibsqlPool,
}

impl Repository {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn target_record_from_row(row: &libsql::Row) -> Result<TargetRecord> {
    let id: String = row.get(0)?;

    Ok(TargetRecord {
        id: Uuid::parse_str(&id)?,
        url: row.get(1)?,
        frequency_seconds: row.get::<i64>(2)? as u64,
        deleted: row.get::<i64>(3)? != 0,
        created_at: models::from_millis(row.get(4)?),
        updated_at: models::from_millis(row.get(5)?),
    })
}

#[async_trait]
impl Store for Repository {
    async fn active_targets_with_last_probe(&self) -> Result<Vec<TargetWithLastProbe>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.url, t.frequency_seconds, p.last_observed_at
                 FROM targets t
                 LEFT JOIN (SELECT target_id, MAX(observed_at) AS last_observed_at
                            FROM probe_results GROUP BY target_id) p
                   ON p.target_id = t.id
                 WHERE t.deleted = 0
                 ORDER BY t.created_at",
            )
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut targets = Vec::new();

        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            targets.push(TargetWithLastProbe {
                target: Target {
                    id: Uuid::parse_str(&id)?,
                    url: row.get(1)?,
                    frequency_seconds: row.get::<i64>(2)? as u64,
                },
                last_observed_at: row.get::<Option<i64>>(3)?.map(models::from_millis),
            });
        }

        Ok(targets)
    }

    async fn record_probe(&self, result: &ProbeResult) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO probe_results (target_id, observed_at, status_code)
             VALUES (?, ?, ?)",
            params![
                result.target_id.to_string(),
                models::to_millis(result.observed_at),
                result.status_code as i64
            ],
        )
        .await
        .context("inserting probe result")?;

        Ok(())
    }

    async fn create_target(&self, url: &str, frequency_seconds: u64) -> Result<TargetRecord> {
        validate_target_url(url)?;

        let conn = self.get_conn().await?;
        let now = Utc::now();
        let record = TargetRecord {
            id: Uuid::new_v4(),
            url: url.to_string(),
            frequency_seconds,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO targets (id, url, frequency_seconds, deleted, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
            params![
                record.id.to_string(),
                record.url.clone(),
                frequency_seconds as i64,
                models::to_millis(now),
                models::to_millis(now)
            ],
        )
        .await
        .context("inserting target")?;

        Ok(record)
    }

    async fn target_by_id(&self, id: Uuid) -> Result<Option<TargetRecord>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, url, frequency_seconds, deleted, created_at, updated_at
                 FROM targets WHERE id = ?",
            )
            .await?;

        let mut rows = stmt.query(params![id.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(target_record_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn list_targets(&self) -> Result<Vec<TargetRecord>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, url, frequency_seconds, deleted, created_at, updated_at
                 FROM targets WHERE deleted = 0 ORDER BY created_at",
            )
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut targets = Vec::new();

        while let Some(row) = rows.next().await? {
            targets.push(target_record_from_row(&row)?);
        }

        Ok(targets)
    }

    async fn update_target(&self, target: &Target) -> Result<()> {
        validate_target_url(&target.url)?;

        let conn = self.get_conn().await?;
        let affected = conn
            .execute(
                "UPDATE targets SET url = ?, frequency_seconds = ?, updated_at = ?
                 WHERE id = ? AND deleted = 0",
                params![
                    target.url.clone(),
                    target.frequency_seconds as i64,
                    models::to_millis(Utc::now()),
                    target.id.to_string()
                ],
            )
            .await?;

        if affected == 0 {
            bail!("target {} not found", target.id);
        }
        Ok(())
    }

    async fn remove_target(&self, id: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute(
                "UPDATE targets SET deleted = 1, updated_at = ?
                 WHERE id = ? AND deleted = 0",
                params![models::to_millis(Utc::now()), id.to_string()],
            )
            .await?;

        if affected == 0 {
            bail!("target {id} not found");
        }
        Ok(())
    }

    async fn recent_probes(&self, url: &str, limit: usize) -> Result<Vec<ProbeRecord>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.target_id, p.observed_at, p.status_code
                 FROM probe_results p
                 JOIN targets t ON t.id = p.target_id
                 WHERE t.url = ?
                 ORDER BY p.observed_at DESC
                 LIMIT ?",
            )
            .await?;

        let mut rows = stmt.query(params![url, limit as i64]).await?;
        let mut probes = Vec::new();

        while let Some(row) = rows.next().await? {
            let target_id: String = row.get(1)?;
            probes.push(ProbeRecord {
                id: row.get(0)?,
                target_id: Uuid::parse_str(&target_id)?,
                observed_at: models::from_millis(row.get(2)?),
                status_code: row.get::<i64>(3)? as u16,
            });
        }

        Ok(probes)
    }
}
