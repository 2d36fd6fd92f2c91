#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::monitor::{self, FirstFire, MonitorHandle, period_for};
use super::prober::Prober;
use super::types::{MonitorState, Target};
use crate::store::Store;

/// Graceful shutdown failure.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The grace period elapsed with monitors still running; they have
    /// been aborted and the host decides whether to force-exit.
    #[error("shutdown grace period elapsed with {remaining} of {total} monitors still running")]
    GraceExpired { remaining: usize, total: usize },
}

/// Authoritative mapping from URL to its live monitor.
///
/// All map access is serialized behind one async mutex, so concurrent
/// upsert/remove calls for the same URL can never leave two live
/// monitors or a dangling entry.
pub struct Registry {
    monitors: Mutex<HashMap<String, MonitorHandle>>,
    prober: Arc<Prober>,
    store: Arc<dyn Store>,
}

impl Registry {
    pub fn new(prober: Arc<Prober>, store: Arc<dyn Store>) -> Self {
        Self { monitors: Mutex::new(HashMap::new()), prober, store }
    }

    /// Start monitoring `target`, replacing any live monitor for the
    /// same URL.
    ///
    /// Replacement stops the outgoing task and waits for it to exit
    /// before the new one starts; the stale timer can never fire again
    /// and no observation point sees two monitors for one URL.
    pub async fn upsert(&self, target: Target) {
        let mut monitors = self.monitors.lock().await;

        if let Some(existing) = monitors.remove(&target.url) {
            info!(url = %target.url, "replacing monitor");
            existing.stop().await;
        } else {
            info!(url = %target.url, frequency = target.frequency_seconds, "starting monitor");
        }

        let handle =
            monitor::spawn(target, FirstFire::AfterPeriod, self.prober.clone(), self.store.clone());
        monitors.insert(handle.target().url.clone(), handle);
    }

    /// Stop and forget the monitor for `url`; unknown URLs are a no-op.
    pub async fn remove(&self, url: &str) {
        let mut monitors = self.monitors.lock().await;

        match monitors.remove(url) {
            Some(handle) => {
                handle.stop().await;
                info!(%url, "monitor removed");
            }
            None => debug!(%url, "remove for unknown url ignored"),
        }
    }

    /// Reconstruct the monitor set from persisted state.
    ///
    /// Targets with no recorded probe, or whose last probe is at least
    /// one period old, fire an immediate catch-up probe; the rest start
    /// in Recovering with a one-shot delay covering the remainder of
    /// their period. A store failure aborts startup.
    pub async fn bootstrap(&self) -> Result<()> {
        let rows = self
            .store
            .active_targets_with_last_probe()
            .await
            .context("querying active targets for bootstrap")?;

        let mut monitors = self.monitors.lock().await;
        let count = rows.len();

        for row in rows {
            let period = period_for(&row.target);
            let first_fire = match row.last_observed_at {
                None => FirstFire::Immediate,
                Some(last) => {
                    // Clock skew can put the last observation in the
                    // future; clamping keeps the delay within one period.
                    let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
                    if elapsed >= period {
                        FirstFire::Immediate
                    } else {
                        FirstFire::Delayed(period - elapsed)
                    }
                }
            };

            if let Some(stale) = monitors.remove(&row.target.url) {
                stale.stop().await;
            }
            let handle =
                monitor::spawn(row.target, first_fire, self.prober.clone(), self.store.clone());
            monitors.insert(handle.target().url.clone(), handle);
        }

        info!(count, "monitor registry bootstrapped");
        Ok(())
    }

    /// Stop every monitor and wait for all tasks to exit, bounded by
    /// `grace`.
    ///
    /// On expiry the stragglers are aborted and a [`ShutdownError`] is
    /// returned; no new probe starts once this has been called.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), ShutdownError> {
        let handles: Vec<MonitorHandle> = {
            let mut monitors = self.monitors.lock().await;
            monitors.drain().map(|(_, handle)| handle).collect()
        };
        let total = handles.len();
        info!(total, "stopping all monitors");

        let mut aborts = Vec::with_capacity(total);
        let mut joins = Vec::with_capacity(total);
        for handle in handles {
            aborts.push(handle.abort_handle());
            joins.push(handle.begin_stop());
        }

        if timeout(grace, join_all(joins)).await.is_err() {
            let remaining = aborts.iter().filter(|abort| !abort.is_finished()).count();
            for abort in &aborts {
                abort.abort();
            }
            warn!(remaining, total, "shutdown grace period elapsed, aborting monitors");
            return Err(ShutdownError::GraceExpired { remaining, total });
        }

        info!(total, "all monitors stopped");
        Ok(())
    }

    /// Lifecycle state of the monitor for `url`, if one is registered.
    pub async fn state_of(&self, url: &str) -> Option<MonitorState> {
        self.monitors.lock().await.get(url).map(MonitorHandle::state)
    }

    /// Number of registered monitors.
    pub async fn count(&self) -> usize {
        self.monitors.lock().await.len()
    }
}
