//! Integration tests for the scheduling engine: registry lifecycle,
//! bootstrap recovery, and shutdown, against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use super::prober::Prober;
use super::registry::Registry;
use super::types::{MonitorState, ProbeResult, STATUS_UNREACHABLE, Target};
use crate::store::Store;
use crate::store::models::{ProbeRecord, TargetRecord, TargetWithLastProbe};

/// In-memory store double: serves a fixed bootstrap set and records
/// probe results.
#[derive(Default)]
struct MemoryStore {
    bootstrap_rows: Mutex<Vec<TargetWithLastProbe>>,
    recorded: Mutex<Vec<ProbeResult>>,
    fail_bootstrap: bool,
}

impl MemoryStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_rows(rows: Vec<TargetWithLastProbe>) -> Arc<Self> {
        Arc::new(Self { bootstrap_rows: Mutex::new(rows), ..Default::default() })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { fail_bootstrap: true, ..Default::default() })
    }

    async fn recorded_count(&self) -> usize {
        self.recorded.lock().await.len()
    }

    async fn recorded_for(&self, target_id: Uuid) -> Vec<ProbeResult> {
        self.recorded.lock().await.iter().filter(|r| r.target_id == target_id).cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn active_targets_with_last_probe(&self) -> Result<Vec<TargetWithLastProbe>> {
        if self.fail_bootstrap {
            bail!("store unavailable");
        }
        Ok(self.bootstrap_rows.lock().await.clone())
    }

    async fn record_probe(&self, result: &ProbeResult) -> Result<()> {
        self.recorded.lock().await.push(result.clone());
        Ok(())
    }

    // The CRUD surface is not exercised by the scheduling engine.
    async fn create_target(&self, _url: &str, _frequency_seconds: u64) -> Result<TargetRecord> {
        bail!("unused in scheduling tests")
    }

    async fn target_by_id(&self, _id: Uuid) -> Result<Option<TargetRecord>> {
        bail!("unused in scheduling tests")
    }

    async fn list_targets(&self) -> Result<Vec<TargetRecord>> {
        bail!("unused in scheduling tests")
    }

    async fn update_target(&self, _target: &Target) -> Result<()> {
        bail!("unused in scheduling tests")
    }

    async fn remove_target(&self, _id: Uuid) -> Result<()> {
        bail!("unused in scheduling tests")
    }

    async fn recent_probes(&self, _url: &str, _limit: usize) -> Result<Vec<ProbeRecord>> {
        bail!("unused in scheduling tests")
    }
}

fn target(url: &str, frequency_seconds: u64) -> Target {
    Target { id: Uuid::new_v4(), url: url.to_string(), frequency_seconds }
}

fn make_registry(store: Arc<MemoryStore>) -> Registry {
    Registry::new(Arc::new(Prober::new(Duration::from_secs(2)).unwrap()), store)
}

/// URL on a local port that refuses connections immediately, so probes
/// complete fast with the unreachable sentinel.
async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// Poll until at least `count` probes were recorded for `target_id`.
async fn wait_for_probes(store: &MemoryStore, target_id: Uuid, count: usize, deadline: Duration) {
    timeout(deadline, async {
        loop {
            if store.recorded_for(target_id).await.len() >= count {
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("probes not recorded within deadline");
}

#[tokio::test]
async fn upsert_starts_a_ticking_monitor() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());
    let url = refused_url().await;

    registry.upsert(target(&url, 3600)).await;

    assert_eq!(registry.count().await, 1);
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Ticking));
}

#[tokio::test]
async fn upsert_replaces_the_monitor_and_the_stale_timer_never_fires() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());
    let url = refused_url().await;

    registry.upsert(target(&url, 1)).await;
    registry.upsert(target(&url, 3600)).await;

    assert_eq!(registry.count().await, 1);

    // The replaced monitor would have fired at +1s and +2s.
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(store.recorded_count().await, 0);
}

#[tokio::test]
async fn upsert_applies_the_new_frequency() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());
    let url = refused_url().await;

    registry.upsert(target(&url, 3600)).await;
    let swapped = target(&url, 1);
    registry.upsert(swapped.clone()).await;

    wait_for_probes(&store, swapped.id, 2, Duration::from_secs(6)).await;
}

#[tokio::test]
async fn remove_is_a_noop_for_unknown_urls() {
    let registry = make_registry(MemoryStore::new());

    registry.remove("http://nowhere.invalid/").await;
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn remove_stops_the_monitor() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());
    let url = refused_url().await;

    registry.upsert(target(&url, 1)).await;
    registry.remove(&url).await;
    assert_eq!(registry.count().await, 0);

    let count = store.recorded_count().await;
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(store.recorded_count().await, count);
}

#[tokio::test]
async fn bootstrap_probes_immediately_without_history() {
    let url = refused_url().await;
    let t = target(&url, 60);
    let store =
        MemoryStore::with_rows(vec![TargetWithLastProbe { target: t.clone(), last_observed_at: None }]);
    let registry = make_registry(store.clone());

    registry.bootstrap().await.unwrap();

    wait_for_probes(&store, t.id, 1, Duration::from_secs(3)).await;
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Ticking));

    let recorded = store.recorded_for(t.id).await;
    assert_eq!(recorded[0].status_code, STATUS_UNREACHABLE);
}

#[tokio::test]
async fn bootstrap_probes_immediately_when_overdue() {
    let url = refused_url().await;
    let t = target(&url, 60);
    let store = MemoryStore::with_rows(vec![TargetWithLastProbe {
        target: t.clone(),
        last_observed_at: Some(Utc::now() - ChronoDuration::seconds(90)),
    }]);
    let registry = make_registry(store.clone());

    registry.bootstrap().await.unwrap();

    wait_for_probes(&store, t.id, 1, Duration::from_secs(3)).await;
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Ticking));
}

#[tokio::test]
async fn bootstrap_delays_the_first_probe_within_a_period() {
    let url = refused_url().await;
    let t = target(&url, 60);
    let store = MemoryStore::with_rows(vec![TargetWithLastProbe {
        target: t.clone(),
        last_observed_at: Some(Utc::now() - ChronoDuration::seconds(10)),
    }]);
    let registry = make_registry(store.clone());

    registry.bootstrap().await.unwrap();

    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Recovering));
    sleep(Duration::from_millis(1000)).await;
    // still ~49s of recovery delay left
    assert_eq!(store.recorded_count().await, 0);
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Recovering));
}

#[tokio::test]
async fn recovery_transitions_to_ticking_and_probes() {
    let url = refused_url().await;
    let t = target(&url, 2);
    let store = MemoryStore::with_rows(vec![TargetWithLastProbe {
        target: t.clone(),
        last_observed_at: Some(Utc::now() - ChronoDuration::seconds(1)),
    }]);
    let registry = make_registry(store.clone());

    registry.bootstrap().await.unwrap();
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Recovering));

    // recovery delay is ~1s, then the catch-up probe fires
    wait_for_probes(&store, t.id, 1, Duration::from_secs(5)).await;
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Ticking));
}

#[tokio::test]
async fn bootstrap_failure_is_fatal() {
    let registry = make_registry(MemoryStore::failing());

    assert!(registry.bootstrap().await.is_err());
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn zero_frequency_falls_back_to_the_daily_period() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());
    let url = refused_url().await;

    registry.upsert(target(&url, 0)).await;
    assert_eq!(registry.state_of(&url).await, Some(MonitorState::Ticking));

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(store.recorded_count().await, 0);
}

#[tokio::test]
async fn shutdown_stops_every_monitor_and_no_result_follows() {
    let store = MemoryStore::new();
    let registry = make_registry(store.clone());

    for _ in 0..3 {
        registry.upsert(target(&refused_url().await, 1)).await;
    }
    assert_eq!(registry.count().await, 3);

    // let at least one round of ticks land
    sleep(Duration::from_millis(1300)).await;

    registry.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(registry.count().await, 0);

    let count = store.recorded_count().await;
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.recorded_count().await, count);
}
