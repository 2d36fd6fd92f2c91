use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::prober::Prober;
use super::types::{MonitorState, ProbeResult, Target};
use crate::store::Store;

/// Period applied when a target asks for frequency 0, which would
/// otherwise produce an invalid timer.
pub const FALLBACK_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// When a freshly spawned monitor fires its first probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstFire {
    /// One full period from now (fresh registration).
    AfterPeriod,
    /// Right away, then every period (bootstrap catch-up).
    Immediate,
    /// After a one-shot recovery delay, then every period.
    Delayed(Duration),
}

/// Effective probe period for a target.
pub fn period_for(target: &Target) -> Duration {
    if target.frequency_seconds == 0 {
        FALLBACK_PERIOD
    } else {
        Duration::from_secs(target.frequency_seconds)
    }
}

/// Handle to one spawned monitor task, owned exclusively by its
/// registry entry.
pub struct MonitorHandle {
    target: Target,
    stop_tx: oneshot::Sender<()>,
    state_rx: watch::Receiver<MonitorState>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Lifecycle state as last published by the task.
    pub fn state(&self) -> MonitorState {
        *self.state_rx.borrow()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.join.abort_handle()
    }

    /// Signal the task to stop and return its join handle without
    /// waiting. The task exits after at most one in-flight probe cycle.
    pub fn begin_stop(self) -> JoinHandle<()> {
        // The task may already have exited on its own.
        let _ = self.stop_tx.send(());
        self.join
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(self) {
        let join = self.begin_stop();
        if let Err(error) = join.await {
            if error.is_panic() {
                warn!(%error, "monitor task panicked during stop");
            }
        }
    }
}

/// Spawn the monitor task for `target`.
pub fn spawn(
    target: Target,
    first_fire: FirstFire,
    prober: Arc<Prober>,
    store: Arc<dyn Store>,
) -> MonitorHandle {
    let initial = match first_fire {
        FirstFire::Delayed(_) => MonitorState::Recovering,
        FirstFire::AfterPeriod | FirstFire::Immediate => MonitorState::Ticking,
    };
    let (state_tx, state_rx) = watch::channel(initial);
    let (stop_tx, stop_rx) = oneshot::channel();

    let task = MonitorTask { target: target.clone(), prober, store, state_tx };
    let join = tokio::spawn(task.run(first_fire, stop_rx));

    MonitorHandle { target, stop_tx, state_rx, join }
}

struct MonitorTask {
    target: Target,
    prober: Arc<Prober>,
    store: Arc<dyn Store>,
    state_tx: watch::Sender<MonitorState>,
}

impl MonitorTask {
    async fn run(self, first_fire: FirstFire, mut stop_rx: oneshot::Receiver<()>) {
        let period = period_for(&self.target);

        if let FirstFire::Delayed(delay) = first_fire {
            debug!(url = %self.target.url, ?delay, "monitor recovering");
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    self.enter(MonitorState::Stopped);
                    return;
                }
                _ = time::sleep(delay) => {}
            }
            self.enter(MonitorState::Ticking);
        }

        // Bootstrap paths fire a catch-up probe before regular ticking;
        // a fresh registration waits out its first full period.
        if matches!(first_fire, FirstFire::Immediate | FirstFire::Delayed(_)) {
            self.probe_and_record().await;
        }

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = ticker.tick() => self.probe_and_record().await,
            }
        }

        self.enter(MonitorState::Stopped);
    }

    fn enter(&self, state: MonitorState) {
        let _ = self.state_tx.send(state);
    }

    /// One probe-and-record cycle, synchronous with the monitor's own
    /// timer: exactly one result, persisted best-effort.
    async fn probe_and_record(&self) {
        let (status_code, observed_at) = self.prober.probe(&self.target.url).await;
        let result = ProbeResult { target_id: self.target.id, observed_at, status_code };

        if let Err(error) = self.store.record_probe(&result).await {
            warn!(url = %self.target.url, %error, "failed to record probe result");
        }
    }
}
