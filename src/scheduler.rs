// Single-flight periodic scheduler.
// Fires a collection run every collect interval; a tick that arrives while a run is
// still active is dropped (no queuing, no catch-up).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, debug, error, info, warn};

use crate::collector::{Collector, RunError};

/// Whether a collection run is in progress. Only [`RunState::try_begin`] sets it and only
/// the returned [`RunGuard`] clears it.
#[derive(Debug, Default)]
pub struct RunState {
    active: AtomicBool,
    last_started: Mutex<Option<DateTime<Local>>>,
    skipped_ticks: AtomicU64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a run active. Returns `None` if one already is.
    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        if let Ok(mut t) = self.last_started.lock() {
            *t = Some(Local::now());
        }
        Some(RunGuard {
            state: Arc::clone(self),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start time of the current or most recent run.
    pub fn last_started(&self) -> Option<DateTime<Local>> {
        self.last_started.lock().ok().and_then(|t| *t)
    }

    /// Ticks dropped because a run was still active.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    fn record_skip(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Clears [`RunState`] when dropped, whatever way the run ended.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<RunState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.active.store(false, Ordering::Release);
    }
}

/// Spawns the scheduler loop. The first run starts immediately.
/// On shutdown the loop stops ticking and waits for an in-flight run to finish.
pub fn spawn(
    collector: Arc<Collector>,
    state: Arc<RunState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let collect_interval = collector.collect_interval();
    tokio::spawn(async move {
        let mut tick = interval(collect_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(guard) = state.try_begin() else {
                        state.record_skip();
                        warn!(
                            last_execution = ?state.last_started().map(|t| t.to_rfc3339()),
                            skipped_ticks = state.skipped_ticks(),
                            "collection still running; skipping this tick"
                        );
                        continue;
                    };
                    current = Some(spawn_run(collector.clone(), guard));
                }
                _ = &mut shutdown_rx => {
                    debug!("Scheduler shutting down");
                    break;
                }
            }
        }

        if let Some(handle) = current.take()
            && !handle.is_finished()
        {
            info!("waiting for in-flight collection run");
            let _ = handle.await;
        }
    })
}

fn spawn_run(collector: Arc<Collector>, guard: RunGuard) -> JoinHandle<()> {
    let span = tracing::info_span!("collection_run");
    tokio::spawn(
        async move {
            let _guard = guard;
            match collector.run_once().await {
                Ok(summary) => debug!(
                    series = summary.series_discovered,
                    metrics = summary.metrics_published,
                    points = summary.points_published,
                    "run summary"
                ),
                Err(RunError::NoSeries) => {
                    warn!("source reported no series names; nothing published")
                }
                Err(e) => error!(error = %e, "collection run failed"),
            }
        }
        .instrument(span),
    )
}

