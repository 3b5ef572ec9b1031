//! Proximity monitor engine.
//!
//! The monitor is a polling state machine. It does not own a thread --
//! the caller drives `run()` on whatever task the background runner is
//! keeping alive, and exactly one tick is in flight at a time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Polling -> (Alerted | Stopped)
//! ```
//!
//! `Alerted` and `Stopped` are terminal. One `ProximityMonitor` value is
//! one session; a new session is a new value.
//!
//! ## Usage
//!
//! ```ignore
//! let monitor = Arc::new(ProximityMonitor::new(store, source, sink, runner, gate, config));
//! monitor.start()?;
//! let final_state = monitor.run().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::alert::AlertSink;
use crate::destination::DestinationStore;
use crate::error::MonitorError;
use crate::events::Event;
use crate::gate::PermissionGate;
use crate::geo::distance_metres;
use crate::position::PositionSource;
use crate::runner::{BackgroundRunner, RunnerConfig, RunnerLease};

use super::config::MonitorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Polling,
    /// The arrival alert fired.
    Alerted,
    /// Explicitly stopped, or the keep-alive was lost.
    Stopped,
}

impl MonitorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Alerted | Self::Stopped)
    }
}

/// One monitoring session.
///
/// Every collaborator is constructor-injected, so each can be replaced
/// with a fake in tests. The session favors staying alive over
/// crashing: storage and sampling failures skip the tick and polling
/// continues, so the worst case is a session that never alerts.
pub struct ProximityMonitor {
    store: Arc<dyn DestinationStore>,
    source: Arc<dyn PositionSource>,
    sink: Arc<dyn AlertSink>,
    runner: Arc<dyn BackgroundRunner>,
    gate: Arc<dyn PermissionGate>,
    config: MonitorConfig,
    runner_config: RunnerConfig,
    state: Mutex<MonitorState>,
    sample_count: AtomicU64,
    /// Flipped once by `stop()`; checked before sampling and again
    /// before side effects so an in-flight tick is suppressed.
    stop: watch::Sender<bool>,
    lease: Mutex<Option<RunnerLease>>,
    events: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

impl ProximityMonitor {
    pub fn new(
        store: Arc<dyn DestinationStore>,
        source: Arc<dyn PositionSource>,
        sink: Arc<dyn AlertSink>,
        runner: Arc<dyn BackgroundRunner>,
        gate: Arc<dyn PermissionGate>,
        config: MonitorConfig,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            store,
            source,
            sink,
            runner,
            gate,
            config,
            runner_config: RunnerConfig::default(),
            state: Mutex::new(MonitorState::Idle),
            sample_count: AtomicU64::new(0),
            stop,
            lease: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    /// Display fields passed through to the background runner.
    pub fn with_runner_config(mut self, runner_config: RunnerConfig) -> Self {
        self.runner_config = runner_config;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap()
    }

    /// Successful position samples so far this session.
    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state(),
            sample_count: self.sample_count(),
            threshold_m: self.config.threshold_m,
            interval_ms: self.config.interval_ms,
            at: Utc::now(),
        }
    }

    /// Receive an [`Event`] for every state change. Call before `start`.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        rx
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// `Idle -> Polling`. Verifies permissions and configuration, then
    /// registers with the background runner. A session already holding
    /// the runner is stopped first -- at most one is active.
    pub fn start(&self) -> Result<(), MonitorError> {
        if self.state() != MonitorState::Idle {
            return Err(MonitorError::AlreadyStarted);
        }
        if !self.gate.ensure_ready() {
            return Err(MonitorError::PermissionDenied);
        }
        self.config.validate()?;
        let destination = self
            .store
            .get()
            .map_err(|e| {
                warn!("destination read failed at start: {e}");
                MonitorError::MissingDestination
            })?
            .ok_or(MonitorError::MissingDestination)?;

        if self.runner.is_running() {
            warn!("another monitoring session holds the background task; stopping it");
            self.runner.stop();
        }
        let lease = self.runner.start(&self.runner_config)?;
        *self.lease.lock().unwrap() = Some(lease);
        *self.state.lock().unwrap() = MonitorState::Polling;
        info!(
            "monitoring '{}' (threshold {} m, interval {} ms)",
            destination.name, self.config.threshold_m, self.config.interval_ms
        );
        self.emit(Event::MonitorStarted {
            destination: destination.name,
            interval_ms: self.config.interval_ms,
            threshold_m: self.config.threshold_m,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Request a stop from any state; idempotent. Takes effect before
    /// the next side effect even if a tick is in flight.
    pub fn stop(&self) {
        self.stop.send_replace(true);
        if self.transition_stopped() {
            info!("monitor stopped");
        }
        self.runner.stop();
    }

    /// Drive the session until a terminal state and return it. The
    /// caller owns the task this runs on; the background runner keeps
    /// that task alive.
    pub async fn run(&self) -> MonitorState {
        let mut stop_rx = self.stop.subscribe();
        let mut lease = match self.lease.lock().unwrap().take() {
            Some(lease) => lease,
            None => {
                warn!("run() called before start(); nothing to do");
                return self.state();
            }
        };

        loop {
            let stopped = *stop_rx.borrow();
            if stopped || !lease.is_active() {
                self.transition_stopped();
                break;
            }
            if self.state().is_terminal() {
                break;
            }

            self.tick().await;

            if self.state().is_terminal() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.config.interval_ms)) => {}
                _ = stop_rx.changed() => {}
                _ = lease.revoked() => {}
            }
        }
        self.state()
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// One polling tick. Storage and sampling failures skip the tick;
    /// only a sample at or inside the threshold leaves `Polling`.
    async fn tick(&self) {
        if self.stop_requested() {
            return;
        }

        // Re-read the store every tick so an external destination change
        // takes effect without restarting the session. A missing
        // destination skips work for this tick, it does not stop the
        // monitor.
        let destination = match self.store.get() {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                debug!("no destination set; skipping tick");
                return;
            }
            Err(e) => {
                warn!("destination unavailable this tick: {e}");
                return;
            }
        };

        let timeout = Duration::from_millis(self.config.sample_timeout_ms);
        let sample = tokio::select! {
            outcome = tokio::time::timeout(timeout, self.source.sample(self.config.accuracy)) => {
                match outcome {
                    Ok(Ok(sample)) => sample,
                    Ok(Err(e)) => {
                        warn!("position sample failed: {e}");
                        return;
                    }
                    Err(_) => {
                        warn!(
                            "position sample timed out after {} ms",
                            self.config.sample_timeout_ms
                        );
                        return;
                    }
                }
            }
            _ = self.cancelled() => return,
        };

        let count = self.sample_count.fetch_add(1, Ordering::Relaxed) + 1;

        // A stop that arrived while sampling wins before any side effect.
        if self.stop_requested() {
            return;
        }

        let distance_m = distance_metres(sample.coordinate(), destination.coordinate());
        debug!(
            "sample {count}: {distance_m:.1} m from {}",
            destination.name
        );

        if distance_m <= self.config.threshold_m {
            self.sink.on_arrival(distance_m);
            *self.state.lock().unwrap() = MonitorState::Alerted;
            info!(
                "arrived at {}: {distance_m:.1} m <= {} m",
                destination.name, self.config.threshold_m
            );
            self.emit(Event::ArrivalAlerted {
                destination: destination.name,
                distance_m,
                at: Utc::now(),
            });
            self.runner.stop();
        } else {
            self.sink.on_progress(&destination.name, distance_m);
            self.emit(Event::ProgressUpdated {
                destination: destination.name,
                distance_m,
                sample_count: count,
                at: Utc::now(),
            });
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once `stop()` has been requested.
    async fn cancelled(&self) {
        let mut rx = self.stop.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// `-> Stopped` if not already terminal. Returns whether this call
    /// made the transition.
    fn transition_stopped(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_terminal() {
                return false;
            }
            *state = MonitorState::Stopped;
        }
        self.emit(Event::MonitorStopped { at: Utc::now() });
        true
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}
