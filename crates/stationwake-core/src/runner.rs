//! Background keep-alive facility.
//!
//! The monitor can only outlive the foreground app because some platform
//! facility holds the process alive. [`BackgroundRunner`] is that seam;
//! [`TaskRunner`] is the in-process implementation used when the loop
//! runs inside a plain tokio task (CLI sessions, tests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::error::RunnerError;

/// Display fields for the background task notification. None of these
/// affect monitor behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Icon resource reference, e.g. "ic_launcher".
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Notification accent color as a hex string.
    #[serde(default = "default_color")]
    pub color: String,
    /// Deep link opened when the notification is tapped.
    #[serde(default)]
    pub linking_uri: Option<Url>,
}

fn default_task_name() -> String {
    "stationwake".into()
}
fn default_title() -> String {
    "Stationwake".into()
}
fn default_icon() -> String {
    "ic_launcher".into()
}
fn default_color() -> String {
    "#3b82f6".into()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            task_name: default_task_name(),
            title: default_title(),
            description: String::new(),
            icon: default_icon(),
            color: default_color(),
            linking_uri: None,
        }
    }
}

/// One session's claim on the background task.
///
/// A lease stays active until the runner is stopped or a newer session
/// replaces it. The monitor checks its lease at every suspension point,
/// so revoking the lease is how "start a new session while one is
/// active" stops the old one without a race.
#[derive(Debug, Clone)]
pub struct RunnerLease {
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl RunnerLease {
    pub fn is_active(&self) -> bool {
        *self.rx.borrow() == self.generation
    }

    /// Resolves once the lease has been revoked.
    pub async fn revoked(&mut self) {
        while self.is_active() {
            if self.rx.changed().await.is_err() {
                // Runner dropped; nothing is keeping the task alive.
                return;
            }
        }
    }
}

/// The platform facility that keeps the monitor's loop alive while the
/// app is not in the foreground.
pub trait BackgroundRunner: Send + Sync {
    /// Acquire the keep-alive and show the task notification. Any
    /// previously active session's lease is revoked first.
    fn start(&self, config: &RunnerConfig) -> Result<RunnerLease, RunnerError>;

    /// Release the keep-alive; revokes the current lease.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Replace the notification status text.
    fn update_status(&self, text: &str);
}

/// In-process runner backed by a watch channel.
///
/// Generation 0 means "not running"; each `start` publishes a fresh
/// generation, which both revokes the previous lease and tags the new
/// one.
pub struct TaskRunner {
    running: watch::Sender<u64>,
    next_generation: AtomicU64,
    status: Mutex<String>,
}

impl TaskRunner {
    pub fn new() -> Self {
        let (running, _) = watch::channel(0);
        Self {
            running,
            next_generation: AtomicU64::new(0),
            status: Mutex::new(String::new()),
        }
    }

    /// Current notification status text.
    pub fn status(&self) -> String {
        self.status.lock().unwrap().clone()
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundRunner for TaskRunner {
    fn start(&self, config: &RunnerConfig) -> Result<RunnerLease, RunnerError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.running.send_replace(generation);
        if previous != 0 {
            warn!("revoking active background task (generation {previous})");
        }
        info!("background task '{}' started", config.title);
        Ok(RunnerLease {
            generation,
            rx: self.running.subscribe(),
        })
    }

    fn stop(&self) {
        let previous = self.running.send_replace(0);
        if previous != 0 {
            info!("background task stopped");
        }
    }

    fn is_running(&self) -> bool {
        *self.running.borrow() != 0
    }

    fn update_status(&self, text: &str) {
        debug!("status: {text}");
        *self.status.lock().unwrap() = text.to_string();
    }
}
