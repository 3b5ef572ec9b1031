use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorState;

/// Every monitor state change produces an Event.
/// The CLI prints them as JSON lines; embedders subscribe through
/// [`crate::ProximityMonitor::subscribe`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    MonitorStarted {
        destination: String,
        interval_ms: u64,
        threshold_m: f64,
        at: DateTime<Utc>,
    },
    /// A successful sample that did not cross the threshold.
    ProgressUpdated {
        destination: String,
        distance_m: f64,
        sample_count: u64,
        at: DateTime<Utc>,
    },
    /// The one-shot arrival alert fired; the session is over.
    ArrivalAlerted {
        destination: String,
        distance_m: f64,
        at: DateTime<Utc>,
    },
    MonitorStopped {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: MonitorState,
        sample_count: u64,
        threshold_m: f64,
        interval_ms: u64,
        at: DateTime<Utc>,
    },
}
