use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::position::Accuracy;

/// Policy parameters for one monitoring session.
///
/// These are parameters, not constants: the defaults suit a commuter
/// train ride, and every one of them can be overridden per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Distance at or below which arrival is declared, in metres.
    #[serde(default = "default_threshold_m")]
    pub threshold_m: f64,
    /// Delay between polling ticks, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Upper bound on a single position request, in milliseconds.
    #[serde(default = "default_sample_timeout_ms")]
    pub sample_timeout_ms: u64,
    /// Positioning accuracy requested from the sensor.
    #[serde(default)]
    pub accuracy: Accuracy,
}

fn default_threshold_m() -> f64 {
    150.0
}
fn default_interval_ms() -> u64 {
    5_000
}
fn default_sample_timeout_ms() -> u64 {
    15_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_m: default_threshold_m(),
            interval_ms: default_interval_ms(),
            sample_timeout_ms: default_sample_timeout_ms(),
            accuracy: Accuracy::default(),
        }
    }
}

impl MonitorConfig {
    pub(crate) fn validate(&self) -> Result<(), MonitorError> {
        if self.interval_ms == 0 {
            return Err(MonitorError::InvalidInterval);
        }
        Ok(())
    }
}
