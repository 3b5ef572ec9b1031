//! Position sampling.
//!
//! A [`PositionSource`] answers one sample request at a time. The request
//! is asynchronous and cancellable; the monitor bounds it with a timeout
//! and treats a timeout exactly like a sensor error (tick skipped,
//! session continues).

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, SampleError};
use crate::geo::Coordinate;

/// Positioning accuracy requested from the sensor. `Low` is the
/// battery-friendly default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    High,
    #[default]
    Low,
}

/// One fix from the platform location sensor. Consumed immediately by
/// the distance calculation, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Accuracy,
    pub timestamp_ms: u64,
}

impl PositionSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Source of position samples.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Request one sample. Implementations may take as long as they
    /// like; the caller applies the timeout and may drop the future to
    /// cancel the request.
    async fn sample(&self, accuracy: Accuracy) -> Result<PositionSample, SampleError>;
}

/// Replays a recorded track as if it were a live sensor.
///
/// Points are yielded in file order, one per request; once the track is
/// exhausted the final point repeats (a commuter standing still). Lets
/// the CLI and tests drive a full monitoring session without GPS
/// hardware.
pub struct ReplayPositionSource {
    points: Vec<Coordinate>,
    cursor: AtomicUsize,
}

impl ReplayPositionSource {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self {
            points,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Load a track from a JSON file holding an array of
    /// `{ "latitude": .., "longitude": .. }` objects.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let points: Vec<Coordinate> = serde_json::from_str(&content)?;
        Ok(Self::new(points))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl PositionSource for ReplayPositionSource {
    async fn sample(&self, accuracy: Accuracy) -> Result<PositionSample, SampleError> {
        if self.points.is_empty() {
            return Err(SampleError::Unavailable);
        }
        let index = self
            .cursor
            .fetch_add(1, Ordering::SeqCst)
            .min(self.points.len() - 1);
        let point = self.points[index];
        Ok(PositionSample {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy,
            timestamp_ms: now_ms(),
        })
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
