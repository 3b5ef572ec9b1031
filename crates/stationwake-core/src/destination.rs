//! The selected station and its durable store.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::geo::Coordinate;

/// The station the user wants to be alerted for.
///
/// Immutable once captured for a monitoring session; the monitor re-reads
/// the store on every tick instead of mutating a captured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Destination {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Durable holder of the single currently selected destination.
///
/// `set` always overwrites; there is no history, and nothing clears the
/// value automatically -- stopping a session leaves it in place. A `get`
/// racing a `set` must observe either the old or the new value, never a
/// partial write, which is why implementations need atomic single-key
/// storage underneath.
pub trait DestinationStore: Send + Sync {
    fn set(&self, destination: &Destination) -> Result<(), StorageError>;
    fn get(&self) -> Result<Option<Destination>, StorageError>;
}
