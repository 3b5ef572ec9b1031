//! # Stationwake Core Library
//!
//! Core logic for Stationwake, a transit arrival alarm: select a station,
//! let a background task poll the device position at an interval, and get
//! a single unambiguous alert the first time you come within the arrival
//! threshold.
//!
//! This library is CLI-first: every operation is available through the
//! standalone CLI binary, with platform shells expected to be thin layers
//! over the same core.
//!
//! ## Architecture
//!
//! - **Proximity Monitor**: a polling state machine with one cooperative
//!   tick in flight at a time; the position sensor, alert sink, background
//!   keep-alive, destination store, and permission gate are all injected
//!   trait objects so each can be faked in tests
//! - **Storage**: SQLite-backed destination store and TOML-based
//!   configuration
//! - **Geometry**: haversine great-circle distance
//!
//! ## Key Components
//!
//! - [`ProximityMonitor`]: the session state machine
//! - [`Database`]: durable key-value storage
//! - [`Config`]: application configuration management
//! - [`AlertSink`], [`PositionSource`], [`BackgroundRunner`],
//!   [`PermissionGate`]: the collaborator seams

pub mod alert;
pub mod destination;
pub mod error;
pub mod events;
pub mod gate;
pub mod geo;
pub mod monitor;
pub mod position;
pub mod runner;
pub mod storage;

pub use alert::AlertSink;
pub use destination::{Destination, DestinationStore};
pub use error::{
    ConfigError, CoreError, MonitorError, RunnerError, SampleError, StorageError,
};
pub use events::Event;
pub use gate::{GrantedGate, PermissionGate};
pub use geo::{distance_metres, Coordinate};
pub use monitor::{MonitorConfig, MonitorState, ProximityMonitor};
pub use position::{Accuracy, PositionSample, PositionSource, ReplayPositionSource};
pub use runner::{BackgroundRunner, RunnerConfig, RunnerLease, TaskRunner};
pub use storage::{Config, Database, SqliteDestinationStore};
