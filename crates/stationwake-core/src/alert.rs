//! Arrival and progress side effects.

/// Executes the user-facing side effects of a monitoring session.
///
/// Implementations own the vibration pattern, audio cue, and notification
/// text; the monitor only decides *when* they fire. Arrival fires at most
/// once per session.
pub trait AlertSink: Send + Sync {
    /// Arrival: vibration pattern, audio cue, final status text.
    fn on_arrival(&self, distance_m: f64);

    /// Periodic progress: status text update only.
    fn on_progress(&self, destination: &str, distance_m: f64);
}
