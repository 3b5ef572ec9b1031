//! End-to-end monitor loop tests.
//!
//! The real `TaskRunner` and `ReplayPositionSource` drive the loop;
//! store and sink are fakes so every side effect can be observed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::sleep;

use stationwake_core::{
    Accuracy, AlertSink, BackgroundRunner, Coordinate, Destination, DestinationStore, Event,
    GrantedGate, MonitorConfig, MonitorState, PositionSample, PositionSource, ProximityMonitor,
    ReplayPositionSource, SampleError, StorageError, TaskRunner,
};

const DEADLINE: Duration = Duration::from_secs(5);

fn dadar() -> Destination {
    Destination::new("Dadar", 19.0186, 72.8446)
}

fn churchgate() -> Destination {
    Destination::new("Churchgate", 18.9352, 72.8277)
}

/// Fast test policy: tiny interval, generous sample timeout.
fn fast_config() -> MonitorConfig {
    MonitorConfig {
        threshold_m: 150.0,
        interval_ms: 5,
        sample_timeout_ms: 60_000,
        accuracy: Accuracy::Low,
    }
}

struct MemStore(Mutex<Option<Destination>>);

impl MemStore {
    fn with(destination: Destination) -> Self {
        Self(Mutex::new(Some(destination)))
    }

    fn put(&self, destination: Option<Destination>) {
        *self.0.lock().unwrap() = destination;
    }
}

impl DestinationStore for MemStore {
    fn set(&self, destination: &Destination) -> Result<(), StorageError> {
        self.put(Some(destination.clone()));
        Ok(())
    }

    fn get(&self) -> Result<Option<Destination>, StorageError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

/// Store that works until the test breaks it.
struct FlakyStore {
    destination: Destination,
    broken: std::sync::atomic::AtomicBool,
}

impl FlakyStore {
    fn with(destination: Destination) -> Self {
        Self {
            destination,
            broken: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn break_now(&self) {
        self.broken.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl DestinationStore for FlakyStore {
    fn set(&self, _destination: &Destination) -> Result<(), StorageError> {
        Err(StorageError::QueryFailed("read-only".into()))
    }

    fn get(&self) -> Result<Option<Destination>, StorageError> {
        if self.broken.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StorageError::QueryFailed("disk gone".into()))
        } else {
            Ok(Some(self.destination.clone()))
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    arrivals: Mutex<Vec<f64>>,
    progress: Mutex<Vec<(String, f64)>>,
}

impl RecordingSink {
    fn arrivals(&self) -> Vec<f64> {
        self.arrivals.lock().unwrap().clone()
    }

    fn progress(&self) -> Vec<(String, f64)> {
        self.progress.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingSink {
    fn on_arrival(&self, distance_m: f64) {
        self.arrivals.lock().unwrap().push(distance_m);
    }

    fn on_progress(&self, destination: &str, distance_m: f64) {
        self.progress
            .lock()
            .unwrap()
            .push((destination.to_string(), distance_m));
    }
}

/// Source that always fails.
struct FailingSource;

#[async_trait]
impl PositionSource for FailingSource {
    async fn sample(&self, _accuracy: Accuracy) -> Result<PositionSample, SampleError> {
        Err(SampleError::Sensor("no fix".into()))
    }
}

/// Source that never answers inside the configured timeout.
struct StalledSource;

#[async_trait]
impl PositionSource for StalledSource {
    async fn sample(&self, _accuracy: Accuracy) -> Result<PositionSample, SampleError> {
        sleep(Duration::from_secs(600)).await;
        Err(SampleError::Unavailable)
    }
}

/// Source that parks every request until the test releases it, and
/// signals when a request has begun.
struct GatedSource {
    point: Coordinate,
    entered: Notify,
    release: Notify,
}

impl GatedSource {
    fn at(point: Coordinate) -> Self {
        Self {
            point,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PositionSource for GatedSource {
    async fn sample(&self, accuracy: Accuracy) -> Result<PositionSample, SampleError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(PositionSample {
            latitude: self.point.latitude,
            longitude: self.point.longitude,
            accuracy,
            timestamp_ms: 0,
        })
    }
}

struct Fixture {
    store: Arc<MemStore>,
    sink: Arc<RecordingSink>,
    runner: Arc<TaskRunner>,
    monitor: Arc<ProximityMonitor>,
}

fn fixture(
    destination: Destination,
    source: Arc<dyn PositionSource>,
    config: MonitorConfig,
) -> Fixture {
    let store = Arc::new(MemStore::with(destination));
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(TaskRunner::new());
    let monitor = Arc::new(ProximityMonitor::new(
        store.clone(),
        source,
        sink.clone(),
        runner.clone(),
        Arc::new(GrantedGate),
        config,
    ));
    Fixture {
        store,
        sink,
        runner,
        monitor,
    }
}

/// Poll `predicate` until it holds or the deadline passes.
async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + DEADLINE;
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within deadline"
        );
        sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn alerts_exactly_once_when_threshold_crossed() {
    // Two far samples, then one inside the threshold.
    let track = vec![
        Coordinate::new(18.9352, 72.8277), // ~9.4 km out
        Coordinate::new(19.0286, 72.8446), // ~1.1 km out
        Coordinate::new(19.0191, 72.8446), // ~56 m out
        Coordinate::new(19.0186, 72.8446), // never reached
    ];
    let f = fixture(
        dadar(),
        Arc::new(ReplayPositionSource::new(track)),
        fast_config(),
    );

    let mut events = f.monitor.subscribe();
    f.monitor.start().unwrap();
    let state = f.monitor.run().await;

    assert_eq!(state, MonitorState::Alerted);
    assert_eq!(f.monitor.state(), MonitorState::Alerted);
    assert!(!f.runner.is_running());

    let arrivals = f.sink.arrivals();
    assert_eq!(arrivals.len(), 1);
    assert!(arrivals[0] <= 150.0);

    let progress = f.sink.progress();
    assert_eq!(progress.len(), 2);
    assert!(progress.iter().all(|(name, d)| name == "Dadar" && *d > 150.0));
    assert_eq!(f.monitor.sample_count(), 3);

    // Event stream mirrors the session: started, 2x progress, arrival.
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            Event::MonitorStarted { .. } => "started",
            Event::ProgressUpdated { .. } => "progress",
            Event::ArrivalAlerted { .. } => "arrival",
            Event::MonitorStopped { .. } => "stopped",
            Event::StateSnapshot { .. } => "snapshot",
        });
    }
    assert_eq!(kinds, vec!["started", "progress", "progress", "arrival"]);
}

#[tokio::test]
async fn missing_destination_skips_ticks_without_stopping() {
    let f = fixture(
        dadar(),
        Arc::new(ReplayPositionSource::new(vec![Coordinate::new(
            19.0186, 72.8446,
        )])),
        fast_config(),
    );

    f.monitor.start().unwrap();
    // Destination vanishes before the first tick runs.
    f.store.put(None);

    let monitor = f.monitor.clone();
    let session = tokio::spawn(async move { monitor.run().await });

    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.monitor.state(), MonitorState::Polling);
    assert!(f.sink.arrivals().is_empty());
    assert!(f.sink.progress().is_empty());
    assert_eq!(f.monitor.sample_count(), 0);

    f.monitor.stop();
    assert_eq!(session.await.unwrap(), MonitorState::Stopped);
}

#[tokio::test]
async fn storage_failure_is_treated_as_no_destination() {
    // The sample sits on the destination, so any tick that can read the
    // store would alert.
    let store = Arc::new(FlakyStore::with(dadar()));
    let sink = Arc::new(RecordingSink::default());
    let monitor = Arc::new(ProximityMonitor::new(
        store.clone(),
        Arc::new(ReplayPositionSource::new(vec![Coordinate::new(
            19.0186, 72.8446,
        )])),
        sink.clone(),
        Arc::new(TaskRunner::new()),
        Arc::new(GrantedGate),
        fast_config(),
    ));

    monitor.start().unwrap();
    store.break_now();
    let session = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run().await })
    };

    sleep(Duration::from_millis(60)).await;
    assert_eq!(monitor.state(), MonitorState::Polling);
    assert!(sink.arrivals().is_empty());

    monitor.stop();
    assert_eq!(session.await.unwrap(), MonitorState::Stopped);
}

#[tokio::test]
async fn sample_failures_keep_the_session_polling() {
    let f = fixture(dadar(), Arc::new(FailingSource), fast_config());

    f.monitor.start().unwrap();
    let monitor = f.monitor.clone();
    let session = tokio::spawn(async move { monitor.run().await });

    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.monitor.state(), MonitorState::Polling);
    assert_eq!(f.monitor.sample_count(), 0);
    assert!(f.sink.arrivals().is_empty());

    f.monitor.stop();
    assert_eq!(session.await.unwrap(), MonitorState::Stopped);
}

#[tokio::test]
async fn sample_timeouts_keep_the_session_polling() {
    let config = MonitorConfig {
        sample_timeout_ms: 20,
        ..fast_config()
    };
    let f = fixture(dadar(), Arc::new(StalledSource), config);

    f.monitor.start().unwrap();
    let monitor = f.monitor.clone();
    let session = tokio::spawn(async move { monitor.run().await });

    sleep(Duration::from_millis(150)).await;
    assert_eq!(f.monitor.state(), MonitorState::Polling);
    assert!(f.sink.arrivals().is_empty());
    assert!(f.sink.progress().is_empty());

    f.monitor.stop();
    assert_eq!(session.await.unwrap(), MonitorState::Stopped);
}

#[tokio::test]
async fn stop_suppresses_side_effects_of_a_tick_in_flight() {
    // The sample sits right on the destination, so the tick would alert
    // if its side effects were not suppressed.
    let source = Arc::new(GatedSource::at(Coordinate::new(19.0186, 72.8446)));
    let f = fixture(dadar(), source.clone(), fast_config());

    f.monitor.start().unwrap();
    let monitor = f.monitor.clone();
    let session = tokio::spawn(async move { monitor.run().await });

    // Wait for the tick to be blocked inside the sampling call.
    source.entered.notified().await;
    f.monitor.stop();
    source.release.notify_one();

    assert_eq!(session.await.unwrap(), MonitorState::Stopped);
    assert!(f.sink.arrivals().is_empty());
    assert!(f.sink.progress().is_empty());
}

#[tokio::test]
async fn destination_change_applies_on_the_next_tick() {
    // The commuter sits at Dadar while the stored destination is
    // Churchgate; no alert until the destination is re-pointed.
    let source = Arc::new(ReplayPositionSource::new(vec![Coordinate::new(
        19.0186, 72.8446,
    )]));
    let f = fixture(churchgate(), source, fast_config());

    f.monitor.start().unwrap();
    let monitor = f.monitor.clone();
    let session = tokio::spawn(async move { monitor.run().await });

    let sink = f.sink.clone();
    wait_until(move || sink.progress().len() >= 2).await;
    assert!(f.sink.arrivals().is_empty());

    f.store.put(Some(dadar()));
    assert_eq!(session.await.unwrap(), MonitorState::Alerted);
    assert_eq!(f.sink.arrivals().len(), 1);
    assert!(f.sink.progress().iter().all(|(name, _)| name == "Churchgate"));
}

#[tokio::test]
async fn starting_a_new_session_stops_the_previous_one() {
    let runner = Arc::new(TaskRunner::new());
    let point = Coordinate::new(19.0186, 72.8446);

    let store_a = Arc::new(MemStore::with(churchgate()));
    let sink_a = Arc::new(RecordingSink::default());
    let first = Arc::new(ProximityMonitor::new(
        store_a,
        Arc::new(ReplayPositionSource::new(vec![point])),
        sink_a.clone(),
        runner.clone(),
        Arc::new(GrantedGate),
        fast_config(),
    ));
    first.start().unwrap();
    let first_session = {
        let first = first.clone();
        tokio::spawn(async move { first.run().await })
    };

    let sink = sink_a.clone();
    wait_until(move || !sink.progress().is_empty()).await;

    // Second session takes over the background task.
    let sink_b = Arc::new(RecordingSink::default());
    let second = Arc::new(ProximityMonitor::new(
        Arc::new(MemStore::with(dadar())),
        Arc::new(ReplayPositionSource::new(vec![point])),
        sink_b.clone(),
        runner.clone(),
        Arc::new(GrantedGate),
        fast_config(),
    ));
    second.start().unwrap();

    // The first session winds down to Stopped with no further effects.
    assert_eq!(first_session.await.unwrap(), MonitorState::Stopped);
    let frozen = sink_a.progress().len();

    let state = second.run().await;
    assert_eq!(state, MonitorState::Alerted);
    assert_eq!(sink_b.arrivals().len(), 1);
    assert_eq!(sink_a.progress().len(), frozen);
    assert!(sink_a.arrivals().is_empty());
}

#[tokio::test]
async fn stop_before_run_never_samples() {
    let source = Arc::new(ReplayPositionSource::new(vec![Coordinate::new(
        19.0186, 72.8446,
    )]));
    let f = fixture(dadar(), source, fast_config());

    f.monitor.start().unwrap();
    f.monitor.stop();
    assert_eq!(f.monitor.run().await, MonitorState::Stopped);
    assert_eq!(f.monitor.sample_count(), 0);
    assert!(f.sink.arrivals().is_empty());
}
