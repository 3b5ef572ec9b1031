//! The `monitor` command is the composition root: it picks the concrete
//! collaborators and injects them into the engine. A session runs until
//! the arrival alert fires or Ctrl-C requests an explicit stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use log::info;

use stationwake_core::storage::{Config, SqliteDestinationStore};
use stationwake_core::{
    Accuracy, AlertSink, BackgroundRunner, GrantedGate, MonitorState, ProximityMonitor,
    ReplayPositionSource, TaskRunner,
};

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Start a monitoring session and run until arrival or Ctrl-C
    Start {
        /// JSON track file replayed as the position source
        #[arg(long)]
        track: PathBuf,
        /// Polling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Arrival threshold in metres
        #[arg(long)]
        threshold_m: Option<f64>,
        /// Position request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Request high-accuracy positioning
        #[arg(long)]
        high_accuracy: bool,
    },
}

/// Alert sink for terminal sessions: keeps the runner status line
/// current and rings the terminal bell on arrival.
struct StatusAlertSink {
    runner: Arc<TaskRunner>,
    bell: bool,
}

impl AlertSink for StatusAlertSink {
    fn on_arrival(&self, distance_m: f64) {
        self.runner
            .update_status(&format!("Arrived ({distance_m:.0} m)"));
        if self.bell {
            print!("\x07");
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
    }

    fn on_progress(&self, destination: &str, distance_m: f64) {
        self.runner
            .update_status(&format!("{destination}: {distance_m:.0} m away"));
    }
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        MonitorAction::Start {
            track,
            interval_ms,
            threshold_m,
            timeout_ms,
            high_accuracy,
        } => {
            let app_config = Config::load_or_default();
            let mut config = app_config.monitor.clone();
            if let Some(v) = interval_ms {
                config.interval_ms = v;
            }
            if let Some(v) = threshold_m {
                config.threshold_m = v;
            }
            if let Some(v) = timeout_ms {
                config.sample_timeout_ms = v;
            }
            if high_accuracy {
                config.accuracy = Accuracy::High;
            }

            let store = Arc::new(SqliteDestinationStore::open()?);
            let source = Arc::new(ReplayPositionSource::from_path(&track)?);
            let runner = Arc::new(TaskRunner::new());
            let sink = Arc::new(StatusAlertSink {
                runner: runner.clone(),
                bell: app_config.alerts.enabled,
            });
            let monitor = Arc::new(
                ProximityMonitor::new(
                    store,
                    source,
                    sink,
                    runner,
                    Arc::new(GrantedGate),
                    config,
                )
                .with_runner_config(app_config.runner.clone()),
            );

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async move {
                let mut events = monitor.subscribe();
                monitor.start()?;

                let printer = tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if let Ok(json) = serde_json::to_string(&event) {
                            println!("{json}");
                        }
                    }
                });

                let session = {
                    let monitor = monitor.clone();
                    tokio::spawn(async move { monitor.run().await })
                };
                let watcher = {
                    let monitor = monitor.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            info!("interrupt received; stopping session");
                            monitor.stop();
                        }
                    })
                };

                let state = session.await.unwrap_or(MonitorState::Stopped);
                watcher.abort();
                let _ = watcher.await;
                info!("session ended: {state:?}");

                println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);

                // Dropping the last engine handle closes the event
                // channel and lets the printer drain.
                drop(monitor);
                let _ = printer.await;
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
        }
    }
    Ok(())
}
