mod config;
pub mod database;

pub use config::{AlertsConfig, Config, UiConfig};
pub use database::{Database, SqliteDestinationStore};

use std::path::PathBuf;

/// Returns `~/.config/stationwake[-dev]/` based on STATIONWAKE_ENV.
///
/// Set STATIONWAKE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STATIONWAKE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stationwake-dev")
    } else {
        base_dir.join("stationwake")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
