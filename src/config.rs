//! Configuration loader for the `codemetal-lineflow` ETL.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller) and applying command-line overrides on
//! top. By consolidating configuration logic here, we avoid scattering
//! `env::var` calls throughout the pipeline.
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::load::DEFAULT_CHUNK_SIZE;

/// Default trailing window of sensor data kept, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "production.db";

/// Take the override if given, else parse an optional environment variable,
/// else fall back to a default.
macro_rules! parse_env_or {
    ($override:expr, $var_name:expr, $ty:ty, $default:expr) => {
        match $override {
            Some(v) => v,
            None => env::var($var_name)
                .ok()
                .map(|v| v.trim().parse::<$ty>())
                .transpose()
                .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
                .unwrap_or($default),
        }
    };
}

/// Take the override if given, else require a path environment variable.
macro_rules! require_path {
    ($override:expr, $var_name:expr, $flag:expr) => {
        match $override {
            Some(p) => p,
            None => env::var($var_name).map(PathBuf::from).map_err(|_| {
                anyhow!(
                    "{} must be given via {} or set in .env / environment",
                    $var_name,
                    $flag
                )
            })?,
        }
    };
}

/// Strongly typed run configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // ---
    /// Sensor telemetry CSV.
    pub sensor_csv: PathBuf,

    /// Quality inspection CSV.
    pub quality_csv: PathBuf,

    /// SQLite database file; created if missing.
    pub db_path: PathBuf,

    /// Days of sensor data kept, counted back from the newest reading.
    pub retention_days: u32,

    /// Rows per insert transaction.
    pub chunk_size: usize,

    /// Where intermediate CSVs are written, if anywhere.
    pub output_dir: Option<PathBuf>,
}

/// Values supplied on the command line; each one wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sensor_csv: Option<PathBuf>,
    pub quality_csv: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub chunk_size: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

/// Load configuration from environment variables with defaults.
///
/// Required (flag or environment):
/// - `SENSOR_CSV` – sensor telemetry CSV path
/// - `QUALITY_CSV` – quality inspection CSV path
///
/// Optional:
/// - `ETL_DB_PATH` – SQLite file (default: `production.db`)
/// - `RETENTION_DAYS` – days of sensor data kept (default: 7)
/// - `LOAD_CHUNK_SIZE` – rows per insert transaction (default: 5000)
/// - `ETL_OUTPUT_DIR` – directory for intermediate CSVs (default: none)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load(overrides: ConfigOverrides) -> Result<Config> {
    // ---
    let sensor_csv = require_path!(overrides.sensor_csv, "SENSOR_CSV", "--sensor-csv");
    let quality_csv = require_path!(overrides.quality_csv, "QUALITY_CSV", "--quality-csv");
    let db_path = parse_env_or!(
        overrides.db_path,
        "ETL_DB_PATH",
        PathBuf,
        PathBuf::from(DEFAULT_DB_PATH)
    );
    let retention_days = parse_env_or!(
        overrides.retention_days,
        "RETENTION_DAYS",
        u32,
        DEFAULT_RETENTION_DAYS
    );
    let chunk_size = parse_env_or!(
        overrides.chunk_size,
        "LOAD_CHUNK_SIZE",
        usize,
        DEFAULT_CHUNK_SIZE
    );
    let output_dir = overrides
        .output_dir
        .or_else(|| env::var("ETL_OUTPUT_DIR").ok().map(PathBuf::from));

    if chunk_size == 0 {
        bail!("LOAD_CHUNK_SIZE must be at least 1");
    }

    Ok(Config {
        sensor_csv,
        quality_csv,
        db_path,
        retention_days,
        chunk_size,
        output_dir,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        let output_dir = self
            .output_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_CSV      : {}", self.sensor_csv.display());
        tracing::info!("  QUALITY_CSV     : {}", self.quality_csv.display());
        tracing::info!("  ETL_DB_PATH     : {}", self.db_path.display());
        tracing::info!("  RETENTION_DAYS  : {}", self.retention_days);
        tracing::info!("  LOAD_CHUNK_SIZE : {}", self.chunk_size);
        tracing::info!("  ETL_OUTPUT_DIR  : {}", output_dir);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn full_overrides() -> ConfigOverrides {
        ConfigOverrides {
            sensor_csv: Some("data/sensor.csv".into()),
            quality_csv: Some("data/quality.csv".into()),
            db_path: Some("out/test.db".into()),
            retention_days: Some(3),
            chunk_size: Some(10),
            output_dir: Some("outputs".into()),
        }
    }

    #[test]
    fn test_overrides_win() {
        // ---
        let cfg = load(full_overrides()).unwrap();
        assert_eq!(cfg.sensor_csv, PathBuf::from("data/sensor.csv"));
        assert_eq!(cfg.db_path, PathBuf::from("out/test.db"));
        assert_eq!(cfg.retention_days, 3);
        assert_eq!(cfg.chunk_size, 10);
        assert_eq!(cfg.output_dir, Some(PathBuf::from("outputs")));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        // ---
        let overrides = ConfigOverrides {
            chunk_size: Some(0),
            ..full_overrides()
        };
        assert!(load(overrides).is_err());
    }
}
