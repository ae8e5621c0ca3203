//! Command-line surface: `lineflow run` and `lineflow report`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::report::DEFAULT_REPORT_PATH;

#[derive(Debug, Parser)]
#[command(name = "lineflow", version, about = "Production-line ETL: CSV -> transform -> SQLite")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, transform and load both sources
    Run(RunArgs),
    /// Run the sample reporting queries and write them as Markdown
    Report(ReportArgs),
}

/// Flags for `run`. Anything omitted falls back to the environment.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the sensor CSV file
    #[arg(long)]
    pub sensor_csv: Option<PathBuf>,

    /// Path to the quality CSV file
    #[arg(long)]
    pub quality_csv: Option<PathBuf>,

    /// SQLite database output path
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Keep the last N days of sensor data (relative to the dataset's max timestamp)
    #[arg(long)]
    pub days: Option<u32>,

    /// Rows per insert transaction
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Folder for intermediate CSV outputs
    #[arg(long)]
    pub outputs: Option<PathBuf>,
}

impl From<RunArgs> for ConfigOverrides {
    fn from(args: RunArgs) -> Self {
        ConfigOverrides {
            sensor_csv: args.sensor_csv,
            quality_csv: args.quality_csv,
            db_path: args.db,
            retention_days: args.days,
            chunk_size: args.chunk_size,
            output_dir: args.outputs,
        }
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Path to the SQLite database
    #[arg(long, env = "ETL_DB_PATH", default_value = crate::config::DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Markdown output file
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_run_flags_become_overrides() {
        // ---
        let cli = Cli::try_parse_from([
            "lineflow",
            "run",
            "--sensor-csv",
            "s.csv",
            "--quality-csv",
            "q.csv",
            "--days",
            "3",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        let overrides = ConfigOverrides::from(args);
        assert_eq!(overrides.sensor_csv, Some(PathBuf::from("s.csv")));
        assert_eq!(overrides.retention_days, Some(3));
        assert_eq!(overrides.db_path, None);
    }

    #[test]
    fn test_report_defaults() {
        // ---
        let cli = Cli::try_parse_from(["lineflow", "report", "--db", "x.db"]).unwrap();
        let Command::Report(args) = cli.command else {
            panic!("expected report subcommand");
        };
        assert_eq!(args.db, PathBuf::from("x.db"));
        assert_eq!(args.out, PathBuf::from(DEFAULT_REPORT_PATH));
    }
}
