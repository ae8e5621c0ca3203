//! `lineflow`: batch ETL for production-line telemetry.
//!
//! Two CSV sources (sensor readings and quality inspections) are extracted,
//! cleaned, aligned, joined and rolled up by hour, then loaded idempotently
//! into SQLite. The binary in `main.rs` is a thin CLI over [`pipeline::run`]
//! and [`report::write_report`].
//!
//! Each submodule is a gateway for its stage; siblings reach each other only
//! through what is re-exported at this level or by the stage gateways.

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod transform;

pub use config::Config;
pub use error::{EtlError, Result, ValidationError};
pub use models::{
    DataQuality, HourlySummary, JoinedReading, QualityCheck, QualityResult, QualityStatus,
    SensorReading,
};
pub use pipeline::{RunSummary, TransformOutput};
