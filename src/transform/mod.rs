//! Transform stage gateway.
//!
//! Sibling modules own one step each (cleaning, standardization, quality
//! normalization, join, aggregation); callers only see what is re-exported
//! here.

mod aggregate;
mod clean;
mod identity;
mod join;
mod quality;
mod standardize;
mod table;
mod timestamp;

pub use aggregate::{calculate_hourly_summary, defect_rate};
pub use clean::{clean_sensor_data, CleanedSensorRow, CleanedSensors, CleaningPolicy, SensorColumn, ValueRange};
pub use identity::{derive_line, make_record_id, to_machine_key, MACHINES_PER_LINE};
pub use join::join_sensor_quality;
pub use quality::{
    alignment_shift, filter_completed, sensor_window, transform_quality_data, QualityAliases,
    DEFAULT_DEFECT_TYPE,
};
pub use standardize::standardize_sensor_data;
pub use table::{is_missing, normalize_column_name, RawTable};
pub use timestamp::{floor_to_hour, parse_timestamp, to_iso};
