//! Data models flowing between the pipeline stages.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

// ---

/// Per-row data quality label assigned by the cleaner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    // ---
    /// Every sensor value was present and in range.
    Good,
    /// At least one value was missing or invalid but was carried forward.
    Estimated,
    /// At least one value is still missing after carry-forward.
    Invalid,
}

impl DataQuality {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Good => "good",
            DataQuality::Estimated => "estimated",
            DataQuality::Invalid => "invalid",
        }
    }
}

/// Binary outcome of a quality inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityResult {
    Pass,
    Fail,
}

impl QualityResult {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityResult::Pass => "pass",
            QualityResult::Fail => "fail",
        }
    }

    /// Canonicalize the common inspection vocabulary (`passed`, `ok`, `ng`, ...).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pass" | "passed" | "ok" => Some(QualityResult::Pass),
            "fail" | "failed" | "ng" => Some(QualityResult::Fail),
            _ => None,
        }
    }
}

/// Inspection status of a sensor reading after the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    NotChecked,
    Passed,
    Failed,
}

impl From<Option<QualityResult>> for QualityStatus {
    fn from(result: Option<QualityResult>) -> Self {
        match result {
            None => QualityStatus::NotChecked,
            Some(QualityResult::Pass) => QualityStatus::Passed,
            Some(QualityResult::Fail) => QualityStatus::Failed,
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityStatus::NotChecked => "not_checked",
            QualityStatus::Passed => "passed",
            QualityStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Standardized sensor reading, the unit persisted to `sensor_readings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    // ---
    pub record_id: String,
    pub timestamp: NaiveDateTime,
    pub line_id: Option<String>,
    pub machine_id: Option<String>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub vibration: Option<f64>,
    pub power: Option<f64>,
    pub data_quality: DataQuality,
}

/// Normalized quality inspection, persisted to `quality_checks`.
///
/// `defect_type` is only ever populated for failed inspections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityCheck {
    // ---
    pub timestamp: NaiveDateTime,
    pub line_id: String,
    pub machine_id: String,
    pub result: QualityResult,
    pub defect_type: Option<String>,
}

/// A sensor reading paired with its matching inspection, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedReading {
    // ---
    pub reading: SensorReading,
    pub result: Option<QualityResult>,
    pub defect_type: Option<String>,
    pub quality_status: QualityStatus,
}

/// Hourly aggregate per (hour, line, machine), persisted to `hourly_summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySummary {
    // ---
    pub hour: NaiveDateTime,
    pub line_id: Option<String>,
    pub machine_id: Option<String>,
    pub avg_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub avg_vibration: Option<f64>,
    pub total_checks: i64,
    pub defect_count: i64,
    pub defect_rate: f64,
}
