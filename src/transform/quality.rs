//! Quality inspection normalization.
//!
//! Inspection exports are loosely shaped: the timestamp column goes by several
//! names, the outcome may be a text label or a 0/1 fault flag, and machine ids
//! are sometimes missing entirely. This module resolves all of that into
//! [`QualityCheck`] rows that share the sensor join key.

use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

use super::identity::{derive_line, to_machine_key};
use super::table::{is_missing, RawTable};
use super::timestamp::parse_timestamp;
use crate::error::ValidationError;
use crate::models::{QualityCheck, QualityResult, SensorReading};
use crate::Result;

/// Defect type recorded for failures when the source has no defect column.
pub const DEFAULT_DEFECT_TYPE: &str = "fault";

// ---

/// Ordered alias lists for the loosely named inspection columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityAliases {
    // ---
    /// Inspection status columns; only completed inspections are kept.
    pub status: Vec<String>,
    /// Status values meaning "completed" (compared case-insensitively).
    pub completed_values: Vec<String>,
    pub timestamp: Vec<String>,
    /// Substring matched against column names when no timestamp alias exists.
    pub timestamp_fallback: String,
    /// Binary fault flag columns (1 = fail), used when there is no `result`.
    pub fault_flag: Vec<String>,
}

impl Default for QualityAliases {
    fn default() -> Self {
        // ---
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            status: owned(&["status", "inspection_status", "qc_status"]),
            completed_values: owned(&["completed", "complete", "done", "finished"]),
            timestamp: owned(&["timestamp", "time", "datetime", "date_time"]),
            timestamp_fallback: "time".to_string(),
            fault_flag: owned(&["fault_label", "defect_flag", "defect", "anomaly_flag"]),
        }
    }
}

impl QualityAliases {
    // ---
    /// True for numeric 1 or one of the completed status words.
    pub fn is_completed(&self, raw: &str) -> bool {
        // ---
        let s = raw.trim();
        if is_missing(s) {
            return false;
        }
        if let Ok(n) = s.parse::<f64>() {
            return n.is_finite() && n.trunc() == 1.0;
        }
        let lowered = s.to_lowercase();
        self.completed_values.iter().any(|v| v.eq_ignore_ascii_case(&lowered))
    }
}

/// Drop inspections that are not completed, when a status column exists.
///
/// Expects normalized column names.
pub fn filter_completed(mut table: RawTable, aliases: &QualityAliases) -> RawTable {
    // ---
    let Some(idx) = table.resolve_column(&aliases.status) else {
        return table;
    };

    let before = table.len();
    table.retain_rows(|row| aliases.is_completed(row.get(idx).map(String::as_str).unwrap_or("")));
    debug!(
        "Status column '{}': kept {} of {} inspections",
        table.columns[idx],
        table.len(),
        before
    );
    table
}

/// Earliest and latest sensor timestamps, `None` for an empty batch.
pub fn sensor_window(sensors: &[SensorReading]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    // ---
    let min = sensors.iter().map(|s| s.timestamp).min()?;
    let max = sensors.iter().map(|s| s.timestamp).max()?;
    Some((min, max))
}

/// Shift that end-aligns the quality timeline with the sensor window.
///
/// Only returned when no quality timestamp falls inside the window; any
/// overlap at all means the timelines already correspond.
pub fn alignment_shift(
    quality_times: &[NaiveDateTime],
    window: Option<(NaiveDateTime, NaiveDateTime)>,
) -> Option<TimeDelta> {
    // ---
    let (min, max) = window?;
    let quality_max = quality_times.iter().max()?;
    let overlaps = quality_times.iter().any(|t| *t >= min && *t <= max);
    if overlaps {
        return None;
    }
    Some(max - *quality_max)
}

struct PendingCheck {
    timestamp: NaiveDateTime,
    machine_id: Option<String>,
    line_id: Option<String>,
    result: QualityResult,
    defect_type: Option<String>,
}

fn cell_value(table: &RawTable, row: usize, idx: Option<usize>) -> Option<String> {
    idx.map(|i| table.cell(row, i).trim())
        .filter(|s| !is_missing(s))
        .map(str::to_string)
}

/// Normalize extracted inspections against the standardized sensor batch.
pub fn transform_quality_data(
    table: &RawTable,
    sensors: &[SensorReading],
    aliases: &QualityAliases,
) -> Result<Vec<QualityCheck>> {
    // ---
    let table = table.clone().normalize_columns();

    let ts_idx = table
        .resolve_column(&aliases.timestamp)
        .or_else(|| table.find_column_containing(&aliases.timestamp_fallback))
        .ok_or_else(|| ValidationError::NoAliasMatch {
            dataset: "quality",
            aliases: aliases.timestamp.clone(),
            fallback: "time",
        })?;

    let result_idx = table.column_index("result");
    let flag_idx = match result_idx {
        Some(_) => None,
        None => table.resolve_column(&aliases.fault_flag),
    };
    let defect_idx = table.column_index("defect_type");
    let machine_idx = table.column_index("machine_id");
    let line_idx = table.column_index("line_id");

    let mut pending = Vec::with_capacity(table.len());
    let mut bad_timestamps = 0usize;
    let mut unknown_results = 0usize;

    for row in 0..table.len() {
        let Some(timestamp) = parse_timestamp(table.cell(row, ts_idx)) else {
            bad_timestamps += 1;
            continue;
        };

        let result = if let Some(idx) = result_idx {
            match QualityResult::from_label(table.cell(row, idx)) {
                Some(r) => r,
                None => {
                    unknown_results += 1;
                    continue;
                }
            }
        } else if let Some(idx) = flag_idx {
            let flag = table.cell(row, idx).trim().parse::<f64>().unwrap_or(0.0);
            if flag.is_finite() && flag.trunc() == 1.0 {
                QualityResult::Fail
            } else {
                QualityResult::Pass
            }
        } else {
            QualityResult::Pass
        };

        let defect_type = match (result, defect_idx) {
            (QualityResult::Pass, _) => None,
            (QualityResult::Fail, Some(_)) => cell_value(&table, row, defect_idx),
            (QualityResult::Fail, None) => Some(DEFAULT_DEFECT_TYPE.to_string()),
        };

        pending.push(PendingCheck {
            timestamp,
            machine_id: cell_value(&table, row, machine_idx),
            line_id: cell_value(&table, row, line_idx),
            result,
            defect_type,
        });
    }

    if bad_timestamps > 0 {
        debug!("Dropped {} inspections with unparseable timestamps", bad_timestamps);
    }
    if unknown_results > 0 {
        warn!("Dropped {} inspections with an unrecognized result label", unknown_results);
    }

    let times: Vec<NaiveDateTime> = pending.iter().map(|p| p.timestamp).collect();
    if let Some(shift) = alignment_shift(&times, sensor_window(sensors)) {
        info!(
            "Quality timeline does not overlap sensor data; shifting by {}s",
            shift.num_seconds()
        );
        for p in &mut pending {
            p.timestamp += shift;
        }
    }

    backfill_identity(&mut pending, sensors);

    let total = pending.len();
    let checks: Vec<QualityCheck> = pending
        .into_iter()
        .filter_map(|p| {
            Some(QualityCheck {
                timestamp: p.timestamp,
                line_id: p.line_id?,
                machine_id: p.machine_id?,
                result: p.result,
                defect_type: p.defect_type,
            })
        })
        .collect();

    if checks.len() < total {
        debug!(
            "Dropped {} inspections without a machine/line key",
            total - checks.len()
        );
    }
    info!("Normalized {} quality checks", checks.len());
    Ok(checks)
}

/// Resolve machine and line ids.
///
/// When the inspections carry no machine ids at all, they are borrowed from
/// the sensor reading with the exact same timestamp. Several sensor readings
/// sharing a timestamp resolve to the first one in sensor order.
fn backfill_identity(pending: &mut [PendingCheck], sensors: &[SensorReading]) {
    // ---
    if pending.iter().all(|p| p.machine_id.is_none()) {
        let mut lookup: HashMap<NaiveDateTime, (Option<String>, Option<String>)> = HashMap::new();
        for s in sensors {
            lookup
                .entry(s.timestamp)
                .or_insert_with(|| (s.machine_id.clone(), s.line_id.clone()));
        }
        debug!(
            "Inspections have no machine ids; borrowing from {} sensor timestamps",
            lookup.len()
        );

        for p in pending.iter_mut() {
            let (machine_id, line_id) = lookup.get(&p.timestamp).cloned().unwrap_or_default();
            p.machine_id = machine_id;
            p.line_id = line_id;
        }
    } else {
        for p in pending.iter_mut() {
            p.machine_id = p.machine_id.as_deref().and_then(to_machine_key);
        }
    }

    if pending.iter().all(|p| p.line_id.is_none()) {
        for p in pending.iter_mut() {
            p.line_id = p.machine_id.as_deref().and_then(derive_line);
        }
    }
}
