//! Sensor cleaning: sentinel replacement, range validation, per-machine
//! carry-forward imputation and data quality labelling.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::identity::to_machine_key;
use super::table::RawTable;
use super::timestamp::parse_timestamp;
use crate::error::ValidationError;
use crate::models::DataQuality;
use crate::Result;

// ---

/// The numeric sensor channels, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorColumn {
    Temperature,
    Pressure,
    Vibration,
    Power,
}

impl SensorColumn {
    // ---
    pub const ALL: [SensorColumn; 4] = [
        SensorColumn::Temperature,
        SensorColumn::Pressure,
        SensorColumn::Vibration,
        SensorColumn::Power,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensorColumn::Temperature => "temperature",
            SensorColumn::Pressure => "pressure",
            SensorColumn::Vibration => "vibration",
            SensorColumn::Power => "power",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Inclusive physical bounds for one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    // ---
    pub column: SensorColumn,
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Which raw values count as errors and which ranges are physically valid.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningPolicy {
    // ---
    /// Numeric error codes reported by sensors in place of a reading.
    pub sentinel_numbers: Vec<f64>,
    /// Textual placeholders for "no value".
    pub sentinel_texts: Vec<String>,
    pub ranges: Vec<ValueRange>,
}

impl Default for CleaningPolicy {
    fn default() -> Self {
        // ---
        Self {
            sentinel_numbers: vec![-999.0, -1.0],
            sentinel_texts: ["NULL", "null", "NaN", "nan", ""]
                .into_iter()
                .map(String::from)
                .collect(),
            ranges: vec![
                ValueRange {
                    column: SensorColumn::Temperature,
                    min: 0.0,
                    max: 150.0,
                },
                ValueRange {
                    column: SensorColumn::Pressure,
                    min: 0.0,
                    max: 10.0,
                },
                ValueRange {
                    column: SensorColumn::Vibration,
                    min: 0.0,
                    max: 100.0,
                },
            ],
        }
    }
}

impl CleaningPolicy {
    // ---
    /// Numeric value of a raw cell, `None` for sentinels and non-numeric text.
    pub fn parse_value(&self, raw: &str) -> Option<f64> {
        // ---
        let s = raw.trim();
        if self.sentinel_texts.iter().any(|t| t == s) {
            return None;
        }
        let value = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
        if self.sentinel_numbers.contains(&value) {
            return None;
        }
        Some(value)
    }

    pub fn range_for(&self, column: SensorColumn) -> Option<&ValueRange> {
        self.ranges.iter().find(|r| r.column == column)
    }
}

/// One cleaned sensor row. `machine_id` is still the raw source text.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSensorRow {
    // ---
    pub timestamp: NaiveDateTime,
    pub machine_id: Option<String>,
    pub values: [Option<f64>; 4],
    pub data_quality: DataQuality,
}

impl CleanedSensorRow {
    pub fn value(&self, column: SensorColumn) -> Option<f64> {
        self.values[column.index()]
    }
}

/// Cleaner output: the rows plus the column names the dataset carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedSensors {
    // ---
    pub columns: Vec<String>,
    pub rows: Vec<CleanedSensorRow>,
}

impl CleanedSensors {
    /// Column names are already normalized by the cleaner.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

struct WorkRow {
    timestamp: NaiveDateTime,
    machine_id: Option<String>,
    /// Canonical form of `machine_id`; fill groups are keyed on this.
    machine_key: Option<String>,
    values: [Option<f64>; 4],
    flagged: bool,
}

/// Clean raw sensor rows according to `policy`.
///
/// Empty input passes through unchanged. Otherwise the dataset must carry a
/// `timestamp` column; rows with unparseable timestamps are dropped.
pub fn clean_sensor_data(table: &RawTable, policy: &CleaningPolicy) -> Result<CleanedSensors> {
    // ---
    if table.is_empty() {
        return Ok(CleanedSensors {
            columns: table.clone().normalize_columns().columns,
            rows: Vec::new(),
        });
    }

    let table = table.clone().normalize_columns();
    let ts_idx = table
        .column_index("timestamp")
        .ok_or(ValidationError::MissingColumn {
            dataset: "sensor",
            column: "timestamp",
        })?;
    let machine_idx = table.column_index("machine_id");

    let mut columns = table.columns.clone();
    let mut sources: [Option<usize>; 4] = [None; 4];
    for col in SensorColumn::ALL {
        sources[col.index()] = table.column_index(col.name());
    }
    if sources[SensorColumn::Power.index()].is_none() {
        if let Some(idx) = table.column_index("energy_consumption") {
            debug!("Mapping 'energy_consumption' to 'power'");
            sources[SensorColumn::Power.index()] = Some(idx);
            columns.push("power".to_string());
        }
    }
    if !columns.iter().any(|c| c == "data_quality") {
        columns.push("data_quality".to_string());
    }

    let mut work = Vec::with_capacity(table.len());
    let mut dropped = 0usize;
    for row in 0..table.len() {
        let Some(timestamp) = parse_timestamp(table.cell(row, ts_idx)) else {
            dropped += 1;
            continue;
        };
        let machine_id = machine_idx
            .map(|idx| table.cell(row, idx).trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let mut values = [None; 4];
        let mut flagged = false;
        for col in SensorColumn::ALL {
            let Some(src) = sources[col.index()] else {
                continue;
            };
            let value = policy
                .parse_value(table.cell(row, src))
                .filter(|v| policy.range_for(col).map_or(true, |r| r.contains(*v)));
            flagged |= value.is_none();
            values[col.index()] = value;
        }

        let machine_key = machine_id.as_deref().and_then(to_machine_key);
        work.push(WorkRow {
            timestamp,
            machine_id,
            machine_key,
            values,
            flagged,
        });
    }
    if dropped > 0 {
        debug!("Dropped {} sensor rows with unparseable timestamps", dropped);
    }

    if machine_idx.is_some() {
        work.sort_by(|a, b| cmp_machine(&a.machine_key, &b.machine_key).then(a.timestamp.cmp(&b.timestamp)));
    } else {
        work.sort_by_key(|w| w.timestamp);
    }

    let present: Vec<SensorColumn> = SensorColumn::ALL
        .into_iter()
        .filter(|c| sources[c.index()].is_some())
        .collect();

    let rows = forward_fill(work, &present, machine_idx.is_some());

    let invalid = rows
        .iter()
        .filter(|r| r.data_quality == DataQuality::Invalid)
        .count();
    info!(
        "Cleaned {} sensor rows ({} invalid after carry-forward)",
        rows.len(),
        invalid
    );

    Ok(CleanedSensors { columns, rows })
}

/// Machine ordering with missing ids last.
fn cmp_machine(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Carry the last known good value forward within each machine, in one pass
/// over rows already sorted by (machine key, timestamp). `"17"`, `"17.0"` and
/// `"Machine_17"` are the same machine. Rows without a machine id
/// are not filled when the dataset is grouped by machine.
fn forward_fill(work: Vec<WorkRow>, present: &[SensorColumn], grouped: bool) -> Vec<CleanedSensorRow> {
    // ---
    let mut out = Vec::with_capacity(work.len());
    let mut last: [Option<f64>; 4] = [None; 4];
    let mut group: Option<String> = None;

    for mut row in work {
        if grouped {
            if row.machine_key.is_none() || row.machine_key != group {
                last = [None; 4];
            }
            group = row.machine_key.clone();
        }

        let fillable = !grouped || row.machine_key.is_some();
        for col in present {
            let i = col.index();
            match row.values[i] {
                Some(v) => last[i] = Some(v),
                None if fillable => row.values[i] = last[i],
                None => {}
            }
        }

        let still_missing = present.iter().any(|c| row.values[c.index()].is_none());
        let data_quality = if still_missing {
            DataQuality::Invalid
        } else if row.flagged {
            DataQuality::Estimated
        } else {
            DataQuality::Good
        };

        out.push(CleanedSensorRow {
            timestamp: row.timestamp,
            machine_id: row.machine_id,
            values: row.values,
            data_quality,
        });
    }

    out
}
