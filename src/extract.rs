//! Extract stage: read the sensor and quality CSV sources.
//!
//! A missing or unreadable source is not fatal here. It is logged and yields
//! an empty table, and the pipeline decides whether empty data is acceptable.

use std::fs::{self, File};
use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, error, info, warn};

use crate::error::{EtlError, ValidationError};
use crate::transform::{filter_completed, parse_timestamp, QualityAliases, RawTable};
use crate::Result;

// ---

/// Text encodings tried, in order, when decoding the quality source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

impl SourceEncoding {
    // ---
    pub const FALLBACK_ORDER: [SourceEncoding; 2] = [SourceEncoding::Utf8, SourceEncoding::Latin1];

    pub fn name(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "UTF-8",
            SourceEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode raw bytes, `None` if they are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        // ---
        match self {
            SourceEncoding::Utf8 => std::str::from_utf8(bytes)
                .ok()
                .map(|s| s.strip_prefix('\u{feff}').unwrap_or(s).to_string()),
            // Every byte is a valid ISO-8859-1 code point.
            SourceEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Read the sensor CSV and keep the trailing `retention_days` of data.
///
/// The window is measured back from the newest timestamp in the file, not from
/// the wall clock. Rows with unparseable timestamps are dropped. A source
/// without a `timestamp` column is a validation error.
pub fn extract_sensor_data(path: &Path, retention_days: u32) -> Result<RawTable> {
    // ---
    if !path.exists() {
        error!("Sensor file not found: {}", path.display());
        return Ok(RawTable::default());
    }

    let table = match File::open(path)
        .map_err(EtlError::from)
        .and_then(RawTable::from_csv_reader)
    {
        Ok(table) => table.normalize_columns(),
        Err(e) => {
            error!("Failed reading sensor CSV '{}': {}", path.display(), e);
            return Ok(RawTable::default());
        }
    };

    let ts_idx = table
        .column_index("timestamp")
        .ok_or(ValidationError::MissingColumn {
            dataset: "sensor",
            column: "timestamp",
        })?;

    let read = table.len();
    let filtered = apply_retention(table, ts_idx, retention_days);
    info!(
        "Extracted {} sensor rows from {} ({} read, {}-day retention)",
        filtered.len(),
        path.display(),
        read,
        retention_days
    );
    Ok(filtered)
}

/// Drop unparseable timestamps, then everything older than `max - days`.
fn apply_retention(table: RawTable, ts_idx: usize, retention_days: u32) -> RawTable {
    // ---
    let RawTable { columns, rows } = table;

    let parsed: Vec<(NaiveDateTime, Vec<String>)> = rows
        .into_iter()
        .filter_map(|row| {
            let ts = parse_timestamp(row.get(ts_idx).map(String::as_str).unwrap_or(""))?;
            Some((ts, row))
        })
        .collect();

    let Some(max_ts) = parsed.iter().map(|(ts, _)| *ts).max() else {
        return RawTable::new(columns, Vec::new());
    };
    // A window reaching past the calendar's start keeps everything.
    let cutoff = max_ts.checked_sub_signed(TimeDelta::days(i64::from(retention_days)));
    debug!("Sensor retention cutoff: {:?}", cutoff);

    let rows = parsed
        .into_iter()
        .filter(|(ts, _)| cutoff.map_or(true, |c| *ts >= c))
        .map(|(_, row)| row)
        .collect();
    RawTable::new(columns, rows)
}

/// Read the quality CSV, trying each [`SourceEncoding`] in order, and keep
/// only completed inspections.
pub fn extract_quality_data(path: &Path, aliases: &QualityAliases) -> RawTable {
    // ---
    if !path.exists() {
        error!("Quality file not found: {}", path.display());
        return RawTable::default();
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed reading quality file '{}': {}", path.display(), e);
            return RawTable::default();
        }
    };

    for encoding in SourceEncoding::FALLBACK_ORDER {
        let Some(text) = encoding.decode(&bytes) else {
            warn!(
                "Quality file '{}' is not valid {}, trying next encoding",
                path.display(),
                encoding.name()
            );
            continue;
        };

        return match RawTable::from_csv_str(&text) {
            Ok(table) => {
                let read = table.len();
                let table = filter_completed(table.normalize_columns(), aliases);
                info!(
                    "Extracted {} quality rows from {} ({} read, {})",
                    table.len(),
                    path.display(),
                    read,
                    encoding.name()
                );
                table
            }
            Err(e) => {
                error!("Failed parsing quality CSV '{}': {}", path.display(), e);
                RawTable::default()
            }
        };
    }

    let tried: Vec<&str> = SourceEncoding::FALLBACK_ORDER.iter().map(|e| e.name()).collect();
    error!(
        "Could not decode quality CSV '{}' with any of {:?}",
        path.display(),
        tried
    );
    RawTable::default()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_missing_sensor_file_yields_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let table = extract_sensor_data(&dir.path().join("nope.csv"), 7).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_sensor_without_timestamp_is_rejected() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "s.csv", b"machine_id,temperature\n1,20\n");
        assert!(extract_sensor_data(&path, 7).is_err());
    }

    #[test]
    fn test_retention_is_relative_to_dataset_max() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "s.csv",
            b"Timestamp,Machine ID,Temperature\n\
              2020-01-01 00:00:00,1,20\n\
              2020-01-03 00:00:00,1,21\n\
              2020-01-10 00:00:00,1,22\n\
              not-a-date,1,23\n",
        );

        let table = extract_sensor_data(&path, 7).unwrap();
        assert_eq!(table.columns, vec!["timestamp", "machine_id", "temperature"]);
        // Cutoff is 2020-01-03 inclusive.
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][2], "21");
    }

    #[test]
    fn test_retention_past_calendar_start_keeps_everything() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "s.csv",
            b"timestamp,machine_id,temperature\n\
              1990-01-01 00:00:00,1,20\n\
              2020-01-10 00:00:00,1,22\n",
        );

        for days in [100_000_000, u32::MAX] {
            let table = extract_sensor_data(&path, days).unwrap();
            assert_eq!(table.len(), 2);
        }
    }

    #[test]
    fn test_missing_quality_file_yields_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let table = extract_quality_data(&dir.path().join("nope.csv"), &QualityAliases::default());
        assert!(table.is_empty());
    }

    #[test]
    fn test_quality_latin1_fallback() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        // "Inspección" with 0xF3, invalid as UTF-8.
        let mut bytes = b"Timestamp,Inspector,Status\n2024-01-01 00:00:00,Inspecci".to_vec();
        bytes.push(0xF3);
        bytes.extend_from_slice(b"n,done\n2024-01-01 00:01:00,x,pending\n");
        let path = write_file(&dir, "q.csv", &bytes);

        let table = extract_quality_data(&path, &QualityAliases::default());
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0][1], "Inspección");
    }

    #[test]
    fn test_decode_order() {
        // ---
        assert_eq!(SourceEncoding::Utf8.decode(&[0xFF]), None);
        assert_eq!(SourceEncoding::Latin1.decode(&[0xE9]).as_deref(), Some("é"));
        assert_eq!(
            SourceEncoding::Utf8.decode("\u{feff}a,b".as_bytes()).as_deref(),
            Some("a,b")
        );
    }
}
