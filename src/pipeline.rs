//! End-to-end orchestration: Extract -> Clean -> Standardize -> Quality ->
//! Join -> Aggregate -> Load.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::error::EtlError;
use crate::extract::{extract_quality_data, extract_sensor_data};
use crate::load::{
    load_hourly_summary, load_quality_checks, load_sensor_readings, table_counts, TableCounts,
    UpsertCounts,
};
use crate::models::{
    DataQuality, HourlySummary, JoinedReading, QualityCheck, QualityResult, SensorReading,
};
use crate::schema;
use crate::transform::{
    calculate_hourly_summary, clean_sensor_data, join_sensor_quality, standardize_sensor_data,
    transform_quality_data, CleaningPolicy, QualityAliases, RawTable,
};
use crate::Result;

// ---

/// Everything the transform stage produces for one run.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub sensors: Vec<SensorReading>,
    pub quality: Vec<QualityCheck>,
    pub joined: Vec<JoinedReading>,
    pub hourly: Vec<HourlySummary>,
}

/// Row counts reported at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // ---
    pub sensor_extracted: usize,
    pub quality_extracted: usize,
    pub sensor_rows: usize,
    pub quality_rows: usize,
    pub hourly_rows: usize,
    pub inserted_sensor: u64,
    pub inserted_quality: u64,
    pub hourly: UpsertCounts,
    pub table_counts: TableCounts,
}

/// Run the transform stages over already-extracted tables.
///
/// Empty sensor data is fatal; empty quality data just means nothing is
/// inspected.
pub fn transform(
    sensor_raw: &RawTable,
    quality_raw: &RawTable,
    policy: &CleaningPolicy,
    aliases: &QualityAliases,
) -> Result<TransformOutput> {
    // ---
    if sensor_raw.is_empty() {
        return Err(EtlError::EmptySensorData);
    }

    let sensors = info_span!("clean_standardize").in_scope(|| {
        let cleaned = clean_sensor_data(sensor_raw, policy)?;
        standardize_sensor_data(&cleaned)
    })?;

    let quality = if quality_raw.is_empty() {
        info!("No quality rows extracted; every reading will be not_checked");
        Vec::new()
    } else {
        info_span!("quality").in_scope(|| transform_quality_data(quality_raw, &sensors, aliases))?
    };

    let joined = join_sensor_quality(&sensors, &quality);
    let hourly = calculate_hourly_summary(&joined);

    Ok(TransformOutput {
        sensors,
        quality,
        joined,
        hourly,
    })
}

/// Flat CSV shape of a [`JoinedReading`].
#[derive(Debug, Serialize)]
struct JoinedRow<'a> {
    timestamp: NaiveDateTime,
    line_id: Option<&'a str>,
    machine_id: Option<&'a str>,
    temperature: Option<f64>,
    pressure: Option<f64>,
    vibration: Option<f64>,
    power: Option<f64>,
    data_quality: DataQuality,
    result: Option<QualityResult>,
    defect_type: Option<&'a str>,
    quality_status: String,
}

impl<'a> From<&'a JoinedReading> for JoinedRow<'a> {
    fn from(j: &'a JoinedReading) -> Self {
        // ---
        let r = &j.reading;
        JoinedRow {
            timestamp: r.timestamp,
            line_id: r.line_id.as_deref(),
            machine_id: r.machine_id.as_deref(),
            temperature: r.temperature,
            pressure: r.pressure,
            vibration: r.vibration,
            power: r.power,
            data_quality: r.data_quality,
            result: j.result,
            defect_type: j.defect_type.as_deref(),
            quality_status: j.quality_status.to_string(),
        }
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    // ---
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the cleaned datasets as CSV for inspection.
pub fn write_outputs(dir: &Path, output: &TransformOutput) -> Result<()> {
    // ---
    fs::create_dir_all(dir)?;
    write_csv(&dir.join("sensor_readings_clean.csv"), &output.sensors)?;
    write_csv(&dir.join("quality_checks_clean.csv"), &output.quality)?;
    let joined: Vec<JoinedRow<'_>> = output.joined.iter().map(JoinedRow::from).collect();
    write_csv(&dir.join("sensor_quality_joined.csv"), &joined)?;
    write_csv(&dir.join("hourly_summary.csv"), &output.hourly)?;
    info!("Intermediate CSVs written to {}", dir.display());
    Ok(())
}

/// Execute a full run with the default cleaning policy and column aliases.
pub async fn run(config: &Config) -> Result<RunSummary> {
    run_with(config, &CleaningPolicy::default(), &QualityAliases::default()).await
}

pub async fn run_with(
    config: &Config,
    policy: &CleaningPolicy,
    aliases: &QualityAliases,
) -> Result<RunSummary> {
    // ---
    let (sensor_raw, quality_raw) = info_span!("extract").in_scope(|| -> Result<_> {
        let sensor_raw = extract_sensor_data(&config.sensor_csv, config.retention_days)?;
        let quality_raw = extract_quality_data(&config.quality_csv, aliases);
        Ok((sensor_raw, quality_raw))
    })?;
    info!("Sensor extracted rows:  {}", sensor_raw.len());
    info!("Quality extracted rows: {}", quality_raw.len());

    let output = transform(&sensor_raw, &quality_raw, policy, aliases)?;
    info!("Standardized sensor rows:  {}", output.sensors.len());
    info!("Standardized quality rows: {}", output.quality.len());
    info!("Hourly summary rows:       {}", output.hourly.len());

    if let Some(dir) = &config.output_dir {
        write_outputs(dir, &output)?;
    }

    let mut summary = RunSummary {
        sensor_extracted: sensor_raw.len(),
        quality_extracted: quality_raw.len(),
        sensor_rows: output.sensors.len(),
        quality_rows: output.quality.len(),
        hourly_rows: output.hourly.len(),
        ..RunSummary::default()
    };

    async {
        let pool = schema::connect(&config.db_path).await?;
        schema::create_schema(&pool).await?;

        summary.inserted_sensor =
            load_sensor_readings(&pool, &output.sensors, config.chunk_size).await?;
        summary.inserted_quality =
            load_quality_checks(&pool, &output.quality, config.chunk_size).await?;
        summary.hourly = load_hourly_summary(&pool, &output.hourly, config.chunk_size).await?;
        summary.table_counts = table_counts(&pool).await?;

        pool.close().await;
        Ok::<_, EtlError>(())
    }
    .instrument(info_span!("load", db = %config.db_path.display()))
    .await?;

    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &RunSummary) {
    // ---
    info!("Inserted sensor_readings (new): {}", summary.inserted_sensor);
    info!("Inserted quality_checks (new):  {}", summary.inserted_quality);
    info!(
        "Upserted hourly_summary:        {} inserted, {} updated",
        summary.hourly.inserted, summary.hourly.updated
    );
    info!("Database table counts:");
    info!("  - sensor_readings: {}", summary.table_counts.sensor_readings);
    info!("  - quality_checks:  {}", summary.table_counts.quality_checks);
    info!("  - hourly_summary:  {}", summary.table_counts.hourly_summary);
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{DataQuality, QualityStatus};

    #[test]
    fn test_empty_sensor_data_is_fatal() {
        // ---
        let err = transform(
            &RawTable::default(),
            &RawTable::default(),
            &CleaningPolicy::default(),
            &QualityAliases::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::EmptySensorData));
    }

    #[test]
    fn test_transform_without_quality_data() {
        // ---
        let sensors = RawTable::from_csv_str(
            "timestamp,machine_id,temperature\n\
             2024-01-01 08:00:00,17,1000\n\
             2024-01-01 08:30:00,17,60\n",
        )
        .unwrap();

        let out = transform(
            &sensors,
            &RawTable::default(),
            &CleaningPolicy::default(),
            &QualityAliases::default(),
        )
        .unwrap();

        assert_eq!(out.sensors.len(), 2);
        assert_eq!(out.sensors[0].data_quality, DataQuality::Invalid);
        assert_eq!(out.sensors[1].data_quality, DataQuality::Good);
        assert!(out
            .joined
            .iter()
            .all(|j| j.quality_status == QualityStatus::NotChecked));
        assert_eq!(out.hourly.len(), 1);
        assert_eq!(out.hourly[0].avg_temperature, Some(60.0));
        assert_eq!(out.hourly[0].defect_rate, 0.0);
    }

    #[test]
    fn test_write_outputs_creates_csvs() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let sensors = RawTable::from_csv_str(
            "timestamp,machine_id,temperature\n2024-01-01 08:00:00,3,55\n",
        )
        .unwrap();
        let out = transform(
            &sensors,
            &RawTable::default(),
            &CleaningPolicy::default(),
            &QualityAliases::default(),
        )
        .unwrap();

        write_outputs(dir.path(), &out).unwrap();

        let text = fs::read_to_string(dir.path().join("sensor_readings_clean.csv")).unwrap();
        assert!(text.starts_with("record_id,timestamp,line_id,machine_id"));
        assert!(text.contains("machine_3"));
        assert!(text.contains(",good"));
        assert!(dir.path().join("quality_checks_clean.csv").exists());
        assert!(dir.path().join("hourly_summary.csv").exists());

        let joined = fs::read_to_string(dir.path().join("sensor_quality_joined.csv")).unwrap();
        assert!(joined.lines().next().unwrap().ends_with(",quality_status"));
        assert!(joined.lines().nth(1).unwrap().ends_with(",not_checked"));
    }
}
