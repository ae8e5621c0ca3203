//! Idempotent load of the transformed datasets.
//!
//! - `sensor_readings`: insert-if-absent on `record_id`
//! - `quality_checks`: insert-if-absent on the full check tuple
//! - `hourly_summary`: upsert on (hour, line_id, machine_id)
//!
//! Rows are written in fixed-size chunks, one transaction per chunk. Key
//! comparisons use `IS` so rows with NULL key parts (a passing check has no
//! `defect_type`) still dedupe; SQLite unique indexes treat NULLs as distinct.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::models::{HourlySummary, QualityCheck, SensorReading};
use crate::Result;

pub const DEFAULT_CHUNK_SIZE: usize = 5000;

const SENSOR_TABLE: &str = "sensor_readings";
const QUALITY_TABLE: &str = "quality_checks";
const HOURLY_TABLE: &str = "hourly_summary";

// ---

/// Outcome of an upsert: rows newly inserted vs. rows overwritten in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

impl UpsertCounts {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Row counts of the three destination tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub sensor_readings: i64,
    pub quality_checks: i64,
    pub hourly_summary: i64,
}

async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    // ---
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn table_counts(pool: &SqlitePool) -> Result<TableCounts> {
    // ---
    Ok(TableCounts {
        sensor_readings: count_rows(pool, SENSOR_TABLE).await?,
        quality_checks: count_rows(pool, QUALITY_TABLE).await?,
        hourly_summary: count_rows(pool, HOURLY_TABLE).await?,
    })
}

/// Insert sensor readings, skipping any `record_id` already stored.
///
/// Returns the number of rows actually added.
pub async fn load_sensor_readings(
    pool: &SqlitePool,
    rows: &[SensorReading],
    chunk_size: usize,
) -> Result<u64> {
    // ---
    let before = count_rows(pool, SENSOR_TABLE).await?;

    for (i, chunk) in rows.chunks(chunk_size.max(1)).enumerate() {
        let mut tx = pool.begin().await?;
        for r in chunk {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO sensor_readings (
                    record_id, timestamp, line_id, machine_id,
                    temperature, pressure, vibration, power, data_quality
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&r.record_id)
            .bind(r.timestamp)
            .bind(&r.line_id)
            .bind(&r.machine_id)
            .bind(r.temperature)
            .bind(r.pressure)
            .bind(r.vibration)
            .bind(r.power)
            .bind(r.data_quality.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!("sensor_readings chunk {} committed ({} rows)", i + 1, chunk.len());
    }

    let after = count_rows(pool, SENSOR_TABLE).await?;
    let added = (after - before).max(0) as u64;
    info!("Loaded {} new sensor_readings ({} offered)", added, rows.len());
    Ok(added)
}

/// Insert quality checks, skipping any identical check already stored.
///
/// Returns the number of rows actually added.
pub async fn load_quality_checks(
    pool: &SqlitePool,
    rows: &[QualityCheck],
    chunk_size: usize,
) -> Result<u64> {
    // ---
    let before = count_rows(pool, QUALITY_TABLE).await?;

    for (i, chunk) in rows.chunks(chunk_size.max(1)).enumerate() {
        let mut tx = pool.begin().await?;
        for c in chunk {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO quality_checks (
                    timestamp, line_id, machine_id, result, defect_type
                )
                SELECT ?1, ?2, ?3, ?4, ?5
                WHERE NOT EXISTS (
                    SELECT 1 FROM quality_checks
                    WHERE timestamp = ?1
                      AND line_id = ?2
                      AND machine_id = ?3
                      AND result = ?4
                      AND defect_type IS ?5
                )
                "#,
            )
            .bind(c.timestamp)
            .bind(&c.line_id)
            .bind(&c.machine_id)
            .bind(c.result.as_str())
            .bind(&c.defect_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!("quality_checks chunk {} committed ({} rows)", i + 1, chunk.len());
    }

    let after = count_rows(pool, QUALITY_TABLE).await?;
    let added = (after - before).max(0) as u64;
    info!("Loaded {} new quality_checks ({} offered)", added, rows.len());
    Ok(added)
}

/// Upsert hourly summaries on (hour, line_id, machine_id).
///
/// An existing row for the key is overwritten with the freshly computed
/// aggregates; otherwise a new row is inserted.
pub async fn load_hourly_summary(
    pool: &SqlitePool,
    rows: &[HourlySummary],
    chunk_size: usize,
) -> Result<UpsertCounts> {
    // ---
    let mut counts = UpsertCounts::default();

    for (i, chunk) in rows.chunks(chunk_size.max(1)).enumerate() {
        let mut tx = pool.begin().await?;
        for s in chunk {
            let updated = sqlx::query(
                r#"
                UPDATE hourly_summary SET
                    avg_temperature = ?4,
                    min_temperature = ?5,
                    max_temperature = ?6,
                    avg_pressure    = ?7,
                    avg_vibration   = ?8,
                    total_checks    = ?9,
                    defect_count    = ?10,
                    defect_rate     = ?11
                WHERE hour = ?1 AND line_id IS ?2 AND machine_id IS ?3
                "#,
            )
            .bind(s.hour)
            .bind(&s.line_id)
            .bind(&s.machine_id)
            .bind(s.avg_temperature)
            .bind(s.min_temperature)
            .bind(s.max_temperature)
            .bind(s.avg_pressure)
            .bind(s.avg_vibration)
            .bind(s.total_checks)
            .bind(s.defect_count)
            .bind(s.defect_rate)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated > 0 {
                counts.updated += 1;
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO hourly_summary (
                    hour, line_id, machine_id,
                    avg_temperature, min_temperature, max_temperature,
                    avg_pressure, avg_vibration,
                    total_checks, defect_count, defect_rate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(s.hour)
            .bind(&s.line_id)
            .bind(&s.machine_id)
            .bind(s.avg_temperature)
            .bind(s.min_temperature)
            .bind(s.max_temperature)
            .bind(s.avg_pressure)
            .bind(s.avg_vibration)
            .bind(s.total_checks)
            .bind(s.defect_count)
            .bind(s.defect_rate)
            .execute(&mut *tx)
            .await?;
            counts.inserted += 1;
        }
        tx.commit().await?;
        debug!("hourly_summary chunk {} committed ({} rows)", i + 1, chunk.len());
    }

    info!(
        "Upserted hourly_summary: {} inserted, {} updated",
        counts.inserted, counts.updated
    );
    Ok(counts)
}
