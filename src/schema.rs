//! Database bootstrap for `codemetal-lineflow`.
//!
//! Opens the SQLite store and ensures the three ETL tables and their unique
//! indexes exist. Called once per run from the pipeline (EMBP: single
//! gateway call).

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::Result;

// ---

/// Open (creating if needed) the SQLite database at `path`.
///
/// The run is single-writer, so the pool holds one connection.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    // ---
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create the schema if it does not exist (idempotent).
///
/// `sensor_readings` is keyed by the content-derived `record_id`;
/// `quality_checks` and `hourly_summary` carry surrogate ids plus unique
/// indexes on their natural keys.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            record_id    TEXT PRIMARY KEY,
            timestamp    DATETIME NOT NULL,
            line_id      TEXT,
            machine_id   TEXT,
            temperature  REAL,
            pressure     REAL,
            vibration    REAL,
            power        REAL,
            data_quality TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quality_checks (
            check_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp   DATETIME NOT NULL,
            line_id     TEXT NOT NULL,
            machine_id  TEXT NOT NULL,
            result      TEXT NOT NULL CHECK (result IN ('pass', 'fail')),
            defect_type TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_summary (
            summary_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            hour            DATETIME NOT NULL,
            line_id         TEXT,
            machine_id      TEXT,
            avg_temperature REAL,
            min_temperature REAL,
            max_temperature REAL,
            avg_pressure    REAL,
            avg_vibration   REAL,
            total_checks    INTEGER NOT NULL,
            defect_count    INTEGER NOT NULL,
            defect_rate     REAL NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Natural-key uniqueness; reruns skip or replace instead of duplicating
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_quality
            ON quality_checks (timestamp, line_id, machine_id, result, defect_type);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_hourly
            ON hourly_summary (hour, line_id, machine_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Lookup indexes for reporting queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_machine_ts
            ON sensor_readings (machine_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        // ---
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["hourly_summary", "quality_checks", "sensor_readings"]);
    }

    #[tokio::test]
    async fn test_connect_creates_database_file() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("production.db");

        let pool = connect(&path).await.unwrap();
        create_schema(&pool).await.unwrap();
        pool.close().await;

        assert!(path.exists());
    }
}
