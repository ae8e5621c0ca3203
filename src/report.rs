//! Read-only reporting queries over a loaded database, rendered as Markdown.

use std::fmt::Write as _;
use std::path::Path;

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, SqlitePool, TypeInfo, ValueRef};
use tracing::info;

use crate::Result;

pub const DEFAULT_REPORT_PATH: &str = "outputs/query_results.md";

/// A titled SELECT statement.
#[derive(Debug, Clone, Copy)]
pub struct ReportQuery {
    pub title: &'static str,
    pub sql: &'static str,
}

pub const QUERIES: &[ReportQuery] = &[
    ReportQuery {
        title: "Total records loaded (sensor_readings)",
        sql: "SELECT COUNT(*) AS cnt FROM sensor_readings;",
    },
    ReportQuery {
        title: "Latest hourly summary for Line_1",
        sql: r#"
        SELECT * FROM hourly_summary
        WHERE line_id = 'Line_1'
        ORDER BY hour DESC
        LIMIT 10;
        "#,
    },
    ReportQuery {
        title: "High defect rate hours (> 5%)",
        sql: r#"
        SELECT hour, line_id, machine_id, defect_rate
        FROM hourly_summary
        WHERE defect_rate > 5.0
        ORDER BY defect_rate DESC
        LIMIT 20;
        "#,
    },
    ReportQuery {
        title: "Data quality distribution",
        sql: r#"
        SELECT data_quality, COUNT(*) AS count
        FROM sensor_readings
        GROUP BY data_quality;
        "#,
    },
    ReportQuery {
        title: "Join sensor data with quality checks (sample)",
        sql: r#"
        SELECT
          s.timestamp,
          s.machine_id,
          s.temperature,
          q.result AS quality_result
        FROM sensor_readings s
        LEFT JOIN quality_checks q
          ON s.machine_id = q.machine_id
         AND s.timestamp = q.timestamp
        LIMIT 10;
        "#,
    },
    ReportQuery {
        title: "Average temperature by machine",
        sql: r#"
        SELECT machine_id,
               AVG(temperature) AS avg_temp,
               MIN(temperature) AS min_temp,
               MAX(temperature) AS max_temp
        FROM sensor_readings
        GROUP BY machine_id
        ORDER BY machine_id;
        "#,
    },
];

// ---

/// Render one cell by the storage class of the value it holds.
///
/// REAL values keep their decimal point (`25.0`, not `25`).
fn cell_text(row: &SqliteRow, idx: usize) -> String {
    // ---
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return String::new(),
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return String::new(),
    };

    match storage.as_str() {
        "REAL" => row
            .try_get::<f64, _>(idx)
            .map(|v| format!("{v:?}"))
            .unwrap_or_default(),
        "INTEGER" => row
            .try_get::<i64, _>(idx)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        "BLOB" => "<blob>".to_string(),
        _ => row.try_get::<String, _>(idx).unwrap_or_default(),
    }
}

/// Markdown table for a result set; `columns` comes from the statement.
pub fn format_rows(columns: &[String], rows: &[SqliteRow]) -> String {
    // ---
    if columns.is_empty() {
        return "_(no columns)_\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "| {} |", columns.join(" | "));
    let _ = writeln!(out, "| {} |", vec!["---"; columns.len()].join(" | "));
    for row in rows {
        let cells: Vec<String> = (0..columns.len()).map(|i| cell_text(row, i)).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

async fn column_names(pool: &SqlitePool, sql: &str, rows: &[SqliteRow]) -> Result<Vec<String>> {
    // ---
    if let Some(first) = rows.first() {
        return Ok(first.columns().iter().map(|c| c.name().to_string()).collect());
    }
    // No rows to read names from; ask the prepared statement instead.
    let described = pool.describe(sql).await?;
    Ok(described.columns().iter().map(|c| c.name().to_string()).collect())
}

/// Run every report query and assemble the Markdown document.
pub async fn render_report(pool: &SqlitePool, db_label: &str) -> Result<String> {
    // ---
    let mut parts = vec![format!("# Query Results\n\nDatabase: `{db_label}`\n")];

    for query in QUERIES {
        let rows = sqlx::query(query.sql).fetch_all(pool).await?;
        let columns = column_names(pool, query.sql, &rows).await?;

        parts.push(format!("## {}\n", query.title));
        parts.push(format!("```sql\n{}\n```\n", query.sql.trim()));
        parts.push(format_rows(&columns, &rows));
        parts.push("\n".to_string());
    }

    Ok(parts.join("\n"))
}

/// Report on the database at `db_path` and write it to `out_path`.
///
/// The database must already exist; reporting never creates one.
pub async fn write_report(db_path: &Path, out_path: &Path) -> Result<()> {
    // ---
    if !db_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("DB not found: {}. Run the ETL first.", db_path.display()),
        )
        .into());
    }

    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let markdown = render_report(&pool, &db_path.display().to_string()).await?;
    pool.close().await;

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, markdown)?;
    info!("Wrote query results to {}", out_path.display());
    Ok(())
}
