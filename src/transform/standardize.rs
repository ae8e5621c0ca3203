//! Conform cleaned sensor rows to the `sensor_readings` shape.

use tracing::info;

use super::clean::{CleanedSensors, SensorColumn};
use super::identity::{derive_line, make_record_id, to_machine_key};
use crate::error::ValidationError;
use crate::models::{DataQuality, SensorReading};
use crate::Result;

// ---

/// Produce canonical [`SensorReading`]s from cleaned rows.
///
/// Requires `timestamp` and `machine_id` columns. Sensor channels the source
/// never had stay `None`; a dataset without a `data_quality` column is
/// labelled `good`.
pub fn standardize_sensor_data(cleaned: &CleanedSensors) -> Result<Vec<SensorReading>> {
    // ---
    for column in ["timestamp", "machine_id"] {
        if !cleaned.has_column(column) {
            return Err(ValidationError::MissingColumn {
                dataset: "sensor",
                column,
            }
            .into());
        }
    }
    let has_quality = cleaned.has_column("data_quality");

    let readings: Vec<SensorReading> = cleaned
        .rows
        .iter()
        .map(|row| {
            let machine_id = row.machine_id.as_deref().and_then(to_machine_key);
            let line_id = machine_id.as_deref().and_then(derive_line);
            let record_id = make_record_id(row.timestamp, line_id.as_deref(), machine_id.as_deref());

            SensorReading {
                record_id,
                timestamp: row.timestamp,
                line_id,
                machine_id,
                temperature: row.value(SensorColumn::Temperature),
                pressure: row.value(SensorColumn::Pressure),
                vibration: row.value(SensorColumn::Vibration),
                power: row.value(SensorColumn::Power),
                data_quality: if has_quality {
                    row.data_quality
                } else {
                    DataQuality::Good
                },
            }
        })
        .collect();

    info!("Standardized {} sensor readings", readings.len());
    Ok(readings)
}
