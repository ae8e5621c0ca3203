//! Left join of sensor readings with quality checks.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::info;

use crate::models::{JoinedReading, QualityCheck, QualityStatus, SensorReading};

type JoinKey<'a> = (NaiveDateTime, &'a str, &'a str);

// ---

/// Join every sensor reading to its inspections on (timestamp, line, machine).
///
/// Readings without a match appear once with `NotChecked`; a reading matching
/// several inspections appears once per inspection. Readings with a missing
/// line or machine id never match.
pub fn join_sensor_quality(sensors: &[SensorReading], checks: &[QualityCheck]) -> Vec<JoinedReading> {
    // ---
    let mut index: HashMap<JoinKey<'_>, Vec<&QualityCheck>> = HashMap::new();
    for check in checks {
        index
            .entry((check.timestamp, check.line_id.as_str(), check.machine_id.as_str()))
            .or_default()
            .push(check);
    }

    let mut joined = Vec::with_capacity(sensors.len());
    let mut matched = 0usize;

    for reading in sensors {
        let matches = match (reading.line_id.as_deref(), reading.machine_id.as_deref()) {
            (Some(line), Some(machine)) => index.get(&(reading.timestamp, line, machine)),
            _ => None,
        };

        match matches {
            Some(found) => {
                matched += 1;
                for check in found {
                    joined.push(JoinedReading {
                        reading: reading.clone(),
                        result: Some(check.result),
                        defect_type: check.defect_type.clone(),
                        quality_status: QualityStatus::from(Some(check.result)),
                    });
                }
            }
            None => joined.push(JoinedReading {
                reading: reading.clone(),
                result: None,
                defect_type: None,
                quality_status: QualityStatus::NotChecked,
            }),
        }
    }

    info!(
        "Joined {} sensor readings ({} with inspections) into {} rows",
        sensors.len(),
        matched,
        joined.len()
    );
    joined
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{DataQuality, QualityResult};
    use crate::transform::identity::make_record_id;
    use crate::transform::timestamp::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn reading(at: &str, line: Option<&str>, machine: Option<&str>) -> SensorReading {
        SensorReading {
            record_id: make_record_id(ts(at), line, machine),
            timestamp: ts(at),
            line_id: line.map(String::from),
            machine_id: machine.map(String::from),
            temperature: Some(40.0),
            pressure: None,
            vibration: None,
            power: None,
            data_quality: DataQuality::Good,
        }
    }

    fn check(at: &str, line: &str, machine: &str, result: QualityResult) -> QualityCheck {
        QualityCheck {
            timestamp: ts(at),
            line_id: line.to_string(),
            machine_id: machine.to_string(),
            result,
            defect_type: (result == QualityResult::Fail).then(|| "fault".to_string()),
        }
    }

    #[test]
    fn test_statuses() {
        // ---
        let sensors = vec![
            reading("2024-01-01 08:00:00", Some("Line_1"), Some("machine_1")),
            reading("2024-01-01 08:00:00", Some("Line_1"), Some("machine_2")),
            reading("2024-01-01 08:00:00", Some("Line_1"), Some("machine_3")),
        ];
        let checks = vec![
            check("2024-01-01 08:00:00", "Line_1", "machine_1", QualityResult::Pass),
            check("2024-01-01 08:00:00", "Line_1", "machine_2", QualityResult::Fail),
        ];

        let joined = join_sensor_quality(&sensors, &checks);
        let statuses: Vec<_> = joined.iter().map(|j| j.quality_status).collect();

        assert_eq!(
            statuses,
            vec![
                QualityStatus::Passed,
                QualityStatus::Failed,
                QualityStatus::NotChecked
            ]
        );
        assert_eq!(joined[1].defect_type.as_deref(), Some("fault"));
        assert_eq!(joined[2].result, None);
    }

    #[test]
    fn test_all_key_parts_must_match() {
        // ---
        let sensors = vec![reading("2024-01-01 08:00:00", Some("Line_1"), Some("machine_1"))];
        let checks = vec![
            check("2024-01-01 08:00:01", "Line_1", "machine_1", QualityResult::Pass),
            check("2024-01-01 08:00:00", "Line_2", "machine_1", QualityResult::Pass),
            check("2024-01-01 08:00:00", "Line_1", "machine_9", QualityResult::Pass),
        ];

        let joined = join_sensor_quality(&sensors, &checks);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].quality_status, QualityStatus::NotChecked);
    }

    #[test]
    fn test_every_sensor_row_is_preserved() {
        // ---
        let sensors = vec![
            reading("2024-01-01 08:00:00", None, None),
            reading("2024-01-01 09:00:00", Some("Line_1"), Some("machine_1")),
        ];
        let joined = join_sensor_quality(&sensors, &[]);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].reading, sensors[0]);
    }

    #[test]
    fn test_multiple_matches_fan_out() {
        // ---
        let sensors = vec![reading("2024-01-01 08:00:00", Some("Line_1"), Some("machine_1"))];
        let checks = vec![
            check("2024-01-01 08:00:00", "Line_1", "machine_1", QualityResult::Pass),
            check("2024-01-01 08:00:00", "Line_1", "machine_1", QualityResult::Fail),
        ];

        let joined = join_sensor_quality(&sensors, &checks);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].result, Some(QualityResult::Pass));
        assert_eq!(joined[1].result, Some(QualityResult::Fail));
    }
}
