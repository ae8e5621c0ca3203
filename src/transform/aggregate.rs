//! Hourly aggregation of joined readings.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::info;

use super::timestamp::floor_to_hour;
use crate::models::{HourlySummary, JoinedReading, QualityResult};

type GroupKey = (NaiveDateTime, Option<String>, Option<String>);

#[derive(Default)]
struct Stat {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Stat {
    // ---
    fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        self.sum += v;
        self.count += 1;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct Group {
    temperature: Stat,
    pressure: Stat,
    vibration: Stat,
    total_checks: i64,
    defect_count: i64,
}

// ---

/// Percentage of failed checks; zero when nothing was checked.
pub fn defect_rate(defect_count: i64, total_checks: i64) -> f64 {
    if total_checks > 0 {
        defect_count as f64 / total_checks as f64 * 100.0
    } else {
        0.0
    }
}

/// Summarize joined rows per (hour, line, machine), ordered by that key.
///
/// Rows with a missing line or machine id form their own groups. Missing
/// sensor values are ignored; a group with no values for a channel gets
/// `None` for that channel's aggregates.
pub fn calculate_hourly_summary(joined: &[JoinedReading]) -> Vec<HourlySummary> {
    // ---
    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();

    for row in joined {
        let r = &row.reading;
        let key = (floor_to_hour(r.timestamp), r.line_id.clone(), r.machine_id.clone());
        let group = groups.entry(key).or_default();

        group.temperature.push(r.temperature);
        group.pressure.push(r.pressure);
        group.vibration.push(r.vibration);
        if let Some(result) = row.result {
            group.total_checks += 1;
            if result == QualityResult::Fail {
                group.defect_count += 1;
            }
        }
    }

    let summaries: Vec<HourlySummary> = groups
        .into_iter()
        .map(|((hour, line_id, machine_id), g)| HourlySummary {
            hour,
            line_id,
            machine_id,
            avg_temperature: g.temperature.mean(),
            min_temperature: g.temperature.min,
            max_temperature: g.temperature.max,
            avg_pressure: g.pressure.mean(),
            avg_vibration: g.vibration.mean(),
            total_checks: g.total_checks,
            defect_count: g.defect_count,
            defect_rate: defect_rate(g.defect_count, g.total_checks),
        })
        .collect();

    info!("Aggregated {} hourly summary rows", summaries.len());
    summaries
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{DataQuality, QualityStatus, SensorReading};
    use crate::transform::timestamp::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn row(at: &str, machine: Option<&str>, temp: Option<f64>, result: Option<QualityResult>) -> JoinedReading {
        // ---
        JoinedReading {
            reading: SensorReading {
                record_id: format!("{at}-{machine:?}"),
                timestamp: ts(at),
                line_id: machine.map(|_| "Line_1".to_string()),
                machine_id: machine.map(String::from),
                temperature: temp,
                pressure: Some(4.0),
                vibration: None,
                power: None,
                data_quality: DataQuality::Good,
            },
            result,
            defect_type: None,
            quality_status: QualityStatus::from(result),
        }
    }

    #[test]
    fn test_defect_rate() {
        // ---
        assert_eq!(defect_rate(0, 0), 0.0);
        assert_eq!(defect_rate(1, 4), 25.0);
        assert_eq!(defect_rate(3, 3), 100.0);
    }

    #[test]
    fn test_hourly_statistics() {
        // ---
        let rows = vec![
            row("2024-01-01 08:05:00", Some("machine_1"), Some(40.0), Some(QualityResult::Pass)),
            row("2024-01-01 08:20:00", Some("machine_1"), Some(60.0), Some(QualityResult::Fail)),
            row("2024-01-01 08:40:00", Some("machine_1"), None, Some(QualityResult::Pass)),
            row("2024-01-01 08:59:59", Some("machine_1"), Some(50.0), Some(QualityResult::Pass)),
            row("2024-01-01 09:00:00", Some("machine_1"), Some(70.0), None),
        ];

        let summary = calculate_hourly_summary(&rows);
        assert_eq!(summary.len(), 2);

        let first = &summary[0];
        assert_eq!(first.hour, ts("2024-01-01 08:00:00"));
        assert_eq!(first.avg_temperature, Some(50.0));
        assert_eq!(first.min_temperature, Some(40.0));
        assert_eq!(first.max_temperature, Some(60.0));
        assert_eq!(first.avg_pressure, Some(4.0));
        assert_eq!(first.avg_vibration, None);
        assert_eq!(first.total_checks, 4);
        assert_eq!(first.defect_count, 1);
        assert_eq!(first.defect_rate, 25.0);

        let second = &summary[1];
        assert_eq!(second.hour, ts("2024-01-01 09:00:00"));
        assert_eq!(second.total_checks, 0);
        assert_eq!(second.defect_rate, 0.0);
    }

    #[test]
    fn test_groups_split_by_machine_and_keep_null_keys() {
        // ---
        let rows = vec![
            row("2024-01-01 08:05:00", Some("machine_1"), Some(40.0), None),
            row("2024-01-01 08:10:00", Some("machine_2"), Some(45.0), None),
            row("2024-01-01 08:15:00", None, Some(30.0), None),
        ];

        let summary = calculate_hourly_summary(&rows);
        assert_eq!(summary.len(), 3);
        assert!(summary.iter().any(|s| s.machine_id.is_none() && s.line_id.is_none()));
    }

    #[test]
    fn test_all_missing_channel_yields_none() {
        // ---
        let rows = vec![row("2024-01-01 08:05:00", Some("machine_1"), None, None)];
        let summary = calculate_hourly_summary(&rows);
        assert_eq!(summary[0].avg_temperature, None);
        assert_eq!(summary[0].min_temperature, None);
        assert_eq!(summary[0].max_temperature, None);
    }
}
