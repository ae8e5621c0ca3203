//! Machine identity resolution and deterministic record ids.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::timestamp::to_iso;

/// Machines per production line.
pub const MACHINES_PER_LINE: i64 = 10;

const MACHINE_PREFIX: &str = "machine_";

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

// ---

/// Canonical machine key for a raw identifier.
///
/// `"17"` and `"17.0"` become `machine_17`, `"Machine_3"` passes through as
/// `machine_3`, any other non-blank text is kept lowercased as-is.
pub fn to_machine_key(raw: &str) -> Option<String> {
    // ---
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if s.starts_with(MACHINE_PREFIX) {
        return Some(s);
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(format!("{MACHINE_PREFIX}{}", n.trunc() as i64)),
        _ => Some(s),
    }
}

/// Line id for a machine id: machines 1-10 -> `Line_1`, 11-20 -> `Line_2`, ...
pub fn derive_line(machine_id: &str) -> Option<String> {
    // ---
    let digits = DIGIT_RUN.find(machine_id)?;
    let number: i64 = digits.as_str().parse().ok()?;
    let line = (number - 1).div_euclid(MACHINES_PER_LINE) + 1;
    Some(format!("Line_{line}"))
}

/// Content-derived id for a sensor reading.
///
/// SHA-256 over `"<iso timestamp>|<line>|<machine>"`, hex encoded. Missing
/// parts encode as empty strings.
pub fn make_record_id(
    timestamp: NaiveDateTime,
    line_id: Option<&str>,
    machine_id: Option<&str>,
) -> String {
    // ---
    let key = format!(
        "{}|{}|{}",
        to_iso(timestamp),
        line_id.unwrap_or_default(),
        machine_id.unwrap_or_default()
    );

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::transform::timestamp::parse_timestamp;

    #[test]
    fn test_machine_key_forms() {
        // ---
        assert_eq!(to_machine_key("17"), Some("machine_17".to_string()));
        assert_eq!(to_machine_key(" 17.9 "), Some("machine_17".to_string()));
        assert_eq!(to_machine_key("Machine_3"), Some("machine_3".to_string()));
        assert_eq!(to_machine_key("Press-A"), Some("press-a".to_string()));
        assert_eq!(to_machine_key("   "), None);
        assert_eq!(to_machine_key(""), None);
    }

    #[test]
    fn test_derive_line_for_machines_1_to_30() {
        // ---
        for n in 1..=30 {
            let expected = match n {
                1..=10 => "Line_1",
                11..=20 => "Line_2",
                _ => "Line_3",
            };
            assert_eq!(
                derive_line(&format!("machine_{n}")).as_deref(),
                Some(expected),
                "machine_{n}"
            );
        }
    }

    #[test]
    fn test_derive_line_without_digits() {
        // ---
        assert_eq!(derive_line("press-a"), None);
        assert_eq!(derive_line("m7x12").as_deref(), Some("Line_1"));
        assert_eq!(derive_line("machine_0").as_deref(), Some("Line_0"));
    }

    #[test]
    fn test_record_id_is_deterministic() {
        // ---
        let ts = parse_timestamp("2024-03-01 08:15:00").unwrap();
        let a = make_record_id(ts, Some("Line_2"), Some("machine_17"));
        let b = make_record_id(ts, Some("Line_2"), Some("machine_17"));

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_id_changes_with_each_field() {
        // ---
        let ts = parse_timestamp("2024-03-01 08:15:00").unwrap();
        let later = parse_timestamp("2024-03-01 08:15:01").unwrap();
        let base = make_record_id(ts, Some("Line_2"), Some("machine_17"));

        assert_ne!(base, make_record_id(later, Some("Line_2"), Some("machine_17")));
        assert_ne!(base, make_record_id(ts, Some("Line_1"), Some("machine_17")));
        assert_ne!(base, make_record_id(ts, Some("Line_2"), Some("machine_18")));
        assert_ne!(base, make_record_id(ts, None, Some("machine_17")));
    }
}
