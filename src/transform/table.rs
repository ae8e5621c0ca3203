//! Untyped tabular dataset as read from a CSV source, plus the column
//! normalization and alias lookup helpers every stage relies on.

use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::Result;

static NON_WORD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

// ---

/// Canonicalize a source column name: `" Machine ID "` -> `"machine_id"`.
pub fn normalize_column_name(name: &str) -> String {
    // ---
    let lowered = name.trim().to_lowercase();
    let replaced = NON_WORD_RUN.replace_all(&lowered, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Header plus rows of text cells. An empty cell means "missing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    // ---
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    // ---
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Parse CSV text with a header row. Short rows are padded with empty cells.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        // ---
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rename every column through [`normalize_column_name`]. Rows are untouched.
    pub fn normalize_columns(mut self) -> Self {
        // ---
        self.columns = self.columns.iter().map(|c| normalize_column_name(c)).collect();
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First alias (in the given order) that names an existing column.
    pub fn resolve_column<S: AsRef<str>>(&self, aliases: &[S]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column_index(alias.as_ref()))
    }

    /// First column whose name contains `needle`.
    pub fn find_column_containing(&self, needle: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.contains(needle))
    }

    /// Cell text at (row, col); out-of-range columns read as missing.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}

/// True when a cell holds no usable value.
pub fn is_missing(cell: &str) -> bool {
    let t = cell.trim();
    t.is_empty() || t.eq_ignore_ascii_case("nan") || t.eq_ignore_ascii_case("null")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_normalize_column_name() {
        // ---
        assert_eq!(normalize_column_name("Machine ID"), "machine_id");
        assert_eq!(normalize_column_name("  Temperature (C) "), "temperature_c");
        assert_eq!(normalize_column_name("__Power--kW__"), "power_kw");
        assert_eq!(normalize_column_name("already_ok"), "already_ok");
        assert_eq!(normalize_column_name("a  &  b"), "a_b");
        assert_eq!(normalize_column_name("%%%"), "");
    }

    #[test]
    fn test_normalize_columns_keeps_rows_and_order() {
        // ---
        let table = RawTable::from_csv_str("Time Stamp,Machine ID\n2024-01-01,7\n")
            .unwrap()
            .normalize_columns();

        assert_eq!(table.columns, vec!["time_stamp", "machine_id"]);
        assert_eq!(table.rows, vec![vec!["2024-01-01", "7"]]);
    }

    #[test]
    fn test_resolve_column_respects_alias_order() {
        // ---
        let table = RawTable::new(vec!["datetime".into(), "time".into()], vec![]);

        assert_eq!(table.resolve_column(&["timestamp", "time", "datetime"]), Some(1));
        assert_eq!(table.resolve_column(&["missing"]), None);
        assert_eq!(table.find_column_containing("time"), Some(0));
    }

    #[test]
    fn test_short_rows_are_padded() {
        // ---
        let table = RawTable::from_csv_str("a,b,c\n1,2\n").unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.cell(0, 2), "");
        assert!(is_missing(table.cell(0, 2)));
    }
}
