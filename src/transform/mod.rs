// src/transform/mod.rs

pub mod dedupe;
pub mod filter;
pub mod project;
pub mod schema;

pub use dedupe::dedupe;
pub use filter::{filter_rows, FilterCriteria};
pub use project::project;

use std::collections::BTreeMap;

/// One data row of an export, keyed by the header text of its period.
///
/// Lookups of absent columns yield `""`; nothing here ever fails on a missing
/// column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    /// Cell text for `column`, or the empty string when the period has no such column.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// A row in the fixed output layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord(Vec<String>);

impl OutputRecord {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    /// The header record: the schema's own column names.
    pub fn header<S: AsRef<str>>(schema: &[S]) -> Self {
        Self(schema.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Every record of a run, header first. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedTable {
    records: Vec<OutputRecord>,
    has_header: bool,
}

impl AccumulatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the header the first time it is called; later calls do nothing.
    pub fn ensure_header<S: AsRef<str>>(&mut self, schema: &[S]) {
        if self.has_header {
            return;
        }
        self.records.insert(0, OutputRecord::header(schema));
        self.has_header = true;
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = OutputRecord>) {
        self.records.extend(records);
    }

    /// All records including the header.
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    /// Number of records excluding the header.
    pub fn data_rows(&self) -> usize {
        self.records.len() - usize::from(self.has_header)
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// Row-major cell values, the shape spreadsheet APIs expect.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        self.records.iter().map(|r| r.fields().to_vec()).collect()
    }
}

/// Counts for one period's pass through filter, dedupe and projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub fetched: usize,
    pub matched: usize,
    pub emitted: usize,
}

/// Filter → dedupe → project over one period's rows.
pub fn transform_period<S: AsRef<str>>(
    rows: Vec<RawRow>,
    criteria: &FilterCriteria,
    key_column: &str,
    schema: &[S],
) -> (Vec<OutputRecord>, PassStats) {
    let fetched = rows.len();
    let matched = filter_rows(rows, criteria);
    let matched_count = matched.len();
    let records: Vec<OutputRecord> = dedupe(matched, key_column)
        .iter()
        .map(|row| project(row, schema))
        .collect();
    let stats = PassStats {
        fetched,
        matched: matched_count,
        emitted: records.len(),
    };
    (records, stats)
}

#[cfg(test)]
mod tests {
    use super::schema::{CONTRACT_NUMBER, CUSTOMER_NAME, CUSTOMER_UNIT, DISPATCH_NUMBER, SERVICE_TYPE};
    use super::*;

    fn call(id: &str, customer: &str, service: &str) -> RawRow {
        [
            (DISPATCH_NUMBER, id),
            (CUSTOMER_NAME, customer),
            (SERVICE_TYPE, service),
            (CUSTOMER_UNIT, "Unit 7"),
            (CONTRACT_NUMBER, "C-001"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_column_reads_empty() {
        let row: RawRow = [("a", "1")].into_iter().collect();
        assert_eq!(row.get("a"), "1");
        assert_eq!(row.get("b"), "");
        assert!(!row.contains("b"));
    }

    #[test]
    fn test_header_added_once() {
        let mut table = AccumulatedTable::new();
        table.ensure_header(&["x", "y"]);
        table.extend(vec![OutputRecord::new(vec!["1".into(), "2".into()])]);
        table.ensure_header(&["x", "y"]);
        table.extend(vec![OutputRecord::new(vec!["3".into(), "4".into()])]);

        assert_eq!(table.records().len(), 3);
        assert_eq!(table.data_rows(), 2);
        assert_eq!(table.records()[0].fields(), &["x", "y"]);
        assert_eq!(
            table.to_values(),
            vec![
                vec!["x".to_string(), "y".to_string()],
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_table_has_no_data_rows() {
        let mut table = AccumulatedTable::new();
        assert_eq!(table.data_rows(), 0);
        table.ensure_header(&schema::OUTPUT_SCHEMA);
        assert_eq!(table.data_rows(), 0);
        assert_eq!(table.records().len(), 1);
    }

    #[test]
    fn test_transform_period_counts() {
        let criteria = FilterCriteria::new("X", "T2");
        let rows = vec![
            call("A", "X", "T1"),
            call("A", "X", "T1"),
            call("B", "X", "T2"),
            call("C", "Y", "T1"),
            call("D", "X", "T1"),
        ];
        let (records, stats) =
            transform_period(rows, &criteria, DISPATCH_NUMBER, &schema::OUTPUT_SCHEMA);

        assert_eq!(
            stats,
            PassStats {
                fetched: 5,
                matched: 3,
                emitted: 2
            }
        );
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == schema::OUTPUT_SCHEMA.len()));
        assert_eq!(records[0].fields()[0], "C-001");
    }
}
