use serde::Deserialize;

use super::schema::{CUSTOMER_NAME, REQUIRED_COLUMNS, SERVICE_TYPE};
use super::RawRow;

/// Inclusion rules applied to every period of a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterCriteria {
    /// Compared exactly: case-sensitive, untrimmed.
    pub customer_name: String,
    #[serde(default = "default_required_columns")]
    pub required_non_empty: Vec<String>,
    pub excluded_service_type: String,
}

fn default_required_columns() -> Vec<String> {
    REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
}

impl FilterCriteria {
    pub fn new(customer_name: impl Into<String>, excluded_service_type: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            required_non_empty: default_required_columns(),
            excluded_service_type: excluded_service_type.into(),
        }
    }

    pub fn with_required(mut self, columns: &[&str]) -> Self {
        self.required_non_empty = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn matches(&self, row: &RawRow) -> bool {
        row.get(CUSTOMER_NAME) == self.customer_name
            && self
                .required_non_empty
                .iter()
                .all(|col| !row.get(col).trim().is_empty())
            && row.get(SERVICE_TYPE) != self.excluded_service_type
    }
}

/// Keeps the rows that satisfy `criteria`, in their original order.
pub fn filter_rows(rows: impl IntoIterator<Item = RawRow>, criteria: &FilterCriteria) -> Vec<RawRow> {
    rows.into_iter().filter(|row| criteria.matches(row)).collect()
}
