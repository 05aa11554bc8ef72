use super::{OutputRecord, RawRow};

/// Lays `row` out in `schema` order; absent columns become `""`.
pub fn project<S: AsRef<str>>(row: &RawRow, schema: &[S]) -> OutputRecord {
    OutputRecord::new(
        schema
            .iter()
            .map(|field| row.get(field.as_ref()).to_string())
            .collect(),
    )
}
