use super::RawRow;

/// Drops a row when its `key_column` value equals that of the last row kept.
///
/// Only neighbours are compared: the export is sorted by dispatch number, so
/// a repeated key separated by a different one survives both times.
pub fn dedupe(rows: impl IntoIterator<Item = RawRow>, key_column: &str) -> Vec<RawRow> {
    let mut last_key: Option<String> = None;
    let mut out = Vec::new();
    for row in rows {
        let key = row.get(key_column);
        if last_key.as_deref() == Some(key) {
            continue;
        }
        last_key = Some(key.to_string());
        out.push(row);
    }
    out
}
