//! Reads a downloaded call export into header-keyed rows.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Timelike;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EtlError, EtlResult};
use crate::transform::RawRow;

/// Contents of the first worksheet of an export.
#[derive(Debug, Clone)]
pub struct ExportSheet {
    pub sheet_name: String,
    /// Header text per column, in sheet order, blanks removed.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn read_export(path: &Path) -> EtlResult<ExportSheet> {
    let shown = path.display().to_string();
    let mut workbook = open_workbook_auto(path).map_err(|e| EtlError::parse(&shown, e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| EtlError::parse(&shown, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| EtlError::parse(&shown, format!("reading sheet {}: {}", sheet_name, e)))?;

    // the range starts at the first used cell; the header must sit on row 0
    match range.start() {
        Some((0, _)) => {}
        _ => return Err(EtlError::parse(&shown, "header row not found")),
    }

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| EtlError::parse(&shown, "header row not found"))?;
    let columns = header_columns(header_row);
    if columns.is_empty() {
        return Err(EtlError::parse(&shown, "header row has no columns"));
    }

    let mut ordered: Vec<(usize, String)> = columns.iter().map(|(h, i)| (*i, h.clone())).collect();
    ordered.sort();
    let headers = ordered.into_iter().map(|(_, h)| h).collect();

    let rows = rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            columns
                .iter()
                .map(|(header, idx)| {
                    let text = cells.get(*idx).map(cell_text).unwrap_or_default();
                    (header.clone(), text)
                })
                .collect::<RawRow>()
        })
        .collect();

    Ok(ExportSheet {
        sheet_name,
        headers,
        rows,
    })
}

/// Header text → column index. A repeated header keeps its last column.
fn header_columns(header_row: &[Data]) -> BTreeMap<String, usize> {
    header_row
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let text = cell_text(cell);
            (!text.is_empty()).then_some((text, idx))
        })
        .collect()
}

/// Text of a cell the way the export displays it.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => String::from(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time().num_seconds_from_midnight() == 0 && !dt.is_duration() => {
                ts.format("%Y/%m/%d").to_string()
            }
            Some(ts) if !dt.is_duration() => ts.format("%Y/%m/%d %H:%M:%S").to_string(),
            _ => float_text(dt.as_f64()),
        },
        Data::Error(e) => e.to_string(),
    }
}

fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
