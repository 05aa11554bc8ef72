use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Deserialize;
use std::fmt;

use crate::error::{EtlError, EtlResult};

/// Natural boundary a period is aligned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    #[default]
    Year,
    Month,
}

/// One date range to export. `start` and `end` are both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRange {
    /// 0 is the most recent period.
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// `2024` for years, `2024-03` for months.
    pub label: String,
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} → {})", self.label, self.start, self.end)
    }
}

/// The day the newest range ends on: `today` minus `lag_days`.
pub fn anchor_date(today: NaiveDate, lag_days: u32) -> EtlResult<NaiveDate> {
    today
        .checked_sub_days(Days::new(u64::from(lag_days)))
        .ok_or_else(|| EtlError::config("download.lag_days", "moves the anchor out of the calendar"))
}

/// `count` ranges walking backwards from `anchor`, newest first.
///
/// Index 0 runs from the start of the anchor's period up to the anchor itself;
/// every older range covers its whole period.
pub fn period_ranges(anchor: NaiveDate, count: usize, unit: PeriodUnit) -> EtlResult<Vec<PeriodRange>> {
    (0..count)
        .map(|index| {
            let (start, full_end, label) = match unit {
                PeriodUnit::Year => year_bounds(anchor, index),
                PeriodUnit::Month => month_bounds(anchor, index),
            }
            .ok_or_else(|| {
                EtlError::config(
                    "download.periods",
                    format!("period {} before {} is out of the calendar", index, anchor),
                )
            })?;
            let end = if index == 0 { anchor } else { full_end };
            Ok(PeriodRange {
                index,
                start,
                end,
                label,
            })
        })
        .collect()
}

fn year_bounds(anchor: NaiveDate, back: usize) -> Option<(NaiveDate, NaiveDate, String)> {
    let year = anchor.year().checked_sub(i32::try_from(back).ok()?)?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some((start, end, format!("{:04}", year)))
}

fn month_bounds(anchor: NaiveDate, back: usize) -> Option<(NaiveDate, NaiveDate, String)> {
    let total = i64::from(anchor.year()) * 12 + i64::from(anchor.month0()) - i64::try_from(back).ok()?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end, format!("{:04}-{:02}", year, month)))
}
