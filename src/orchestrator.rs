//! Drives one run: every period in turn, then a single publish.
//!
//! Periods are processed strictly one after another. Any fetch or parse
//! failure aborts the run before anything reaches the sheet.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::EtlResult;
use crate::fetch::{PeriodRange, SourceFetcher};
use crate::notify::{dispatch_count_check, AlertNotifier, PendingNotification};
use crate::publish::SheetPublisher;
use crate::transform::schema::{DISPATCH_NUMBER, OUTPUT_SCHEMA};
use crate::transform::{transform_period, AccumulatedTable, FilterCriteria, PassStats};

/// What a run covers.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Newest first.
    pub ranges: Vec<PeriodRange>,
    pub criteria: FilterCriteria,
    pub row_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct PeriodReport {
    pub label: String,
    pub stats: PassStats,
}

#[derive(Debug)]
pub struct RunSummary {
    pub periods: Vec<PeriodReport>,
    /// Data rows written, header excluded.
    pub published_rows: usize,
    /// The data-count check, still running in the background.
    pub notification: PendingNotification,
}

pub struct PeriodOrchestrator {
    fetcher: Box<dyn SourceFetcher>,
    publisher: Box<dyn SheetPublisher>,
    notifier: Arc<dyn AlertNotifier>,
}

impl PeriodOrchestrator {
    pub fn new(
        fetcher: Box<dyn SourceFetcher>,
        publisher: Box<dyn SheetPublisher>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            fetcher,
            publisher,
            notifier,
        }
    }

    pub async fn run(&self, plan: &RunPlan) -> EtlResult<RunSummary> {
        let started = Instant::now();
        let mut table = AccumulatedTable::new();
        let mut periods = Vec::with_capacity(plan.ranges.len());

        for range in &plan.ranges {
            info!(period = %range, "fetching period");
            let rows = self.fetcher.fetch(range).await.map_err(|e| {
                error!(period = %range.label, "period failed, aborting run: {}", e);
                e
            })?;

            let (records, stats) = transform_period(rows, &plan.criteria, DISPATCH_NUMBER, &OUTPUT_SCHEMA);
            table.ensure_header(&OUTPUT_SCHEMA);
            table.extend(records);
            info!(
                period = %range.label,
                fetched = stats.fetched,
                matched = stats.matched,
                emitted = stats.emitted,
                "period processed"
            );
            periods.push(PeriodReport {
                label: range.label.clone(),
                stats,
            });
        }

        // a run with no periods still publishes the header
        table.ensure_header(&OUTPUT_SCHEMA);
        let published_rows = table.data_rows();

        self.publisher.publish(&table).await?;
        info!(
            periods = periods.len(),
            rows = published_rows,
            elapsed = ?started.elapsed(),
            "table published"
        );

        let notification = dispatch_count_check(Arc::clone(&self.notifier), published_rows, plan.row_threshold);

        Ok(RunSummary {
            periods,
            published_rows,
            notification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::fetch::MockSourceFetcher;
    use crate::notify::MockAlertNotifier;
    use crate::publish::MockSheetPublisher;
    use crate::transform::schema::{CONTRACT_NUMBER, CUSTOMER_NAME, CUSTOMER_UNIT, SERVICE_TYPE};
    use crate::transform::RawRow;
    use chrono::NaiveDate;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn year(index: usize, y: i32) -> PeriodRange {
        PeriodRange {
            index,
            start: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(y, 12, 31).unwrap(),
            label: y.to_string(),
        }
    }

    /// A complete row whose contract number `K-<id>` identifies it after projection.
    fn call(id: &str, customer: &str, service: &str) -> RawRow {
        let mut row: RawRow = [
            (DISPATCH_NUMBER, id),
            (CUSTOMER_NAME, customer),
            (SERVICE_TYPE, service),
            (CUSTOMER_UNIT, "North campus"),
        ]
        .into_iter()
        .collect();
        row.insert(CONTRACT_NUMBER, format!("K-{}", id));
        row
    }

    fn plan(years: &[i32]) -> RunPlan {
        RunPlan {
            ranges: years.iter().enumerate().map(|(i, y)| year(i, *y)).collect(),
            criteria: FilterCriteria::new("X", "T2"),
            row_threshold: 100,
        }
    }

    fn position(column: &str) -> usize {
        OUTPUT_SCHEMA.iter().position(|c| *c == column).unwrap()
    }

    #[tokio::test]
    async fn test_duplicates_and_excluded_service_collapse_to_one_row() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|p| p.label == "2024")
            .times(1)
            .returning(|_| Ok(vec![call("A", "X", "T1"), call("A", "X", "T1")]));
        fetcher
            .expect_fetch()
            .withf(|p| p.label == "2023")
            .times(1)
            .returning(|_| Ok(vec![call("B", "X", "T2")]));

        let mut publisher = MockSheetPublisher::new();
        publisher
            .expect_publish()
            .withf(|table| {
                let records = table.records();
                records.len() == 2
                    && records[0].fields()[0] == OUTPUT_SCHEMA[0]
                    && records[1].fields()[position(CONTRACT_NUMBER)] == "K-A"
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify_if_abnormal()
            .with(eq(1), eq(100))
            .times(1)
            .returning(|_, _| Ok(true));

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let summary = orchestrator.run(&plan(&[2024, 2023])).await.unwrap();

        assert_eq!(summary.published_rows, 1);
        assert_eq!(summary.periods.len(), 2);
        assert_eq!(
            summary.periods[0].stats,
            PassStats {
                fetched: 2,
                matched: 2,
                emitted: 1
            }
        );
        assert_eq!(summary.periods[1].stats.matched, 0);
        summary.notification.settle(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_row_without_contract_number_excluded() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| {
            let mut incomplete: RawRow = [
                (DISPATCH_NUMBER, "C"),
                (CUSTOMER_NAME, "X"),
                (SERVICE_TYPE, "T1"),
                (CUSTOMER_UNIT, "North campus"),
            ]
            .into_iter()
            .collect();
            incomplete.insert("備註", "no contract");
            Ok(vec![incomplete, call("D", "X", "T1")])
        });

        let mut publisher = MockSheetPublisher::new();
        publisher
            .expect_publish()
            .withf(|table| {
                table.data_rows() == 1 && table.records()[1].fields()[position(CONTRACT_NUMBER)] == "K-D"
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockAlertNotifier::new();
        notifier.expect_notify_if_abnormal().returning(|_, _| Ok(true));

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let summary = orchestrator.run(&plan(&[2024])).await.unwrap();
        summary.notification.settle(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_zero_periods_publish_header_only() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().times(0);

        let mut publisher = MockSheetPublisher::new();
        publisher
            .expect_publish()
            .withf(|table| table.has_header() && table.records().len() == 1 && table.data_rows() == 0)
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify_if_abnormal()
            .with(eq(0), eq(100))
            .times(1)
            .returning(|_, _| Ok(true));

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let summary = orchestrator.run(&plan(&[])).await.unwrap();
        assert_eq!(summary.published_rows, 0);
        summary.notification.settle(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_before_publish() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|p| p.index == 0)
            .times(1)
            .returning(|_| Ok(vec![call("A", "X", "T1")]));
        fetcher
            .expect_fetch()
            .withf(|p| p.index == 1)
            .times(1)
            .returning(|_| Err(EtlError::parse("2023-call.xls", "header row not found")));
        fetcher.expect_fetch().withf(|p| p.index == 2).times(0);

        let mut publisher = MockSheetPublisher::new();
        publisher.expect_publish().times(0);

        let mut notifier = MockAlertNotifier::new();
        notifier.expect_notify_if_abnormal().times(0);

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let err = orchestrator.run(&plan(&[2024, 2023, 2022])).await.unwrap_err();
        assert!(matches!(err, EtlError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_publish_failure_is_fatal_and_skips_count_check() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(vec![call("A", "X", "T1")]));

        let mut publisher = MockSheetPublisher::new();
        publisher.expect_publish().times(1).returning(|table| {
            Err(EtlError::Publish {
                spreadsheet_id: "1AbC".to_string(),
                rows: table.data_rows(),
                message: "403".to_string(),
            })
        });

        let mut notifier = MockAlertNotifier::new();
        notifier.expect_notify_if_abnormal().times(0);

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let err = orchestrator.run(&plan(&[2024])).await.unwrap_err();
        assert!(matches!(err, EtlError::Publish { rows: 1, .. }));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_run() {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(vec![call("A", "X", "T1")]));

        let mut publisher = MockSheetPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));

        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify_if_abnormal()
            .times(1)
            .returning(|_, _| Err(EtlError::Notify("smtp down".to_string())));

        let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), Arc::new(notifier));
        let summary = orchestrator.run(&plan(&[2024])).await.unwrap();
        summary.notification.settle(Duration::from_secs(5)).await;
    }
}
