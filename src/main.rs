use anyhow::{Context, Result};
use callsheet::{
    config::{self, Config},
    fetch::{self, ExportFetcher},
    notify::{alert::RUN_FAILED_SUBJECT, dispatch_alert, AlertNotifier, MailAlertNotifier, Mailer},
    orchestrator::{PeriodOrchestrator, RunPlan, RunSummary},
    publish::{GoogleSheetPublisher, SheetsClient, TokenSource},
};
use chrono::Local;
use clap::Parser;
use reqwest::Client;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Publishes filtered service-call exports to a Google Sheet.
#[derive(Parser, Debug)]
#[command(name = "callsheet", version)]
struct Cli {
    /// Base YAML configuration file.
    #[arg(long, env = "CALLSHEET_CONFIG", default_value = "callsheet.yaml")]
    config: PathBuf,

    /// Overlay applied on top of the base file (`callsheet.<environment>.yaml`).
    #[arg(long, env = "CALLSHEET_ENV", default_value = "development")]
    environment: String,

    /// Send the data-count mail even when the row count looks healthy.
    #[arg(long)]
    always_notify: bool,

    /// Tracing filter, e.g. `debug` or `info,callsheet=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Days between today and the end of the newest period.
    #[arg(long)]
    lag_days: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let env = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level `{}`", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,callsheet=info")),
    };
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let mut config = config::load(&cli.config, &cli.environment)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if cli.always_notify {
        config.alert.always_send = true;
    }
    if let Some(lag_days) = cli.lag_days {
        config.download.lag_days = lag_days;
    }

    // ─── 3) notifier ─────────────────────────────────────────────────
    let mailer = Mailer::from_config(&config.mail).context("configuring mail")?;
    let notifier: Arc<dyn AlertNotifier> = Arc::new(MailAlertNotifier::new(mailer, config.alert.always_send));
    let wait = Duration::from_secs(config.alert.wait_secs);

    // ─── 4) run ──────────────────────────────────────────────────────
    match run(&config, Arc::clone(&notifier)).await {
        Ok(summary) => {
            for period in &summary.periods {
                info!(
                    period = %period.label,
                    fetched = period.stats.fetched,
                    matched = period.stats.matched,
                    emitted = period.stats.emitted,
                    "summary"
                );
            }
            info!(rows = summary.published_rows, "run complete");
            summary.notification.settle(wait).await;
            Ok(())
        }
        Err(e) => {
            error!("run failed: {:#}", e);
            if config.alert.notify_on_failure {
                dispatch_alert(notifier, RUN_FAILED_SUBJECT.to_string(), format!("{:?}", e))
                    .settle(wait)
                    .await;
            }
            Err(e)
        }
    }
}

async fn run(config: &Config, notifier: Arc<dyn AlertNotifier>) -> Result<RunSummary> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.download.request_timeout_secs))
        .build()
        .context("building HTTP client")?;

    let anchor = fetch::anchor_date(Local::now().date_naive(), config.download.lag_days)?;
    let ranges = fetch::period_ranges(anchor, config.download.periods, config.download.period_unit)?;
    info!(%anchor, periods = ranges.len(), unit = ?config.download.period_unit, "run planned");

    let fetcher = ExportFetcher::new(client.clone(), &config.download);
    let tokens = TokenSource::from_config(&config.sheets);
    info!(credentials = tokens.describe(), "Sheets authentication");
    let sheets = SheetsClient::new(client, &config.sheets.spreadsheet_id, tokens);
    let publisher = GoogleSheetPublisher::new(
        sheets,
        &config.sheets.sheet_name,
        config.sheets.clear_range.clone(),
    );

    let plan = RunPlan {
        ranges,
        criteria: config.download.filter.clone(),
        row_threshold: config.alert.row_threshold,
    };
    let orchestrator = PeriodOrchestrator::new(Box::new(fetcher), Box::new(publisher), notifier);
    Ok(orchestrator.run(&plan).await?)
}
