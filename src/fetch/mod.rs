// src/fetch/mod.rs

pub mod download;
pub mod period;
pub mod urls;
pub mod workbook;

pub use period::{anchor_date, period_ranges, PeriodRange, PeriodUnit};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::task;
use tracing::info;

use crate::config::DownloadConfig;
use crate::error::{EtlError, EtlResult};
use crate::transform::RawRow;

/// Produces the header-keyed rows of one period's export.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, period: &PeriodRange) -> EtlResult<Vec<RawRow>>;
}

/// Where exports come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Download each period from the report server.
    #[default]
    Http,
    /// Re-read exports already sitting in the work directory.
    Local,
}

/// Fetches exports over HTTP (or from disk) and parses them with calamine.
pub struct ExportFetcher {
    client: Client,
    source: SourceKind,
    base_url: String,
    url_format: String,
    work_dir: PathBuf,
    file_name_format: String,
}

impl ExportFetcher {
    pub fn new(client: Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            source: config.source,
            base_url: config.base_url.clone(),
            url_format: config.url_format.clone(),
            work_dir: config.work_dir.clone(),
            file_name_format: config.file_name_format.clone(),
        }
    }

    /// Local file backing `period`.
    pub fn export_path(&self, period: &PeriodRange) -> EtlResult<PathBuf> {
        let name = urls::render_template(&self.file_name_format, period)
            .map_err(|e| EtlError::config("download.file_name_format", e))?;
        Ok(self.work_dir.join(name))
    }
}

#[async_trait]
impl SourceFetcher for ExportFetcher {
    async fn fetch(&self, period: &PeriodRange) -> EtlResult<Vec<RawRow>> {
        let path = self.export_path(period)?;

        match self.source {
            SourceKind::Http => {
                let url = urls::period_url(&self.base_url, &self.url_format, period)?;
                let bytes = download::download_export(&self.client, &url, &path).await?;
                info!(period = %period.label, bytes, path = %path.display(), "export downloaded");
            }
            SourceKind::Local => {
                if !path.is_file() {
                    return Err(EtlError::fetch(
                        path.display().to_string(),
                        "local export not found",
                    ));
                }
                info!(period = %period.label, path = %path.display(), "reading local export");
            }
        }

        let shown = path.display().to_string();
        let sheet = task::spawn_blocking(move || workbook::read_export(&path))
            .await
            .map_err(|e| EtlError::parse(shown, format!("reader task failed: {}", e)))??;

        info!(
            period = %period.label,
            sheet = %sheet.sheet_name,
            columns = sheet.headers.len(),
            rows = sheet.rows.len(),
            "export parsed"
        );
        Ok(sheet.rows)
    }
}
