// src/publish/mod.rs

pub mod auth;
pub mod sheets;

pub use auth::TokenSource;
pub use sheets::{a1_range, SheetsClient, SheetsError};

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{EtlError, EtlResult};
use crate::transform::{AccumulatedTable, OutputRecord};

/// Replaces the destination's contents with a finished table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetPublisher: Send + Sync {
    async fn publish(&self, table: &AccumulatedTable) -> EtlResult<()>;
}

pub struct GoogleSheetPublisher {
    client: SheetsClient,
    sheet_name: String,
    clear_range: Option<String>,
}

impl GoogleSheetPublisher {
    pub fn new(client: SheetsClient, sheet_name: impl Into<String>, clear_range: Option<String>) -> Self {
        Self {
            client,
            sheet_name: sheet_name.into(),
            clear_range,
        }
    }

    /// Range wiped before each write.
    pub fn clear_target(&self) -> String {
        match self.clear_range.as_deref().map(str::trim) {
            Some(cells) if !cells.is_empty() => a1_range(&self.sheet_name, Some(cells)),
            _ => a1_range(&self.sheet_name, None),
        }
    }

    pub fn write_target(&self) -> String {
        a1_range(&self.sheet_name, Some("A1"))
    }

    /// Adds `records` below whatever the sheet already holds.
    pub async fn append(&self, records: &[OutputRecord]) -> EtlResult<u64> {
        let values: Vec<Vec<String>> = records.iter().map(|r| r.fields().to_vec()).collect();
        self.client
            .append(&self.write_target(), &values)
            .await
            .map_err(|e| self.failure(records.len(), e))
    }

    /// Current contents of the sheet.
    pub async fn read(&self) -> EtlResult<Vec<Vec<String>>> {
        self.client
            .read(&a1_range(&self.sheet_name, None))
            .await
            .map_err(|e| self.failure(0, e))
    }

    fn failure(&self, rows: usize, e: SheetsError) -> EtlError {
        error!(
            spreadsheet_id = %self.client.spreadsheet_id(),
            sheet = %self.sheet_name,
            rows,
            "Sheets call failed: {}",
            e
        );
        EtlError::Publish {
            spreadsheet_id: self.client.spreadsheet_id().to_string(),
            rows,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl SheetPublisher for GoogleSheetPublisher {
    async fn publish(&self, table: &AccumulatedTable) -> EtlResult<()> {
        let rows = table.data_rows();

        let clear = self.clear_target();
        self.client
            .clear(&clear)
            .await
            .map_err(|e| self.failure(rows, e))?;
        info!(range = %clear, "sheet cleared");

        let cells = self
            .client
            .update(&self.write_target(), &table.to_values())
            .await
            .map_err(|e| self.failure(rows, e))?;
        info!(
            spreadsheet_id = %self.client.spreadsheet_id(),
            sheet = %self.sheet_name,
            rows,
            cells,
            "sheet written"
        );
        Ok(())
    }
}
