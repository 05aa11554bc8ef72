//! Bearer tokens for the Sheets API.

use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::sheets::SheetsError;
use crate::config::SheetsConfig;

pub const SHEETS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    Static(String),
    ServiceAccount(PathBuf),
    ApplicationDefault,
}

/// Resolves credentials lazily, once per run. The underlying provider
/// refreshes its own tokens.
pub struct TokenSource {
    credentials: Credentials,
    provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl TokenSource {
    pub fn from_config(config: &SheetsConfig) -> Self {
        let credentials = match (&config.access_token, &config.credentials_path) {
            (Some(token), _) if !token.trim().is_empty() => Credentials::Static(token.trim().to_string()),
            (_, Some(path)) => Credentials::ServiceAccount(path.clone()),
            _ => Credentials::ApplicationDefault,
        };
        Self {
            credentials,
            provider: OnceCell::new(),
        }
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Static(token.into()),
            provider: OnceCell::new(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self.credentials {
            Credentials::Static(_) => "static token",
            Credentials::ServiceAccount(_) => "service account key",
            Credentials::ApplicationDefault => "application default credentials",
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn TokenProvider>, SheetsError> {
        self.provider
            .get_or_try_init(|| async {
                match &self.credentials {
                    Credentials::ServiceAccount(path) => CustomServiceAccount::from_file(path)
                        .map(|account| Arc::new(account) as Arc<dyn TokenProvider>)
                        .map_err(|e| SheetsError::Auth(format!("loading {}: {}", path.display(), e))),
                    _ => gcp_auth::provider().await.map_err(|e| {
                        SheetsError::Auth(format!("initializing GCP authentication: {}", e))
                    }),
                }
            })
            .await
    }

    pub async fn token(&self) -> Result<String, SheetsError> {
        if let Credentials::Static(token) = &self.credentials {
            return Ok(token.clone());
        }
        let provider = self.provider().await?;
        let token = provider
            .token(SHEETS_SCOPES)
            .await
            .map_err(|e| SheetsError::Auth(e.to_string()))?;
        debug!(source = self.describe(), "obtained Sheets access token");
        Ok(token.as_str().to_string())
    }
}
