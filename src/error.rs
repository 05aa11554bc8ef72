//! Error kinds raised by the job.
//!
//! `Config`, `Fetch`, `Parse` and `Publish` abort a run. `Notify` is only ever
//! logged by the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("configuration error at `{key}`: {reason}")]
    Config { key: String, reason: String },

    #[error("fetching {location} failed: {message}")]
    Fetch { location: String, message: String },

    #[error("malformed export {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("publishing {rows} rows to spreadsheet {spreadsheet_id} failed: {message}")]
    Publish {
        spreadsheet_id: String,
        rows: usize,
        message: String,
    },

    #[error("notification delivery failed: {0}")]
    Notify(String),
}

impl EtlError {
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        EtlError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(location: impl Into<String>, message: impl ToString) -> Self {
        EtlError::Fetch {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        EtlError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
