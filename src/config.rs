//! Job configuration.
//!
//! Loaded once at startup from a YAML file, an optional per-environment
//! overlay next to it (`callsheet.production.yaml`), and finally
//! `CALLSHEET__SECTION__KEY` environment variables.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};
use crate::fetch::{urls, PeriodRange, PeriodUnit, SourceKind};
use crate::transform::FilterCriteria;

/// Prefix of environment variables that override single keys.
pub const ENV_PREFIX: &str = "CALLSHEET__";

/// Keys whose environment overrides are parsed as numbers or booleans.
/// Everything else is taken verbatim as a string.
const SCALAR_KEYS: &[&str] = &[
    "download.periods",
    "download.lag_days",
    "download.request_timeout_secs",
    "mail.smtp_port",
    "mail.need_ssl",
    "mail.smtp_credential",
    "mail.use_bcc",
    "alert.row_threshold",
    "alert.always_send",
    "alert.notify_on_failure",
    "alert.wait_secs",
];

/// Older key spellings still accepted in files: (parent section, old, current).
const LEGACY_KEYS: &[(&[&str], &str, &str)] = &[
    (&["download"], "years_to_download", "periods"),
    (&["download", "filter"], "exclude_service_type", "excluded_service_type"),
    (&["download", "filter"], "required_columns", "required_non_empty"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub download: DownloadConfig,
    pub sheets: SheetsConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub url_format: String,
    /// Number of periods to export, newest first.
    pub periods: usize,
    #[serde(default)]
    pub period_unit: PeriodUnit,
    /// Days between today and the end of the newest period.
    #[serde(default = "default_lag_days")]
    pub lag_days: u32,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_file_name_format")]
    pub file_name_format: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    pub filter: FilterCriteria,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Ready-made bearer token; skips credential discovery entirely.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Service account key file. Application default credentials when unset.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// A1 range cleared before writing; the whole sheet when unset.
    #[serde(default)]
    pub clear_range: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    #[serde(default)]
    pub need_ssl: bool,
    #[serde(default)]
    pub smtp_credential: bool,
    #[serde(default)]
    pub auth_account1: Option<String>,
    #[serde(default)]
    pub auth_account2: Option<String>,
    pub mail_sender: String,
    #[serde(default)]
    pub mail_sender_display: Option<String>,
    /// Comma-separated addresses.
    pub to_recipients: String,
    #[serde(default = "default_true")]
    pub use_bcc: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Fewer published data rows than this triggers a mail.
    #[serde(default = "default_row_threshold")]
    pub row_threshold: usize,
    #[serde(default)]
    pub always_send: bool,
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
    /// Upper bound on waiting for a pending mail before exit.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            row_threshold: default_row_threshold(),
            always_send: false,
            notify_on_failure: true,
            wait_secs: default_wait_secs(),
        }
    }
}

fn default_lag_days() -> u32 {
    1
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_file_name_format() -> String {
    "{label}-call.xls".to_string()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}
fn default_row_threshold() -> usize {
    100
}
fn default_wait_secs() -> u64 {
    30
}

/// Loads `path`, the `<stem>.<environment>.<ext>` overlay if present, and
/// the process environment.
pub fn load(path: &Path, environment: &str) -> EtlResult<Config> {
    let mut tree = read_yaml(path)?;
    info!(path = %path.display(), "configuration loaded");

    let overlay = overlay_path(path, environment);
    if overlay.is_file() {
        merge(&mut tree, read_yaml(&overlay)?);
        info!(path = %overlay.display(), environment, "environment overlay applied");
    } else {
        debug!(path = %overlay.display(), "no environment overlay");
    }

    apply_env_overrides(&mut tree, std::env::vars())?;
    from_tree(tree)
}

/// Deserializes and validates an already merged tree.
pub fn from_tree(mut tree: Value) -> EtlResult<Config> {
    canonicalize_keys(&mut tree);
    let config: Config =
        serde_yaml::from_value(tree).map_err(|e| EtlError::config("<root>", e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn read_yaml(path: &Path) -> EtlResult<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EtlError::config(path.display().to_string(), e.to_string()))?;
    let mut tree: Value =
        serde_yaml::from_str(&text).map_err(|e| EtlError::config(path.display().to_string(), e.to_string()))?;
    canonicalize_keys(&mut tree);
    Ok(tree)
}

/// Renames legacy keys in place. When both spellings are present the current
/// one wins.
pub fn canonicalize_keys(tree: &mut Value) {
    for (parents, legacy, current) in LEGACY_KEYS {
        let mut node = Some(&mut *tree);
        for parent in parents.iter() {
            node = node.and_then(|n| n.get_mut(*parent));
        }
        let Some(Value::Mapping(map)) = node else {
            continue;
        };
        let Some(value) = map.remove(*legacy) else {
            continue;
        };
        let current = Value::String(current.to_string());
        if map.contains_key(&current) {
            debug!(key = *legacy, "legacy key shadowed by its current name");
        } else {
            map.insert(current, value);
        }
    }
}

fn overlay_path(path: &Path, environment: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("callsheet");
    let name = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{}.{}.{}", stem, environment, ext),
        None => format!("{}.{}", stem, environment),
    };
    path.with_file_name(name)
}

/// Deep merge: mappings merge key by key, anything else is replaced.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Applies `CALLSHEET__SECTION__KEY=value` pairs on top of `tree`.
pub fn apply_env_overrides(
    tree: &mut Value,
    vars: impl IntoIterator<Item = (String, String)>,
) -> EtlResult<()> {
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = rest
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        let key = segments.join(".");
        let value = if SCALAR_KEYS.contains(&key.as_str()) {
            match serde_yaml::from_str::<Value>(&raw) {
                Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
                _ => return Err(EtlError::config(&key, format!("`{}` is not a number or boolean", raw))),
            }
        } else {
            Value::String(raw)
        };
        debug!(key = %key, "environment override");
        set_path(tree, &segments, value);
    }
    Ok(())
}

fn set_path(tree: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut node = tree;
    for segment in parents {
        node = ensure_mapping(node)
            .entry(Value::String(segment.clone()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    ensure_mapping(node).insert(Value::String(last.clone()), value);
}

/// Turns `node` into a mapping (dropping any scalar there) and returns it.
fn ensure_mapping(node: &mut Value) -> &mut Mapping {
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(map) => map,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

fn require(key: &str, value: &str) -> EtlResult<()> {
    if value.trim().is_empty() {
        Err(EtlError::config(key, "must not be empty"))
    } else {
        Ok(())
    }
}

impl Config {
    /// Checks everything the run needs before any period is processed.
    pub fn validate(&self) -> EtlResult<()> {
        let d = &self.download;
        if d.source == SourceKind::Http {
            require("download.base_url", &d.base_url)?;
            require("download.url_format", &d.url_format)?;
        }
        require("download.filter.customer_name", &d.filter.customer_name)?;
        require("download.file_name_format", &d.file_name_format)?;

        // render against a sample period so template mistakes surface now
        let sample = PeriodRange {
            index: 0,
            start: chrono::NaiveDate::MIN,
            end: chrono::NaiveDate::MIN,
            label: "sample".to_string(),
        };
        urls::render_template(&d.file_name_format, &sample)
            .map_err(|e| EtlError::config("download.file_name_format", e))?;
        if d.source == SourceKind::Http {
            urls::period_url(&d.base_url, &d.url_format, &sample)?;
        }

        let s = &self.sheets;
        require("sheets.spreadsheet_id", &s.spreadsheet_id)?;
        require("sheets.sheet_name", &s.sheet_name)?;
        if let Some(path) = &s.credentials_path {
            if !path.is_file() {
                return Err(EtlError::config(
                    "sheets.credentials_path",
                    format!("{} is not a readable file", path.display()),
                ));
            }
        }

        let m = &self.mail;
        require("mail.smtp_server", &m.smtp_server)?;
        require("mail.mail_sender", &m.mail_sender)?;
        require("mail.to_recipients", &m.to_recipients)?;
        if m.smtp_credential {
            require("mail.auth_account1", m.auth_account1.as_deref().unwrap_or(""))?;
            require("mail.auth_account2", m.auth_account2.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}
