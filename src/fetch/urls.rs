// src/fetch/urls.rs
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use super::period::PeriodRange;
use crate::error::{EtlError, EtlResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]*)\}").expect("placeholder pattern should parse"));

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Substitutes `{0}`/`{start}`, `{1}`/`{end}` and `{label}` in `template`.
/// Dates are rendered `YYYY-MM-DD`.
pub fn render_template(template: &str, period: &PeriodRange) -> Result<String, String> {
    let mut unknown = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| match &caps[1] {
        "0" | "start" => period.start.format(DATE_FORMAT).to_string(),
        "1" | "end" => period.end.format(DATE_FORMAT).to_string(),
        "label" => period.label.clone(),
        other => {
            unknown.get_or_insert_with(|| other.to_string());
            String::new()
        }
    });
    match unknown {
        Some(name) => Err(format!("unknown placeholder {{{}}} in `{}`", name, template)),
        None => Ok(rendered.into_owned()),
    }
}

/// Export URL for one period: `base_url` followed by the rendered `url_format`.
pub fn period_url(base_url: &str, url_format: &str, period: &PeriodRange) -> EtlResult<Url> {
    let path = render_template(url_format, period).map_err(|e| EtlError::config("download.url_format", e))?;
    let full = format!("{}{}", base_url, path);
    Url::parse(&full).map_err(|e| EtlError::config("download.base_url", format!("`{}`: {}", full, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn period() -> PeriodRange {
        PeriodRange {
            index: 1,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            label: "2024".to_string(),
        }
    }

    #[test]
    fn test_positional_placeholders() {
        let out = render_template("/Export.aspx?begin={0}&end={1}", &period()).unwrap();
        assert_eq!(out, "/Export.aspx?begin=2024-01-01&end=2024-12-31");
    }

    #[test]
    fn test_named_placeholders() {
        let out = render_template("{label}-call.xls", &period()).unwrap();
        assert_eq!(out, "2024-call.xls");
        let out = render_template("{start}_{end}", &period()).unwrap();
        assert_eq!(out, "2024-01-01_2024-12-31");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = render_template("/x?d={2}", &period()).unwrap_err();
        assert!(err.contains("{2}"));
    }

    #[test]
    fn test_period_url() {
        let url = period_url(
            "https://calls.example.com",
            "/report/export?from={0}&to={1}",
            &period(),
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("calls.example.com"));
        assert_eq!(url.query(), Some("from=2024-01-01&to=2024-12-31"));
    }

    #[test]
    fn test_bad_base_url_is_config_error() {
        let err = period_url("not a url", "/x", &period()).unwrap_err();
        assert!(matches!(err, EtlError::Config { ref key, .. } if key == "download.base_url"));
    }
}
