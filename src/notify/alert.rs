use async_trait::async_trait;
use tracing::info;

use super::mail::Mailer;
use super::AlertNotifier;
use crate::error::EtlResult;

pub const DATA_COUNT_SUBJECT: &str = "Google Sheet data count alert";
pub const RUN_FAILED_SUBJECT: &str = "callsheet run failed";

/// Whether a published row count warrants a mail.
pub fn should_alert(row_count: usize, threshold: usize, always_send: bool) -> bool {
    always_send || row_count < threshold
}

pub fn data_count_body(row_count: usize, threshold: usize) -> String {
    if row_count < threshold {
        format!(
            "目前上傳的 Google Sheet 資料數量為 {}，低於預期的 {} 筆。\n\
             The sheet now holds {} data rows; at least {} were expected.",
            row_count, threshold, row_count, threshold
        )
    } else {
        format!(
            "目前上傳的 Google Sheet 資料數量為 {}，已達預期的 {} 筆。\n\
             The sheet now holds {} data rows, meeting the expected minimum of {}.",
            row_count, threshold, row_count, threshold
        )
    }
}

pub struct MailAlertNotifier {
    mailer: Mailer,
    always_send: bool,
}

impl MailAlertNotifier {
    pub fn new(mailer: Mailer, always_send: bool) -> Self {
        Self { mailer, always_send }
    }
}

#[async_trait]
impl AlertNotifier for MailAlertNotifier {
    async fn notify_if_abnormal(&self, row_count: usize, threshold: usize) -> EtlResult<bool> {
        if !should_alert(row_count, threshold, self.always_send) {
            return Ok(false);
        }
        info!(rows = row_count, threshold, "sending data count alert");
        self.mailer
            .send(DATA_COUNT_SUBJECT, &data_count_body(row_count, threshold))
            .await?;
        Ok(true)
    }

    async fn send_alert(&self, subject: &str, body: &str) -> EtlResult<()> {
        self.mailer.send(subject, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailConfig;
    use crate::error::EtlError;

    #[test]
    fn test_threshold() {
        assert!(should_alert(99, 100, false));
        assert!(!should_alert(100, 100, false));
        assert!(!should_alert(250, 100, false));
        assert!(should_alert(250, 100, true));
        assert!(!should_alert(0, 0, false));
    }

    #[test]
    fn test_body_mentions_both_counts() {
        let body = data_count_body(12, 100);
        assert!(body.contains("12"));
        assert!(body.contains("100"));
        assert!(body.contains("低於預期"));
    }

    #[test]
    fn test_healthy_count_body_does_not_claim_shortfall() {
        let body = data_count_body(250, 100);
        assert!(body.contains("250"));
        assert!(!body.contains("低於預期"));
        assert!(body.contains("meeting the expected minimum"));

        let body = data_count_body(100, 100);
        assert!(!body.contains("低於預期"));
    }

    #[tokio::test]
    async fn test_healthy_count_sends_nothing() {
        // unroutable server: a send attempt would surface as an error
        let config = MailConfig {
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 9,
            need_ssl: false,
            smtp_credential: false,
            auth_account1: None,
            auth_account2: None,
            mail_sender: "etl@example.com".to_string(),
            mail_sender_display: None,
            to_recipients: "ops@example.com".to_string(),
            use_bcc: true,
        };
        let notifier = MailAlertNotifier::new(Mailer::from_config(&config).unwrap(), false);
        assert!(!notifier.notify_if_abnormal(150, 100).await.unwrap());

        let err = notifier.notify_if_abnormal(3, 100).await.unwrap_err();
        assert!(matches!(err, EtlError::Notify(_)));
    }
}
