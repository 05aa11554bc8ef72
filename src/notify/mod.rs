// src/notify/mod.rs

pub mod alert;
pub mod mail;

pub use alert::MailAlertNotifier;
pub use mail::Mailer;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::EtlResult;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Mails a warning when `row_count` falls short of `threshold`.
    /// Returns whether anything was sent.
    async fn notify_if_abnormal(&self, row_count: usize, threshold: usize) -> EtlResult<bool>;

    async fn send_alert(&self, subject: &str, body: &str) -> EtlResult<()>;
}

/// Handle to a notification running in the background.
#[derive(Debug, Default)]
pub struct PendingNotification {
    handle: Option<JoinHandle<()>>,
}

impl PendingNotification {
    pub fn none() -> Self {
        Self { handle: None }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Waits up to `wait` for the notification, then gives up on it.
    pub async fn settle(self, wait: Duration) {
        let Some(mut handle) = self.handle else {
            return;
        };
        match timeout(wait, &mut handle).await {
            Ok(Ok(())) => debug!("notification settled"),
            Ok(Err(e)) => warn!("notification task failed: {}", e),
            Err(_) => {
                handle.abort();
                warn!(wait_secs = wait.as_secs(), "notification still pending, abandoning it");
            }
        }
    }
}

/// Runs the data-count check in the background. Failures are logged only.
pub fn dispatch_count_check(
    notifier: Arc<dyn AlertNotifier>,
    row_count: usize,
    threshold: usize,
) -> PendingNotification {
    let handle = tokio::spawn(async move {
        match notifier.notify_if_abnormal(row_count, threshold).await {
            Ok(true) => info!(rows = row_count, threshold, "data count alert sent"),
            Ok(false) => debug!(rows = row_count, threshold, "row count within expectations"),
            Err(e) => warn!(rows = row_count, "data count alert failed: {}", e),
        }
    });
    PendingNotification {
        handle: Some(handle),
    }
}

pub fn dispatch_alert(notifier: Arc<dyn AlertNotifier>, subject: String, body: String) -> PendingNotification {
    let handle = tokio::spawn(async move {
        match notifier.send_alert(&subject, &body).await {
            Ok(()) => info!(subject = %subject, "system alert sent"),
            Err(e) => warn!(subject = %subject, "system alert failed: {}", e),
        }
    });
    PendingNotification {
        handle: Some(handle),
    }
}
