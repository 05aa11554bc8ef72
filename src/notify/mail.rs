//! SMTP delivery over lettre.

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

use crate::config::MailConfig;
use crate::error::{EtlError, EtlResult};

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    use_bcc: bool,
}

impl Mailer {
    pub fn from_config(config: &MailConfig) -> EtlResult<Self> {
        let address: Address = config
            .mail_sender
            .trim()
            .parse()
            .map_err(|e| EtlError::config("mail.mail_sender", format!("{}", e)))?;
        let display = config
            .mail_sender_display
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let sender = Mailbox::new(display, address);
        let recipients = parse_recipients(&config.to_recipients)?;

        let host = config.smtp_server.trim();
        let builder = if config.need_ssl && config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else if config.need_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
        }
        .map_err(|e| EtlError::config("mail.smtp_server", e.to_string()))?;

        let mut builder = builder.port(config.smtp_port);
        if config.smtp_credential {
            builder = builder.credentials(Credentials::new(
                config.auth_account1.clone().unwrap_or_default(),
                config.auth_account2.clone().unwrap_or_default(),
            ));
        }
        debug!(
            host,
            port = config.smtp_port,
            need_ssl = config.need_ssl,
            smtp_credential = config.smtp_credential,
            recipients = recipients.len(),
            "mail transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            sender,
            recipients,
            use_bcc: config.use_bcc,
        })
    }

    pub fn build_message(&self, subject: &str, body: &str) -> EtlResult<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = if self.use_bcc {
                builder.bcc(recipient.clone())
            } else {
                builder.to(recipient.clone())
            };
        }
        builder
            .body(body.to_string())
            .map_err(|e| EtlError::Notify(format!("building message: {}", e)))
    }

    pub async fn send(&self, subject: &str, body: &str) -> EtlResult<()> {
        let message = self.build_message(subject, body)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| EtlError::Notify(e.to_string()))?;
        info!(subject, code = %response.code(), "mail sent");
        Ok(())
    }
}

/// Comma-separated list, blanks skipped.
fn parse_recipients(list: &str) -> EtlResult<Vec<Mailbox>> {
    let recipients = list
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| {
            r.parse::<Mailbox>()
                .map_err(|e| EtlError::config("mail.to_recipients", format!("{}: {}", r, e)))
        })
        .collect::<EtlResult<Vec<_>>>()?;
    if recipients.is_empty() {
        return Err(EtlError::config("mail.to_recipients", "no recipients"));
    }
    Ok(recipients)
}
