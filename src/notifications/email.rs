//! Delivery of rendered notifications.
//!
//! Delivery is a collaborator behind the [`NotificationSender`] trait. The
//! SMTP sender builds a multipart/alternative message (plain text + HTML) from
//! the rendered document, using the SMTP settings from the config file.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::error::NotificationError;
use super::render::RenderedDocument;
use crate::config::EmailConfig;

/// Something that can deliver a rendered notification to one recipient
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &str, document: &RenderedDocument)
        -> Result<(), NotificationError>;
}

/// Build the MIME message for a rendered document
pub fn build_message(
    from: Mailbox,
    to: Mailbox,
    document: &RenderedDocument,
) -> Result<Message, NotificationError> {
    Message::builder()
        .from(from)
        .to(to)
        .subject(document.subject.clone())
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(document.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(document.html.clone()),
                ),
        )
        .map_err(|e| NotificationError::Delivery(format!("failed to build message: {}", e)))
}

/// Sends notifications through an SMTP relay
pub struct SmtpSender {
    config: EmailConfig,
}

impl SmtpSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    fn from_mailbox(&self) -> Result<Mailbox, NotificationError> {
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| NotificationError::Delivery("From address not configured".into()))?;

        format!("{} <{}>", self.config.from_name, from_address)
            .parse()
            .map_err(|e| NotificationError::Delivery(format!("invalid from address: {}", e)))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| NotificationError::Delivery("SMTP host not configured".into()))?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .map_err(|e| NotificationError::Delivery(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        Ok(mailer.build())
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(
        &self,
        recipient: &str,
        document: &RenderedDocument,
    ) -> Result<(), NotificationError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| NotificationError::Delivery(format!("invalid recipient address: {}", e)))?;
        let email = build_message(self.from_mailbox()?, to, document)?;

        self.transport()?
            .send(email)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        tracing::info!(
            to = %recipient,
            subject = %document.subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

/// Sender that only logs; used for dry runs
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(
        &self,
        recipient: &str,
        document: &RenderedDocument,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            to = %recipient,
            subject = %document.subject,
            branch = %document.branch,
            html_bytes = document.html.len(),
            text_bytes = document.text.len(),
            "Dry run, notification not delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::render::Branch;

    fn document() -> RenderedDocument {
        RenderedDocument {
            branch: Branch::Success,
            subject: "[SIVACOR] Job abc completed successfully".to_string(),
            status_text: "Completed".to_string(),
            html: "<p>Dear Ada,</p>".to_string(),
            text: "Dear Ada,".to_string(),
        }
    }

    #[test]
    fn test_build_message_is_multipart() {
        let message = build_message(
            "SIVACOR <noreply@sivacor.org>".parse().unwrap(),
            "ada@example.com".parse().unwrap(),
            &document(),
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: [SIVACOR] Job abc completed successfully"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("To: ada@example.com"));
    }

    #[tokio::test]
    async fn test_smtp_sender_requires_configuration() {
        let sender = SmtpSender::new(EmailConfig::default());
        assert!(!sender.is_enabled());

        let err = sender.send("ada@example.com", &document()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_smtp_sender_rejects_bad_recipient() {
        let sender = SmtpSender::new(EmailConfig::default());
        let err = sender.send("not an address", &document()).await.unwrap_err();
        assert!(err.to_string().contains("invalid recipient address"));
    }

    #[test]
    fn test_log_sender_always_succeeds() {
        let result = tokio_test::block_on(LogSender.send("ada@example.com", &document()));
        assert!(result.is_ok());
    }
}
