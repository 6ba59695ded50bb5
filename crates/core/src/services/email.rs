//! Outgoing mail.
//!
//! Transports sit behind the [`Mailer`] trait so callers never depend on a
//! concrete provider. With no email configuration the [`LogMailer`] records
//! messages instead of sending them.

use std::sync::Arc;

use async_trait::async_trait;
use kiezpoll_common::{
    AppError, AppResult,
    config::{EmailProviderKind, EmailSettings},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: String,
}

/// A mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// SMTP relay with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a transport for the configured relay.
    pub fn new(settings: &EmailSettings) -> AppResult<Self> {
        let host = settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| AppError::Config("email.smtp_host is required for smtp".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay {host}: {e}")))?
            .port(settings.smtp_port);
        if let (Some(username), Some(password)) = (&settings.smtp_username, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: sender(settings)?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.text_body.clone())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

/// `SendGrid` v3 mail API.
pub struct SendGridMailer {
    http_client: reqwest::Client,
    api_key: String,
    from_address: String,
    from_name: String,
}

impl SendGridMailer {
    pub fn new(settings: &EmailSettings) -> AppResult<Self> {
        let api_key = settings.sendgrid_api_key.clone().ok_or_else(|| {
            AppError::Config("email.sendgrid_api_key is required for sendgrid".to_string())
        })?;

        Ok(Self {
            http_client: reqwest::Client::new(),
            api_key,
            from_address: settings.from_address.clone(),
            from_name: settings.from_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let body = serde_json::json!({
            "personalizations": [{
                "to": [{"email": message.to}]
            }],
            "from": {
                "email": self.from_address,
                "name": self.from_name
            },
            "subject": message.subject,
            "content": [
                {"type": "text/plain", "value": message.text_body}
            ]
        });

        let response = self
            .http_client
            .post("https://api.sendgrid.com/v3/mail/send")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("SendGrid request failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalService(format!(
                "SendGrid returned {status}: {error_text}"
            )))
        }
    }
}

/// Logs messages at `info` instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text_body,
            "Email not sent (log transport)"
        );
        Ok(())
    }
}

fn sender(settings: &EmailSettings) -> AppResult<Mailbox> {
    let address = settings
        .from_address
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid email.from_address: {e}")))?;
    Ok(Mailbox::new(Some(settings.from_name.clone()), address))
}

/// Subject and body of a verification mail.
#[must_use]
pub fn verification_message(
    instance_name: &str,
    to: &str,
    code: &str,
    ttl_minutes: i64,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your verification code for {instance_name}"),
        text_body: format!(
            "Your verification code is: {code}\n\nIt expires in {ttl_minutes} minutes. \
             If you did not request it, you can ignore this email."
        ),
    }
}

/// Email service.
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    instance_name: String,
}

impl EmailService {
    /// Create a service over an explicit transport.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, instance_name: impl Into<String>) -> Self {
        Self {
            mailer,
            instance_name: instance_name.into(),
        }
    }

    /// Pick the transport named in the configuration. No configuration means
    /// the log transport.
    pub fn from_settings(settings: Option<&EmailSettings>) -> AppResult<Self> {
        let Some(settings) = settings else {
            return Ok(Self::new(Arc::new(LogMailer), "kiezpoll"));
        };

        let mailer: Arc<dyn Mailer> = match settings.provider {
            EmailProviderKind::Smtp => Arc::new(SmtpMailer::new(settings)?),
            EmailProviderKind::Sendgrid => Arc::new(SendGridMailer::new(settings)?),
            EmailProviderKind::Log => Arc::new(LogMailer),
        };
        Ok(Self::new(mailer, settings.instance_name.clone()))
    }

    /// Send a verification code.
    pub async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> AppResult<()> {
        let message = verification_message(&self.instance_name, to, code, ttl_minutes);
        self.mailer.send(&message).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<EmailMessage>>);

    #[async_trait]
    impl Mailer for Recording {
        async fn send(&self, message: &EmailMessage) -> AppResult<()> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn settings(provider: EmailProviderKind) -> EmailSettings {
        EmailSettings {
            provider,
            from_address: "noreply@polls.example".to_string(),
            from_name: "kiezpoll".to_string(),
            instance_name: "Kiezpoll Berlin".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            sendgrid_api_key: None,
        }
    }

    #[test]
    fn test_verification_message() {
        let message = verification_message("Kiezpoll Berlin", "a@example.com", "012345", 15);

        assert_eq!(message.subject, "Your verification code for Kiezpoll Berlin");
        assert!(message.text_body.contains("012345"));
        assert!(message.text_body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_send_verification_code_uses_mailer() {
        let recording = Arc::new(Recording::default());
        let service = EmailService::new(recording.clone(), "Kiezpoll Berlin");

        service
            .send_verification_code("a@example.com", "000042", 15)
            .await
            .unwrap();

        let sent = recording.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
    }

    #[test]
    fn test_from_settings_requires_provider_fields() {
        assert!(EmailService::from_settings(Some(&settings(EmailProviderKind::Smtp))).is_err());
        assert!(EmailService::from_settings(Some(&settings(EmailProviderKind::Sendgrid))).is_err());
        assert!(EmailService::from_settings(Some(&settings(EmailProviderKind::Log))).is_ok());
        assert!(EmailService::from_settings(None).is_ok());
    }
}
