use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::NotifyError;
use crate::config::{secret_from_env, EmailConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError>;
}

/// Sends HTML mail through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let username = secret_from_env(&cfg.username_env)?;
        let password = secret_from_env(&cfg.password_env)?;
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid email.from '{}': {e}", cfg.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)?
            .credentials(Credentials::new(username, password));
        if let Some(port) = cfg.smtp_port {
            builder = builder.port(port);
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        let to: Mailbox = email.to.parse().map_err(|e| NotifyError::Send {
            to: email.to.clone(),
            reason: format!("invalid address: {e}"),
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| NotifyError::Send {
                to: email.to.clone(),
                reason: e.to_string(),
            })?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Send {
                to: email.to,
                reason: e.to_string(),
            })
    }
}
