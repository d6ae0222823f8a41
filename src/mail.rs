use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

/// Delivers mail through an SMTP relay (STARTTLS).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> anyhow::Result<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Development mailer: writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.html,
            "mail transport not configured; logging message"
        );
        Ok(())
    }
}

/// Pick the SMTP mailer when a host is configured, otherwise the logging one.
pub fn from_config(config: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match config.smtp_host.as_deref() {
        Some(host) => Ok(Arc::new(SmtpMailer::new(config, host)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Send without holding up the caller. Failures are logged and otherwise dropped.
pub fn send_detached(mailer: Arc<dyn Mailer>, email: OutgoingEmail) {
    tokio::spawn(async move {
        let to = email.to.clone();
        match mailer.send(email).await {
            Ok(()) => tracing::info!(%to, "email sent"),
            Err(e) => tracing::error!(%to, error = %e, "failed to send email"),
        }
    });
}

#[derive(Template)]
#[template(path = "email/reset.html")]
struct ResetEmail<'a> {
    username: &'a str,
    reset_url: &'a str,
}

pub fn reset_email(username: &str, email: &str, reset_url: &str) -> AppResult<OutgoingEmail> {
    let html = ResetEmail {
        username,
        reset_url,
    }
    .render()?;
    Ok(OutgoingEmail {
        to: email.to_string(),
        subject: "Request to Reset Password".to_string(),
        html,
    })
}
