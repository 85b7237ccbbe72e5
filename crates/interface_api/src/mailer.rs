//! SMTP invoice delivery
//!
//! Implements the ledger's `NotificationDispatch` port with `lettre`.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use domain_billing::{DispatchError, NotificationDispatch, OutboundEmail};

use crate::config::ApiConfig;

/// Sends email through an SMTP relay
#[derive(Clone)]
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_name: String,
}

impl SmtpDispatcher {
    /// Builds a relay transport; `None` when no SMTP host is configured
    pub fn from_config(config: &ApiConfig, from_name: impl Into<String>) -> Result<Option<Self>, DispatchError> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let builder = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| DispatchError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from_name: from_name.into(),
        }))
    }

    fn build_message(&self, email: OutboundEmail) -> Result<Message, DispatchError> {
        let from = Mailbox::new(Some(self.from_name.clone()), parse_address(&email.from)?);
        let to: Mailbox = parse_address(&email.to)?.into();

        let builder = Message::builder().from(from).to(to).subject(email.subject);
        let built = match (email.html_body, email.text_body) {
            (Some(html), Some(text)) => builder.multipart(MultiPart::alternative_plain_html(text, html)),
            (Some(html), None) => builder.singlepart(SinglePart::html(html)),
            (None, text) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.unwrap_or_default()),
        };
        built.map_err(|e| DispatchError::Transport(format!("Failed to build email: {}", e)))
    }
}

fn parse_address(raw: &str) -> Result<lettre::Address, DispatchError> {
    raw.trim()
        .parse()
        .map_err(|e| DispatchError::Address(format!("{}: {}", raw, e)))
}

#[async_trait]
impl NotificationDispatch for SmtpDispatcher {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutboundEmail) -> Result<(), DispatchError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        info!("Email delivered to relay");
        Ok(())
    }
}

/// Dispatcher used when no relay is configured; every send fails
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDispatcher;

#[async_trait]
impl NotificationDispatch for DisabledDispatcher {
    async fn send(&self, _email: OutboundEmail) -> Result<(), DispatchError> {
        Err(DispatchError::NotConfigured)
    }
}
