// # SMTP Notifier
//
// Delivers presence notifications as plain-text mail through an SMTP relay.
//
// ## Behavior
//
// - One message per `notify()` call, one delivery attempt
// - STARTTLS on the configured port (587 by default)
// - Optional credentials; the password never appears in logs or `Debug`
// - Failures are returned to the engine, which reports them
//
// ## Configuration
//
// ```json
// {
//   "type": "smtp",
//   "host": "smtp.example.com",
//   "port": 587,
//   "from": "presenced@example.com",
//   "to": "ops@example.com",
//   "username": "presenced",
//   "password": "...",
//   "subject_prefix": "[presence]"
// }
// ```

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use presence_core::config::NotifierConfig;
use presence_core::registry::ComponentRegistry;
use presence_core::traits::{Notifier, NotifierFactory};
use presence_core::Error;
use tracing::info;

/// Default SMTP port (STARTTLS)
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Errors raised while preparing or sending mail
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The sender or recipient address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled
    #[error("Email build error: {0}")]
    Build(#[from] lettre::error::Error),
}

impl From<SmtpError> for Error {
    fn from(err: SmtpError) -> Self {
        Error::notification(err.to_string())
    }
}

/// Notifier sending mail through an SMTP relay
pub struct SmtpNotifier {
    from: Mailbox,
    to: Mailbox,
    subject_prefix: Option<String>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .field("subject_prefix", &self.subject_prefix)
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Build a notifier from an `smtp` notifier configuration
    ///
    /// No connection is opened until the first message is sent.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, Error> {
        let NotifierConfig::Smtp {
            host,
            port,
            from,
            to,
            username,
            password,
            subject_prefix,
        } = config
        else {
            return Err(Error::config(format!(
                "SMTP notifier cannot be built from a {} configuration",
                config.type_name()
            )));
        };

        let port = port.unwrap_or(DEFAULT_SMTP_PORT);
        let from: Mailbox = from.parse().map_err(SmtpError::from)?;
        let to: Mailbox = to.parse().map_err(SmtpError::from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(SmtpError::from)?
            .port(port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            to,
            subject_prefix: subject_prefix.clone().filter(|p| !p.is_empty()),
            transport: builder.build(),
            host: host.clone(),
            port,
        })
    }

    /// Full subject line including the configured prefix
    fn subject_line(&self, subject: &str) -> String {
        match &self.subject_prefix {
            Some(prefix) => format!("{} {}", prefix, subject),
            None => subject.to_string(),
        }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, SmtpError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject_line(subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), Error> {
        let message = self.build_message(subject, body)?;

        self.transport
            .send(message)
            .await
            .map_err(SmtpError::from)?;

        info!(to = %self.to, host = %self.host, "Notification mail sent: {}", subject);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "smtp"
    }
}

/// Factory for [`SmtpNotifier`]
pub struct SmtpNotifierFactory;

impl NotifierFactory for SmtpNotifierFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>, Error> {
        Ok(Box::new(SmtpNotifier::from_config(config)?))
    }
}

/// Register the `smtp` notifier
pub fn register(registry: &ComponentRegistry) {
    registry.register_notifier("smtp", Box::new(SmtpNotifierFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(from: &str, prefix: Option<&str>) -> NotifierConfig {
        NotifierConfig::Smtp {
            host: "smtp.example.com".to_string(),
            port: None,
            from: from.to_string(),
            to: "ops@example.com".to_string(),
            username: Some("presenced".to_string()),
            password: Some("hunter2".to_string()),
            subject_prefix: prefix.map(str::to_string),
        }
    }

    fn build_notifier(prefix: Option<&str>) -> SmtpNotifier {
        SmtpNotifier::from_config(&smtp_config("presenced@example.com", prefix)).unwrap()
    }

    #[test]
    fn test_builds_from_config_with_default_port() {
        let notifier = build_notifier(None);

        assert_eq!(notifier.port, DEFAULT_SMTP_PORT);
        assert_eq!(notifier.notifier_name(), "smtp");
    }

    #[test]
    fn test_debug_hides_password() {
        let notifier = build_notifier(None);
        let debug = format!("{:?}", notifier);

        assert!(debug.contains("smtp.example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_invalid_sender_is_notification_error() {
        let result = SmtpNotifier::from_config(&smtp_config("not-an-email", None));

        match result {
            Err(Error::Notification(msg)) => assert!(msg.contains("Email address parse error")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_subject_prefix() {
        let plain = build_notifier(None);
        let prefixed = build_notifier(Some("[presence]"));

        assert_eq!(
            plain.subject_line("Device Phone changed to ACTIVE"),
            "Device Phone changed to ACTIVE"
        );
        assert_eq!(
            prefixed.subject_line("Device Phone changed to ACTIVE"),
            "[presence] Device Phone changed to ACTIVE"
        );
    }

    #[test]
    fn test_message_is_plain_text() {
        let notifier = build_notifier(None);
        let message = notifier.build_message("presenced", "").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: presenced"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let result = SmtpNotifierFactory.create(&NotifierConfig::Log);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_register() {
        let registry = ComponentRegistry::new();
        register(&registry);
        assert!(registry.has_notifier("smtp"));
    }
}
