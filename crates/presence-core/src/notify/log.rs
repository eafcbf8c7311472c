// # Log Notifier
//
// Writes notifications to the tracing log instead of an external channel.
// Used for dry runs and as the default when no notifier is configured.

use async_trait::async_trait;

use crate::Error;
use crate::config::NotifierConfig;
use crate::traits::notifier::{Notifier, NotifierFactory};

/// Notifier that only logs
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), Error> {
        if body.is_empty() {
            tracing::info!(target: "presence::notify", "{}", subject);
        } else {
            tracing::info!(target: "presence::notify", "{}\n{}", subject, body);
        }
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for [`LogNotifier`]
pub struct LogNotifierFactory;

impl NotifierFactory for LogNotifierFactory {
    fn create(&self, _config: &NotifierConfig) -> Result<Box<dyn Notifier>, Error> {
        Ok(Box::new(LogNotifier::new()))
    }
}
