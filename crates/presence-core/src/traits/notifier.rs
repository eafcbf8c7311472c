// # Notifier Trait
//
// Defines the interface for delivering messages to an operator.
//
// ## Implementations
//
// - SMTP mail: `presence-notify-smtp` crate
// - Log only: [`LogNotifier`](crate::notify::LogNotifier)

use async_trait::async_trait;

/// Trait for notifier implementations
///
/// Notifiers are single-shot: one call, one delivery attempt. Failures must
/// be returned, never swallowed; the engine decides how they are reported.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message
    ///
    /// # Parameters
    ///
    /// - `subject`: One-line summary
    /// - `body`: Free-form detail, may be empty
    async fn notify(&self, subject: &str, body: &str) -> Result<(), crate::Error>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
