// # Activity Source Trait
//
// Defines the interface for reading when a device was last observed.
//
// ## Implementations
//
// - Pi-hole FTL database: `presence-source-pihole` crate
//
// ## Usage
//
// ```rust,ignore
// use presence_core::ActivitySource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ActivitySource implementation */;
//
//     match source.last_seen("Phone").await? {
//         Some(observation) => println!("last query at {}", observation.last_seen),
//         None => println!("never seen"),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Most recent observation of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Network address the observation was recorded for
    pub client: String,
    /// Epoch seconds of the most recent query
    pub last_seen: i64,
}

impl Observation {
    pub fn new(client: impl Into<String>, last_seen: i64) -> Self {
        Self {
            client: client.into(),
            last_seen,
        }
    }
}

/// Trait for activity source implementations
///
/// An activity source answers a single question: when was this device last
/// seen? It is an **observer**, never a decision-maker.
///
/// ## Allowed
/// - Read-only access to the external log (files, databases)
///
/// ## Forbidden
/// - Classifying devices as active/inactive (owned by `presence::is_active`)
/// - Touching the state store or sending notifications
/// - Defaulting unseen devices to a timestamp: return `Ok(None)` instead
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Get the most recent observation for a device
    ///
    /// The identifier is matched case-insensitively.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Observation))`: The latest observation
    /// - `Ok(None)`: The device has never been observed
    /// - `Err(Error)`: The source could not be queried
    async fn last_seen(&self, device: &str) -> Result<Option<Observation>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing activity sources from configuration
pub trait ActivitySourceFactory: Send + Sync {
    /// Create an ActivitySource instance from configuration
    fn create(
        &self,
        config: &crate::config::ActivitySourceConfig,
    ) -> Result<Box<dyn ActivitySource>, crate::Error>;
}
