// # presence-source-pihole
//
// Activity source backed by the Pi-hole FTL long-term query database.
//
// ## How a device is found
//
// Pi-hole keeps host names per address in `network_addresses` and every DNS
// query with its client address in `queries`. A device's last observation
// is the newest query whose client address belongs to the device name:
//
// ```sql
// SELECT queries.client, CAST(queries.timestamp AS INTEGER)
// FROM network_addresses
// JOIN queries ON network_addresses.ip = queries.client
// WHERE lower(network_addresses.name) = lower(?1)
// ORDER BY queries.timestamp DESC
// LIMIT 1
// ```
//
// The database is opened read-only; FTL stays the single writer.

use async_trait::async_trait;
use presence_core::config::ActivitySourceConfig;
use presence_core::registry::ComponentRegistry;
use presence_core::traits::{ActivitySource, ActivitySourceFactory, Observation};
use presence_core::Error;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const LAST_SEEN_QUERY: &str = "SELECT queries.client, CAST(queries.timestamp AS INTEGER) \
     FROM network_addresses \
     JOIN queries ON network_addresses.ip = queries.client \
     WHERE lower(network_addresses.name) = lower(?1) \
     ORDER BY queries.timestamp DESC \
     LIMIT 1";

/// How long to wait for FTL's write lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Activity source reading `pihole-FTL.db`
///
/// Every lookup opens its own read-only connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct PiholeActivitySource {
    db_path: PathBuf,
}

impl PiholeActivitySource {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn query_last_seen(db_path: &Path, device: &str) -> Result<Option<Observation>, Error> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            Error::activity_source(format!(
                "Failed to open Pi-hole database {}: {}",
                db_path.display(),
                e
            ))
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::activity_source(format!("Failed to set busy timeout: {}", e)))?;

        conn.query_row(LAST_SEEN_QUERY, params![device], |row| {
            Ok(Observation::new(
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
            ))
        })
        .optional()
        .map_err(|e| {
            Error::activity_source(format!("Failed to query last activity of {}: {}", device, e))
        })
    }
}

#[async_trait]
impl ActivitySource for PiholeActivitySource {
    async fn last_seen(&self, device: &str) -> Result<Option<Observation>, Error> {
        debug!("Loading last activity of {} from {}", device, self.db_path.display());

        let db_path = self.db_path.clone();
        let name = device.to_string();

        tokio::task::spawn_blocking(move || Self::query_last_seen(&db_path, &name))
            .await
            .map_err(|e| Error::activity_source(format!("Lookup task failed: {}", e)))?
    }

    fn source_name(&self) -> &'static str {
        "pihole"
    }
}

/// Factory for [`PiholeActivitySource`]
pub struct PiholeActivitySourceFactory;

impl ActivitySourceFactory for PiholeActivitySourceFactory {
    fn create(&self, config: &ActivitySourceConfig) -> Result<Box<dyn ActivitySource>, Error> {
        match config {
            ActivitySourceConfig::Pihole { db_path } => {
                Ok(Box::new(PiholeActivitySource::new(db_path)))
            }
            other => Err(Error::config(format!(
                "Pi-hole source cannot be built from a {} configuration",
                other.type_name()
            ))),
        }
    }
}

/// Register the `pihole` activity source
pub fn register(registry: &ComponentRegistry) {
    registry.register_activity_source("pihole", Box::new(PiholeActivitySourceFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    /// Build a database with the FTL tables this source reads
    fn fixture(rows: &[(&str, &str)], queries: &[(&str, i64)]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pihole-FTL.db");
        let conn = Connection::open(&path).unwrap();

        conn.execute_batch(
            "CREATE TABLE network_addresses (
                network_id INTEGER NOT NULL,
                ip TEXT UNIQUE NOT NULL,
                lastSeen INTEGER NOT NULL DEFAULT 0,
                name TEXT,
                nameUpdated INTEGER
            );
            CREATE TABLE queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                type INTEGER NOT NULL,
                status INTEGER NOT NULL,
                domain TEXT NOT NULL,
                client TEXT NOT NULL,
                forward TEXT
            );",
        )
        .unwrap();

        for (i, (ip, name)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO network_addresses (network_id, ip, name) VALUES (?1, ?2, ?3)",
                params![i as i64, ip, name],
            )
            .unwrap();
        }

        for (client, ts) in queries {
            conn.execute(
                "INSERT INTO queries (timestamp, type, status, domain, client) \
                 VALUES (?1, 1, 2, 'example.com', ?2)",
                params![ts, client],
            )
            .unwrap();
        }

        (dir, path)
    }

    #[tokio::test]
    async fn test_returns_most_recent_query() {
        let (_dir, path) = fixture(
            &[("192.168.1.50", "phone"), ("192.168.1.60", "laptop")],
            &[
                ("192.168.1.50", 1_000),
                ("192.168.1.50", 3_000),
                ("192.168.1.50", 2_000),
                ("192.168.1.60", 9_000),
            ],
        );
        let source = PiholeActivitySource::new(&path);

        let observation = source.last_seen("phone").await.unwrap();
        assert_eq!(observation, Some(Observation::new("192.168.1.50", 3_000)));
    }

    #[tokio::test]
    async fn test_name_match_is_case_insensitive() {
        let (_dir, path) = fixture(&[("192.168.1.50", "phone")], &[("192.168.1.50", 1_000)]);
        let source = PiholeActivitySource::new(&path);

        let observation = source.last_seen("Phone").await.unwrap();
        assert_eq!(observation.map(|o| o.last_seen), Some(1_000));
    }

    #[tokio::test]
    async fn test_device_with_several_addresses() {
        let (_dir, path) = fixture(
            &[("192.168.1.50", "phone"), ("fe80::1", "phone")],
            &[("192.168.1.50", 1_000), ("fe80::1", 1_500)],
        );
        let source = PiholeActivitySource::new(&path);

        let observation = source.last_seen("phone").await.unwrap().unwrap();
        assert_eq!(observation.client, "fe80::1");
        assert_eq!(observation.last_seen, 1_500);
    }

    #[tokio::test]
    async fn test_unknown_or_silent_device_is_none() {
        let (_dir, path) = fixture(&[("192.168.1.50", "phone")], &[]);
        let source = PiholeActivitySource::new(&path);

        assert_eq!(source.last_seen("phone").await.unwrap(), None);
        assert_eq!(source.last_seen("tablet").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_name_is_bound_not_interpolated() {
        let (_dir, path) = fixture(&[("192.168.1.50", "phone")], &[("192.168.1.50", 1_000)]);
        let source = PiholeActivitySource::new(&path);

        let observation = source.last_seen("x' OR '1'='1").await.unwrap();
        assert_eq!(observation, None);
    }

    #[tokio::test]
    async fn test_missing_database_is_source_error() {
        let dir = tempdir().unwrap();
        let source = PiholeActivitySource::new(dir.path().join("absent.db"));

        let result = source.last_seen("phone").await;
        assert!(matches!(result, Err(Error::ActivitySource(_))));
    }

    #[test]
    fn test_register_and_create() {
        let registry = ComponentRegistry::new();
        register(&registry);
        assert!(registry.has_activity_source("pihole"));

        let source = registry
            .create_activity_source(&ActivitySourceConfig::Pihole {
                db_path: "/tmp/pihole-FTL.db".to_string(),
            })
            .unwrap();
        assert_eq!(source.source_name(), "pihole");
    }
}
