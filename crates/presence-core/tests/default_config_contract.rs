//! Contract Test: Minimal Configuration Persists State
//!
//! A configuration that names only devices must still remember state
//! between runs. Each run here builds its store through the registry, as
//! the daemon does.
//!
//! This suite changes the working directory, so it holds a single test
//! and runs in its own process.

mod common;

use common::*;
use presence_core::config::{DEFAULT_STATE_PATH, StateStoreConfig};
use presence_core::{ComponentRegistry, PresenceConfig, PresenceEngine};
use tempfile::tempdir;

#[tokio::test]
async fn device_only_config_notifies_once_across_runs() {
    let dir = tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let config = PresenceConfig::from_json(r#"{ "devices": [ { "name": "Phone" } ] }"#).unwrap();
    assert!(matches!(
        &config.state_store,
        StateStoreConfig::File { path } if path == DEFAULT_STATE_PATH
    ));

    let registry = ComponentRegistry::with_builtins();
    let source = ScriptedActivitySource::new();
    let notifier = RecordingNotifier::new();

    for run in 0..3i64 {
        let now = T0 + run * 60;
        source.set_last_seen("Phone", now);

        let store = registry.create_state_store(&config.state_store).await.unwrap();
        let (engine, _event_rx) = PresenceEngine::new(
            Box::new(source.clone()),
            store,
            Box::new(notifier.clone()),
            config.clone(),
        )
        .unwrap();
        engine.run_at(now).await.unwrap();
    }

    assert_eq!(notifier.subjects().len(), 1, "stable ACTIVE device notified once");
    assert!(dir.path().join(DEFAULT_STATE_PATH).exists());
}
