// # presenced - Presence Runner
//
// One-shot integration binary. Each invocation:
// 1. Reads process settings from environment variables
// 2. Initializes logging
// 3. Loads the JSON configuration
// 4. Registers activity sources, state stores and notifiers
// 5. Runs exactly one presence cycle and exits
//
// Scheduling is external (cron, systemd timer). Presence logic lives in
// presence-core; nothing here classifies or reconciles.
//
// ## Environment
//
// - `PRESENCED_CONFIG`: Path to the JSON configuration (default `config.json`)
// - `PRESENCED_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `PRESENCED_LOG_FILE`: Optional file that mirrors the log output
//
// ## Example
//
// ```bash
// export PRESENCED_CONFIG=/etc/presenced/config.json
// export PRESENCED_LOG_FILE=/var/log/presenced.log
//
// presenced
// ```

use anyhow::Result;
use presence_core::config::PresenceConfig;
use presence_core::engine::EngineEvent;
use presence_core::traits::Notifier;
use presence_core::{ComponentRegistry, PresenceEngine};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Subject used when a fatal error is reported through the notifier
const FATAL_SUBJECT: &str = "presenced";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean run
/// - 1: Configuration or startup error
/// - 2: Runtime error
/// - 3: Run completed but a notification was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresencedExitCode {
    CleanRun = 0,
    ConfigError = 1,
    RuntimeError = 2,
    DeliveryFailure = 3,
}

impl From<PresencedExitCode> for ExitCode {
    fn from(code: PresencedExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    config_path: PathBuf,
    log_level: String,
    log_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: lookup("PRESENCED_CONFIG")
                .unwrap_or_else(|| "config.json".to_string())
                .into(),
            log_level: lookup("PRESENCED_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_file: lookup("PRESENCED_LOG_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config_path.as_os_str().is_empty() {
            anyhow::bail!("PRESENCED_CONFIG cannot be empty");
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "PRESENCED_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        if let Some(ref path) = self.log_file {
            if path.file_name().is_none() {
                anyhow::bail!("PRESENCED_LOG_FILE must name a file: {}", path.display());
            }

            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "PRESENCED_LOG_FILE parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        Ok(())
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber
///
/// Output goes to stdout and, when configured, is mirrored to a log file.
/// The returned guard flushes the file writer on drop.
fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let level = parse_level(&settings.log_level).unwrap_or(Level::INFO);

    let (writer, guard) = match settings.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            (
                BoxMakeWriter::new(std::io::stdout.and(file_writer)),
                Some(guard),
            )
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(settings.log_file.is_none())
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(guard)
}

fn main() -> ExitCode {
    let settings = Settings::from_env();

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PresencedExitCode::ConfigError.into();
    }

    let _log_guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return PresencedExitCode::ConfigError.into();
        }
    };

    info!("Run started");

    // One cycle, sequential I/O
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            info!("Run ended");
            return PresencedExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(run(&settings));
    info!("Run ended");
    code.into()
}

/// Registry with every component this build ships
fn build_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::with_builtins();

    #[cfg(feature = "pihole")]
    presence_source_pihole::register(&registry);

    #[cfg(feature = "smtp")]
    presence_notify_smtp::register(&registry);

    debug!(
        "Registered sources: {:?}, stores: {:?}, notifiers: {:?}",
        registry.list_activity_sources(),
        registry.list_state_stores(),
        registry.list_notifiers()
    );

    registry
}

/// Load configuration, build the notifier and run one cycle
async fn run(settings: &Settings) -> PresencedExitCode {
    let config = match PresenceConfig::from_file(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "Failed to load configuration from {}: {}",
                settings.config_path.display(),
                e
            );
            return PresencedExitCode::ConfigError;
        }
    };

    info!(
        "Configuration loaded: {} device(s), threshold {} min",
        config.enabled_devices().count(),
        config.last_seen_delta_mins
    );

    let registry = build_registry();

    let notifier = match registry.create_notifier(&config.notifier) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!(
                "Failed to create {} notifier: {}",
                config.notifier.type_name(),
                e
            );
            return PresencedExitCode::ConfigError;
        }
    };

    execute(&registry, config, notifier).await
}

/// Wire the remaining components around `notifier` and run one cycle
///
/// Every failure from here on is also reported through `notifier`.
async fn execute(
    registry: &ComponentRegistry,
    config: PresenceConfig,
    notifier: Box<dyn Notifier>,
) -> PresencedExitCode {
    let source = match registry.create_activity_source(&config.activity_source) {
        Ok(source) => source,
        Err(e) => {
            let err = anyhow::Error::from(e).context("Startup failed");
            report_fatal(notifier.as_ref(), &err).await;
            return PresencedExitCode::ConfigError;
        }
    };

    let store = match registry.create_state_store(&config.state_store).await {
        Ok(store) => store,
        Err(e) => {
            let err = anyhow::Error::from(e).context("Startup failed");
            report_fatal(notifier.as_ref(), &err).await;
            return PresencedExitCode::ConfigError;
        }
    };

    let (engine, mut events) = match PresenceEngine::new(source, store, notifier, config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to create presence engine: {}", e);
            return PresencedExitCode::ConfigError;
        }
    };

    let result = engine.run_once().await;

    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }

    match result {
        Ok(report) if report.is_clean() => {
            info!(
                "Evaluated {} device(s), {} transition(s)",
                report.outcomes.len(),
                report.transitions.len()
            );
            PresencedExitCode::CleanRun
        }
        Ok(report) => {
            warn!(
                "{} of {} notification(s) not delivered",
                report.delivery_failures.len(),
                report.transitions.len()
            );
            PresencedExitCode::DeliveryFailure
        }
        Err(e) => {
            let err = anyhow::Error::from(e).context("Run failed");
            report_fatal(engine.notifier(), &err).await;
            PresencedExitCode::RuntimeError
        }
    }
}

/// Log a fatal error and send it through the notifier
///
/// Subject is `presenced`, body is the full error chain. A delivery failure
/// is logged and otherwise ignored.
async fn report_fatal(notifier: &dyn Notifier, err: &anyhow::Error) {
    error!("{:#}", err);

    if let Err(e) = notifier.notify(FATAL_SUBJECT, &format!("{:#}", err)).await {
        error!(
            "Failed to report error via {}: {}",
            notifier.notifier_name(),
            e
        );
    }
}

fn log_event(event: &EngineEvent) {
    debug!(?event, "Engine event");
}
