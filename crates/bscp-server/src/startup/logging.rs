//! Multi-file logging.
//!
//! Every event goes to the console and to `bscp.log`. Component files receive
//! the events whose `tracing` target starts with one of their prefixes:
//!
//! | Log File          | Component                              | Target Prefixes                                   |
//! |-------------------|----------------------------------------|---------------------------------------------------|
//! | bscp.log          | Root logger                            | (all)                                             |
//! | release.log       | Commits, releases, strategies          | bscp_release                                      |
//! | signalling.log    | Bus hand-off and session fan-out       | bscp_core::service::signalling, bscp_release::service::publish |
//! | remote.log        | gRPC handlers and sessions             | bscp_core, bscp_server::service                   |
//! | persistence.log   | Shard routing and schema               | bscp_persistence                                  |
//!
//! Files live in `~/bscp/logs` unless `bscp.log.dir` or `BSCP_LOG_DIR` says
//! otherwise.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const ROOT_LOG_FILE: &str = "bscp.log";

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "release.log",
        targets: &["bscp_release"],
    },
    ComponentLogDef {
        file_name: "signalling.log",
        targets: &[
            "bscp_core::service::signalling",
            "bscp_release::service::publish",
        ],
    },
    ComponentLogDef {
        file_name: "remote.log",
        targets: &["bscp_core", "bscp_server::service"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["bscp_persistence"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/bscp/logs", home))
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
    ) -> Self {
        let level = level.parse().unwrap_or(Level::INFO);

        Self {
            log_dir: log_dir.map(PathBuf::from).unwrap_or_else(default_log_dir),
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation: LogRotation::Daily,
        }
    }

    /// Apply `BSCP_LOG_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("BSCP_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(v) = var("BSCP_LOG_CONSOLE") {
            self.console_output = v.to_lowercase() != "false" && v != "0";
        }
        if let Some(v) = var("BSCP_LOG_FILE") {
            self.file_logging = v.to_lowercase() == "true" || v == "1";
        }
        if let Some(level) = var("BSCP_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.console_level = level;
            self.file_level = level;
        }
        if let Some(level) = var("BSCP_LOG_FILE_LEVEL").and_then(|v| v.parse().ok()) {
            self.file_level = level;
        }
        if let Some(v) = var("BSCP_LOG_ROTATION") {
            self.rotation = match v.to_lowercase().as_str() {
                "hourly" => LogRotation::Hourly,
                "never" => LogRotation::Never,
                _ => LogRotation::Daily,
            };
        }
    }
}

/// Keeps the non-blocking file writers alive; dropping it flushes them.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Install the global subscriber: console, root file and component files.
///
/// `RUST_LOG` takes precedence over the configured level for the console and
/// root file. Component files use per-layer [`Targets`] filters.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        layers.push(Box::new(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_filter(filter),
        ));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        layers.push(Box::new(
            fmt::layer()
                .with_writer(root_nb)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_filter(root_filter),
        ));

        let level: LevelFilter = config.file_level.into();
        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let targets = component
                .targets
                .iter()
                .fold(Targets::new(), |targets, target| {
                    targets.with_target(*target, level)
                });

            layers.push(Box::new(
                fmt::layer()
                    .with_writer(nb)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_filter(targets),
            ));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
