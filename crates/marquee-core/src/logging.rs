//! Logging configuration and subscriber setup.
//!
//! Console output goes to stderr, file output goes through a non-blocking
//! writer into a dated file inside [`LogConfig::log_dir`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

const LOG_FILE_PREFIX: &str = "marquee_";
const LOG_FILE_SUFFIX: &str = ".log";

/// Targets affected by [`LogConfig::pipeline_level`]
const PIPELINE_TARGETS: [&str; 2] = ["marquee_media::controller", "marquee_media::bus"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level directive: trace, debug, info, warn or error
    pub level: String,
    /// Directory that receives the log files
    pub log_dir: PathBuf,
    /// Number of log files kept around, including the current one
    pub max_files: usize,
    pub console_output: bool,
    pub file_output: bool,
    /// Separate level for the dispatch loop, which is chatty at debug
    pub pipeline_level: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = dirs::data_local_dir()
            .map(|dir| dir.join("marquee").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));

        Self {
            level: "info".to_string(),
            log_dir,
            max_files: 10,
            console_output: true,
            file_output: true,
            pipeline_level: None,
        }
    }
}

impl LogConfig {
    /// Parse the configured level, falling back to INFO
    pub fn parse_level(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::INFO,
        }
    }

    /// Filter for one output layer. `RUST_LOG` replaces every configured
    /// directive when set.
    pub fn env_filter(&self) -> EnvFilter {
        let filter = EnvFilter::builder()
            .with_default_directive(self.parse_level().into())
            .from_env_lossy();
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return filter;
        }
        self.pipeline_directives()
            .into_iter()
            .fold(filter, |filter, directive| filter.add_directive(directive))
    }

    fn pipeline_directives(&self) -> Vec<Directive> {
        let Some(level) = self.pipeline_level.as_deref() else {
            return Vec::new();
        };
        PIPELINE_TARGETS
            .iter()
            .filter_map(|target| format!("{}={}", target, level.trim()).parse().ok())
            .collect()
    }

    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.log_dir)
    }

    /// Path of today's log file
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d");
        self.log_dir
            .join(format!("{}{}{}", LOG_FILE_PREFIX, stamp, LOG_FILE_SUFFIX))
    }

    /// Delete the oldest log files so that at most `max_files - 1` remain,
    /// leaving room for the file about to be written.
    ///
    /// Returns the number of files removed.
    pub fn cleanup_old_logs(&self) -> std::io::Result<usize> {
        if !self.log_dir.exists() {
            return Ok(0);
        }

        let current = self.current_log_path();
        let mut logs = Vec::new();
        for entry in fs::read_dir(&self.log_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(LOG_FILE_SUFFIX))
                .unwrap_or(false);
            if !is_log || path == current {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            logs.push((modified, path));
        }

        let keep = self.max_files.saturating_sub(1);
        if logs.len() <= keep {
            return Ok(0);
        }

        logs.sort_by(|a, b| a.0.cmp(&b.0));
        let excess = logs.len() - keep;
        for (_, path) in logs.iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }
}

/// Keeps the non-blocking file writer flushing until dropped
pub struct LogGuard {
    log_file: Option<PathBuf>,
    _writer: Option<WorkerGuard>,
}

impl LogGuard {
    /// File receiving log output, `None` when file output is off
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(config: &LogConfig) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(config.env_filter())
        .boxed()
}

fn file_layer(config: &LogConfig) -> Result<(BoxedLayer, PathBuf, WorkerGuard)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;
    match config.cleanup_old_logs() {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {} old log file(s)", removed),
        Err(e) => eprintln!("Warning: failed to prune old log files: {}", e),
    }

    let path = config.current_log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(config.env_filter())
        .boxed();
    Ok((layer, path, guard))
}

/// Install the global subscriber described by `config`.
///
/// Fails if another subscriber is already installed. Drop the returned guard
/// only when the process no longer needs file logging.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = LogGuard {
        log_file: None,
        _writer: None,
    };

    if config.console_output {
        layers.push(console_layer(config));
    }
    if config.file_output {
        let (layer, path, writer) = file_layer(config)?;
        layers.push(layer);
        guard.log_file = Some(path);
        guard._writer = Some(writer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!("Logging initialized at level {}", config.level);
    if let Some(path) = guard.log_file() {
        tracing::info!("Writing log to {:?}", path);
    }
    Ok(guard)
}
