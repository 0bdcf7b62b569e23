//! Structured logging setup
//!
//! Every [`Remote`](crate::remote::Remote) owns a span named
//! [`span_names::REMOTE`] carrying its host and display name; connect,
//! disconnect, health checks and actions open child spans under it, so log
//! lines from concurrent remotes stay attributable.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

static TRACING_CONFIG: OnceLock<TracingConfig> = OnceLock::new();

/// Crates whose events the default filter lets through
const LOG_TARGETS: [&str; 2] = ["remotectl_core", "remotectl"];

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// The subscriber could not be installed or the filter is invalid
    #[error("Failed to initialize tracing: {0}")]
    InitializationFailed(String),

    /// Tracing was initialized before
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// The log file could not be created
    #[error("Failed to create log file: {0}")]
    FileCreationFailed(String),
}

/// Result type for tracing operations
pub type TracingResult<T> = Result<T, TracingError>;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TracingLevel {
    /// Errors only
    Error,
    /// Errors and warnings
    Warn,
    /// Connection changes and actions (default)
    #[default]
    Info,
    /// State changes and sensor updates
    Debug,
    /// Every executed command
    Trace,
}

impl TracingLevel {
    /// Converts to tracing crate's Level
    #[must_use]
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Maps CLI flags to a level: `quiet` wins, each `-v` steps up from info
    #[must_use]
    pub const fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Error;
        }
        match verbose {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard output
    Stdout,
    /// Standard error
    #[default]
    Stderr,
    /// A file, truncated on startup
    File(PathBuf),
}

/// Configuration for [`init_tracing`]
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Log level for this crate and the CLI
    pub level: TracingLevel,
    /// Output destination
    pub output: TracingOutput,
    /// Whether to print thread ids
    pub thread_ids: bool,
    /// Custom `EnvFilter` directive, overrides `level`
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Creates a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables thread ids
    #[must_use]
    pub const fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Sets a custom filter directive, e.g. `remotectl_core=trace,tokio=warn`
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Filter directive applied when no custom filter is set
    #[must_use]
    pub fn default_directive(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> TracingResult<EnvFilter> {
        let directive = self
            .filter
            .clone()
            .unwrap_or_else(|| self.default_directive());
        EnvFilter::try_new(directive).map_err(|e| TracingError::InitializationFailed(e.to_string()))
    }

    fn writer(&self) -> TracingResult<(BoxMakeWriter, bool)> {
        Ok(match &self.output {
            TracingOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
            TracingOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
            TracingOutput::File(path) => {
                let file = std::fs::File::create(path)
                    .map_err(|e| TracingError::FileCreationFailed(format!("{}: {e}", path.display())))?;
                (BoxMakeWriter::new(std::sync::Arc::new(file)), false)
            }
        })
    }
}

/// Installs the global subscriber
///
/// Call once at startup.
///
/// # Errors
///
/// Returns an error if tracing was already initialized, the filter is
/// invalid, or the log file cannot be created.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(TracingError::AlreadyInitialized);
    }

    let result = install(config);
    if result.is_err() {
        TRACING_INITIALIZED.store(false, Ordering::SeqCst);
    }
    result
}

fn install(config: &TracingConfig) -> TracingResult<()> {
    let filter = config.env_filter()?;
    let (writer, ansi) = config.writer()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(config.thread_ids)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .try_init()
        .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;

    let _ = TRACING_CONFIG.set(config.clone());
    tracing::debug!(level = %config.level, "Tracing initialized");
    Ok(())
}

/// Checks if tracing has been initialized
#[must_use]
pub fn is_tracing_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::SeqCst)
}

/// The configuration passed to the successful [`init_tracing`] call
#[must_use]
pub fn get_tracing_config() -> Option<&'static TracingConfig> {
    TRACING_CONFIG.get()
}

/// Span names used across the crate
pub mod span_names {
    /// Root span of one remote
    pub const REMOTE: &str = "remote";
    /// Opening the SSH session
    pub const CONNECT: &str = "remote.connect";
    /// Closing the SSH session
    pub const DISCONNECT: &str = "remote.disconnect";
    /// One health-check tick
    pub const HEALTH_CHECK: &str = "remote.health_check";
    /// Running an action command
    pub const COMMAND: &str = "remote.command";
    /// Reading the remotes file
    pub const CONFIG_LOAD: &str = "config.load";
}
