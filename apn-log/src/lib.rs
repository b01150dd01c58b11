//! APN Logging
//!
//! Installs a `tracing` subscriber configured from `APN_*` environment
//! variables. Library crates only emit events; binaries and workers call
//! [`init`] once at startup.
//!
//! # Usage
//!
//! ```rust
//! apn_log::init();
//! tracing::info!(port = 2195, "Gateway configured");
//! ```
//!
//! # Environment Variables
//!
//! - `APN_DEBUG=1` - Enable debug logging
//! - `APN_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `APN_LOG_FORMAT=pretty|json|compact` - Set output format (default `json`)
//! - `APN_LOG_COLOR=1|0` - Enable/disable colors
//!
//! `RUST_LOG`, when set, takes precedence over the level.

use once_cell::sync::{Lazy, OnceCell};
use std::env;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get level from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false, // JSON output doesn't use colors
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key).map(|v| {
                let v = v.trim().to_lowercase();
                v == "1" || v == "true"
            })
        };

        let debug = flag("APN_DEBUG").unwrap_or(false);

        let level = lookup("APN_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("APN_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("APN_LOG_COLOR").unwrap_or_else(|| {
            format != Format::Json && lookup("NO_COLOR").is_none() && lookup("TERM").is_some()
        });

        Self {
            debug,
            level,
            format,
            color,
        }
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

/// The configuration read from the process environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Public API
// ============================================================================

/// Install the global subscriber from [`config`].
///
/// Returns whether a subscriber from this crate is installed. Later calls
/// are no-ops, and a subscriber installed elsewhere is left alone.
pub fn init() -> bool {
    init_with(config())
}

/// Install the global subscriber from an explicit configuration.
pub fn init_with(config: &LogConfig) -> bool {
    *INSTALLED.get_or_init(|| install(config))
}

fn install(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_ansi(config.color)
        .with_writer(std::io::stderr);

    let result = match config.format {
        Format::Json => builder.json().try_init(),
        Format::Pretty => builder.pretty().try_init(),
        Format::Compact => builder.compact().try_init(),
    };
    result.is_ok()
}

// ============================================================================
// Tests
// ============================================================================
