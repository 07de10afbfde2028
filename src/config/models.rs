use serde::Deserialize;
use std::time::Duration;

/// Capture pipeline configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CaptureConfig {
    /// First stall allowance for a spine capture, in milliseconds. Doubles
    /// on every consecutive stall of the same capture key.
    #[serde(default = "crate::config::defaults::default_initial_stall_timeout_ms")]
    pub initial_stall_timeout_ms: u64,
    /// Backoff ceiling, in milliseconds.
    #[serde(default = "crate::config::defaults::default_max_stall_timeout_ms")]
    pub max_stall_timeout_ms: u64,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            initial_stall_timeout_ms: crate::config::defaults::default_initial_stall_timeout_ms(),
            max_stall_timeout_ms: crate::config::defaults::default_max_stall_timeout_ms(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl CaptureConfig {
    pub fn initial_stall_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_stall_timeout_ms)
    }

    pub fn max_stall_timeout(&self) -> Duration {
        Duration::from_millis(self.max_stall_timeout_ms)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
