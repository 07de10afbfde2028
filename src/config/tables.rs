use super::defaults;
use super::models::{CaptureConfig, LogLevel};
use serde::Deserialize;

/// On-disk layout: the flat [`CaptureConfig`] is split into TOML tables.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    capture: CaptureTable,
    #[serde(default)]
    logging: LoggingTable,
}

impl From<ConfigTables> for CaptureConfig {
    fn from(tables: ConfigTables) -> Self {
        CaptureConfig {
            initial_stall_timeout_ms: tables.capture.initial_stall_timeout_ms,
            max_stall_timeout_ms: tables.capture.max_stall_timeout_ms,
            log_level: tables.logging.log_level,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct CaptureTable {
    #[serde(default = "defaults::default_initial_stall_timeout_ms")]
    initial_stall_timeout_ms: u64,
    #[serde(default = "defaults::default_max_stall_timeout_ms")]
    max_stall_timeout_ms: u64,
}

impl Default for CaptureTable {
    fn default() -> Self {
        CaptureTable {
            initial_stall_timeout_ms: defaults::default_initial_stall_timeout_ms(),
            max_stall_timeout_ms: defaults::default_max_stall_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingTable {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingTable {
    fn default() -> Self {
        LoggingTable {
            log_level: defaults::default_log_level(),
        }
    }
}
