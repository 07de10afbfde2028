use super::defaults::MIN_STALL_TIMEOUT_MS;
use super::models::CaptureConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Load configuration from `path`, falling back to defaults when the file is
/// missing or malformed. Never fails: a broken config must not keep the
/// pipeline from starting.
pub fn load_config(path: &Path) -> CaptureConfig {
    match fs::read_to_string(path) {
        Ok(data) => match parse_config(&data) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded capture config");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), "Ignoring malformed config: {err:#}");
                CaptureConfig::default()
            }
        },
        Err(_) => {
            debug!(path = %path.display(), "No config file; using defaults");
            CaptureConfig::default()
        }
    }
}

pub fn parse_config(data: &str) -> Result<CaptureConfig> {
    let tables: ConfigTables = toml::from_str(data).context("invalid TOML in capture config")?;
    let mut config = CaptureConfig::from(tables);
    clamp_config(&mut config);
    Ok(config)
}

fn clamp_config(config: &mut CaptureConfig) {
    config.initial_stall_timeout_ms = config.initial_stall_timeout_ms.max(MIN_STALL_TIMEOUT_MS);
    config.max_stall_timeout_ms = config
        .max_stall_timeout_ms
        .max(config.initial_stall_timeout_ms);
}
