pub(crate) fn default_initial_stall_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_max_stall_timeout_ms() -> u64 {
    480_000
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

/// Floor applied when clamping a configured initial timeout.
pub(crate) const MIN_STALL_TIMEOUT_MS: u64 = 100;
