//! Configuration loading for the capture pipeline.
//!
//! All tunables are centralized here and loaded from `conf/config.toml` if
//! present. Any missing or invalid entries fall back to sensible defaults so
//! the pipeline can always start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config};
pub use models::{CaptureConfig, LogLevel};
