//! Page-snapshot capture pipeline for an EPUB reader.
//!
//! Books arrive in a registry ([`Library`]); every downloaded book's spines
//! need their page-break positions ("page CFIs") measured for the current
//! viewport and display settings, in both orientations, by an external
//! renderer. This crate schedules that background work: it picks one spine
//! at a time ([`select_next`]), drives the session through an explicit
//! state machine ([`CaptureController`]), detects stalls with a timeout,
//! backs a stalled spine off exponentially ([`capture::SkipList`]) instead
//! of letting it wedge the queue, and writes finished page breaks back into
//! the registry.
//!
//! The controller is sans-IO: events in, effects out. The host wires the
//! effects to its renderer and to a timer source — [`timer::TimerQueue`]
//! works for simulations and tests — and feeds the resulting signals back
//! in as events. See `src/bin/sim.rs` for a complete wiring.

pub mod capture;
pub mod config;
pub mod layout;
pub mod library;
pub mod timer;

pub use capture::{
    CaptureController, CaptureEvent, CaptureKey, CaptureTarget, Effect, Phase, SkipList,
    select_next,
};
pub use config::{CaptureConfig, LogLevel};
pub use layout::{DisplaySettings, PageDimensions, Viewport};
pub use library::{Book, BookId, DownloadStatus, Library, PageCfi, Spine};
