use super::{CaptureKey, CaptureTarget};
use crate::layout::{DisplaySettings, Viewport};
use crate::library::PageCfi;

/// Signals dispatched into the capture controller. Renderer callbacks, timer
/// firings, and upstream state changes all arrive through here; the
/// controller itself never polls anything.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The book registry changed: download status, spine data, or removal.
    LibraryChanged,
    /// The window was resized or rotated.
    ViewportChanged(Viewport),
    /// Reader display settings changed.
    SettingsChanged(DisplaySettings),
    /// Host pause gate: `true` while the reader is not ready or the user is
    /// actively interacting with the foreground page.
    SuspendChanged(bool),
    /// Renderer liveness signal for the identified unit of work.
    RendererProgress { target: CaptureTarget },
    /// Renderer finished measuring a spine; its page breaks are ready.
    RendererFinished {
        target: CaptureTarget,
        page_cfis: Vec<PageCfi>,
    },
    /// The stall-detection timer armed for `key` fired.
    StallElapsed { key: CaptureKey, epoch: u64 },
    /// The backoff for a skip-listed key expired.
    RetryElapsed { key: CaptureKey },
}
