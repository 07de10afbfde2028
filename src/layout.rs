//! Viewport and layout math.
//!
//! Everything in this module is a pure function of the window geometry and
//! the reader's display settings. The size key returned by [`size_key`]
//! partitions cached pagination data per layout configuration, so its format
//! must stay stable for as long as captured page breaks are kept around.

use serde::{Deserialize, Serialize};

/// Largest edge of a page thumbnail in the pages overview (points).
pub const MAX_THUMBNAIL_SIZE: f32 = 150.0;
/// Gap between adjacent page thumbnails (points).
pub const THUMBNAIL_GUTTER: f32 = 10.0;

/// Window dimensions at one orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The same window rotated a quarter turn.
    pub fn flipped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_landscape(self) -> bool {
        self.height < self.width
    }

    fn aspect(self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Reader display settings. The pipeline treats these as opaque except as a
/// size-key input: any change that affects page layout must change the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Text scale in percent (100 = publisher default).
    pub text_size: u16,
    /// Line spacing scale in percent.
    pub text_spacing: u16,
    pub theme: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            text_size: 100,
            text_spacing: 100,
            theme: "default-theme".to_string(),
        }
    }
}

/// Canonical key for cached pagination data at one viewport and one set of
/// display settings. Deterministic; no side effects.
pub fn size_key(viewport: Viewport, settings: &DisplaySettings) -> String {
    format!(
        "{}x{}_{}-{}-{}",
        viewport.width, viewport.height, settings.text_size, settings.text_spacing, settings.theme
    )
}

/// Dimensions of one page thumbnail in the pages overview grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

/// Thumbnail dimensions for the pages overview, derived from the window
/// aspect ratio. Thumbnails cap out at [`MAX_THUMBNAIL_SIZE`] on their
/// longest edge and fill the row width minus gutters.
pub fn page_dimensions(viewport: Viewport) -> PageDimensions {
    let width = viewport.width.max(1) as f32;
    let max_width = if viewport.is_landscape() {
        MAX_THUMBNAIL_SIZE
    } else {
        MAX_THUMBNAIL_SIZE * viewport.aspect()
    };
    let per_row = (width / max_width).floor().max(1.0);
    let page_width = (width - (per_row + 1.0) * THUMBNAIL_GUTTER) / per_row;
    let page_height = page_width / viewport.aspect();
    PageDimensions {
        width: page_width,
        height: page_height,
    }
}
