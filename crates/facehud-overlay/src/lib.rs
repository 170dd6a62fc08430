//! facehud-overlay — the annotation render surface.
//!
//! An RGBA canvas sized to the display resolution, with the clear/box/
//! landmark/text primitives the annotation loop draws with, plus the
//! geometry transform from processing resolution to display resolution.

pub mod geometry;
pub mod surface;
pub mod text;

use std::path::Path;

use ab_glyph::FontArc;
use thiserror::Error;

pub use geometry::Viewport;
pub use surface::OverlaySurface;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to load font {path}: {reason}")]
    FontLoad { path: String, reason: String },
}

/// Load a TTF/OTF font for overlay text.
pub fn load_font(path: &Path) -> Result<FontArc, OverlayError> {
    let bytes = std::fs::read(path).map_err(|e| OverlayError::FontLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    FontArc::try_from_vec(bytes).map_err(|e| OverlayError::FontLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
