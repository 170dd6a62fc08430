//! Snapshot sink: writes the composited frame for an external viewer.
//!
//! Writes go to a temp file first and land via rename, so a viewer polling
//! the path never sees a half-written image.

use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;

pub struct SnapshotSink {
    path: PathBuf,
    staging: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: PathBuf) -> Self {
        let mut staging = path.clone();
        staging.set_extension("tmp.png");
        Self { path, staging }
    }

    /// Write one annotated frame. Failures are logged, never propagated —
    /// a missed snapshot must not abandon the tick that produced it.
    pub fn write(&self, frame: &RgbImage) {
        if let Err(err) = self.try_write(frame) {
            tracing::warn!(path = %self.path.display(), error = %err, "snapshot write failed");
        }
    }

    fn try_write(&self, frame: &RgbImage) -> Result<()> {
        frame.save_with_format(&self.staging, image::ImageFormat::Png)?;
        std::fs::rename(&self.staging, &self.path)?;
        Ok(())
    }
}
