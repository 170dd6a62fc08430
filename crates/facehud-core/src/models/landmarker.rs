//! 68-point landmark estimator.
//!
//! Crops an expanded square region around a detected face, resizes it to the
//! model input, and maps the normalized output coordinates back into frame
//! space.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ort::value::TensorRef;

use super::session::{extract_output, open_session, rgb_to_nchw};
use super::{InferenceError, ModelError};
use crate::types::{FaceBox, Landmarks, LANDMARK_POINTS};

const INPUT_SIZE: u32 = 112;
/// Expansion applied to the detection box before cropping, so jaw and brow
/// points fall inside the crop.
const CROP_EXPANSION: f32 = 0.10;

/// The crop window actually used, in frame coordinates.
#[derive(Debug, Clone, Copy)]
struct CropWindow {
    x: u32,
    y: u32,
    side: u32,
}

impl CropWindow {
    /// Square window centered on the face box, expanded and clamped to the
    /// frame.
    fn around(face: &FaceBox, frame_w: u32, frame_h: u32) -> Self {
        let side = face.width.max(face.height) * (1.0 + CROP_EXPANSION);
        let side = side.max(1.0).min(frame_w.min(frame_h) as f32);

        let cx = face.x + face.width / 2.0;
        let cy = face.y + face.height / 2.0;
        let x = (cx - side / 2.0).clamp(0.0, frame_w as f32 - side);
        let y = (cy - side / 2.0).clamp(0.0, frame_h as f32 - side);

        Self { x: x as u32, y: y as u32, side: side as u32 }
    }
}

pub struct LandmarkNet {
    session: ort::session::Session,
}

impl LandmarkNet {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = open_session(path)?;
        Ok(Self { session })
    }

    /// Estimate the 68-point landmark set for one detected face.
    pub fn estimate(
        &mut self,
        frame: &RgbImage,
        face: &FaceBox,
    ) -> Result<Landmarks, InferenceError> {
        let window = CropWindow::around(face, frame.width(), frame.height());

        let crop = image::imageops::crop_imm(frame, window.x, window.y, window.side, window.side)
            .to_image();
        let resized = image::imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        // Landmark nets train on [0, 1] inputs.
        let input = rgb_to_nchw(
            resized.as_raw(),
            INPUT_SIZE as usize,
            INPUT_SIZE as usize,
            0.0,
            255.0,
        );

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let raw = extract_output(&outputs, 0, "landmark coordinates")?;

        if raw.len() != LANDMARK_POINTS * 2 {
            return Err(InferenceError::Failed(format!(
                "expected {} landmark coordinates, got {}",
                LANDMARK_POINTS * 2,
                raw.len()
            )));
        }

        // Outputs are (x, y) pairs normalized to the crop.
        let side = window.side as f32;
        let points = raw
            .chunks_exact(2)
            .map(|p| (window.x as f32 + p[0] * side, window.y as f32 + p[1] * side))
            .collect();

        Ok(Landmarks { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_window_contains_face() {
        let face = FaceBox { x: 100.0, y: 80.0, width: 60.0, height: 80.0, confidence: 0.9 };
        let w = CropWindow::around(&face, 640, 480);

        assert!(w.x as f32 <= face.x);
        assert!(w.y as f32 <= face.y);
        assert!((w.x + w.side) as f32 >= face.right());
        assert!((w.y + w.side) as f32 >= face.bottom());
    }

    #[test]
    fn test_crop_window_clamped_at_edges() {
        // Face flush against the top-left corner.
        let face = FaceBox { x: 0.0, y: 0.0, width: 50.0, height: 50.0, confidence: 0.9 };
        let w = CropWindow::around(&face, 640, 480);

        assert_eq!(w.x, 0);
        assert_eq!(w.y, 0);
        assert!(w.x + w.side <= 640);
        assert!(w.y + w.side <= 480);
    }

    #[test]
    fn test_crop_window_never_exceeds_frame() {
        // A face box larger than the frame's short side.
        let face = FaceBox { x: 10.0, y: 10.0, width: 600.0, height: 600.0, confidence: 0.9 };
        let w = CropWindow::around(&face, 640, 480);

        assert!(w.side <= 480);
        assert!(w.x + w.side <= 640);
        assert!(w.y + w.side <= 480);
    }
}
