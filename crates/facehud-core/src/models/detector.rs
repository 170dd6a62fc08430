//! Coarse face detector.
//!
//! Anchor-free multi-stride decoder: the model emits, per stride level, a
//! score tensor and a box-offset tensor over the feature grid. Detections
//! are decoded in letterboxed input space, mapped back to frame
//! coordinates, then de-duplicated with greedy NMS.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ort::value::TensorRef;

use super::session::{extract_output, open_session, rgb_to_nchw};
use super::{InferenceError, ModelError};
use crate::types::FaceBox;

const INPUT_SIZE: u32 = 640;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
/// Minimum score for a grid cell to produce a detection.
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [u32; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: u32 = 2;

/// Output tensor layout, by position: `[0..3)` scores per stride,
/// `[3..6)` box offsets per stride.
const SCORE_BASE: usize = 0;
const BBOX_BASE: usize = 3;

/// Letterbox metadata for mapping decoded coordinates back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32) -> Self {
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: (INPUT_SIZE as f32 - scaled_w) / 2.0,
            pad_y: (INPUT_SIZE as f32 - scaled_h) / 2.0,
        }
    }

    /// Map a point from letterboxed input space back to frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

pub struct FaceDetector {
    session: ort::session::Session,
}

impl FaceDetector {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = open_session(path)?;

        let num_outputs = session.outputs().len();
        if num_outputs < BBOX_BASE + STRIDES.len() {
            return Err(ModelError::Rejected(format!(
                "detector needs {} outputs (scores + boxes per stride), got {num_outputs}",
                BBOX_BASE + STRIDES.len()
            )));
        }

        Ok(Self { session })
    }

    /// Detect all faces in an RGB frame. Results are in frame pixel
    /// coordinates, sorted by confidence descending.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, InferenceError> {
        let letterbox = Letterbox::fit(frame.width(), frame.height());
        let input = self.preprocess(frame, &letterbox);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let scores = extract_output(&outputs, SCORE_BASE + level, "detector scores")?;
            let boxes = extract_output(&outputs, BBOX_BASE + level, "detector boxes")?;
            decode_level(scores, boxes, stride, &letterbox, &mut candidates);
        }

        let mut kept = nms(candidates);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }

    /// Letterbox-resize the frame into the square model input and normalize.
    fn preprocess(&self, frame: &RgbImage, letterbox: &Letterbox) -> ndarray::Array4<f32> {
        let scaled_w = ((frame.width() as f32 * letterbox.scale).round() as u32).max(1);
        let scaled_h = ((frame.height() as f32 * letterbox.scale).round() as u32).max(1);
        let scaled = image::imageops::resize(frame, scaled_w, scaled_h, FilterType::Triangle);

        // Paste onto a mean-gray canvas so padding normalizes to zero.
        let mut canvas = RgbImage::from_pixel(
            INPUT_SIZE,
            INPUT_SIZE,
            image::Rgb([INPUT_MEAN as u8; 3]),
        );
        image::imageops::replace(
            &mut canvas,
            &scaled,
            letterbox.pad_x.floor() as i64,
            letterbox.pad_y.floor() as i64,
        );

        rgb_to_nchw(
            canvas.as_raw(),
            INPUT_SIZE as usize,
            INPUT_SIZE as usize,
            INPUT_MEAN,
            INPUT_STD,
        )
    }
}

/// Decode one stride level's grid into frame-space candidate boxes.
fn decode_level(
    scores: &[f32],
    boxes: &[f32],
    stride: u32,
    letterbox: &Letterbox,
    out: &mut Vec<FaceBox>,
) {
    let grid = (INPUT_SIZE / stride) as usize;
    let cells = grid * grid * ANCHORS_PER_CELL as usize;

    for idx in 0..cells {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= SCORE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL as usize;
        let cx = (cell % grid) as f32 * stride as f32;
        let cy = (cell / grid) as f32 * stride as f32;

        // Offsets are [left, top, right, bottom] distances in stride units.
        let off = idx * 4;
        if off + 3 >= boxes.len() {
            continue;
        }
        let (x1, y1) = letterbox.unmap(
            cx - boxes[off] * stride as f32,
            cy - boxes[off + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.unmap(
            cx + boxes[off + 2] * stride as f32,
            cy + boxes[off + 3] * stride as f32,
        );

        out.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
        });
    }
}

/// Greedy NMS: highest confidence first, suppress everything overlapping it.
fn nms(mut candidates: Vec<FaceBox>) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= NMS_IOU_THRESHOLD) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, size: f32, conf: f32) -> FaceBox {
        FaceBox { x, y, width: size, height: size, confidence: conf }
    }

    #[test]
    fn test_letterbox_unmap_roundtrip() {
        let lb = Letterbox::fit(320, 240);
        let (fx, fy) = (100.0f32, 50.0f32);
        let bx = fx * lb.scale + lb.pad_x;
        let by = fy * lb.scale + lb.pad_y;
        let (rx, ry) = lb.unmap(bx, by);
        assert!((rx - fx).abs() < 0.1);
        assert!((ry - fy).abs() < 0.1);
    }

    #[test]
    fn test_letterbox_square_input_has_no_padding() {
        let lb = Letterbox::fit(640, 640);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 0.0);
        assert!((lb.scale - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_disjoint() {
        let kept = nms(vec![face(0.0, 0.0, 10.0, 0.9), face(100.0, 100.0, 10.0, 0.8)]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let kept = nms(vec![
            face(0.0, 0.0, 100.0, 0.9),
            face(5.0, 5.0, 100.0, 0.7),
            face(300.0, 300.0, 50.0, 0.6),
        ]);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![]).is_empty());
    }

    #[test]
    fn test_decode_level_thresholds() {
        let lb = Letterbox::fit(640, 640);
        let grid = (INPUT_SIZE / 32) as usize;
        let cells = grid * grid * ANCHORS_PER_CELL as usize;

        let mut scores = vec![0.0f32; cells];
        scores[0] = 0.95; // only the first anchor fires
        let boxes = vec![1.0f32; cells * 4];

        let mut out = Vec::new();
        decode_level(&scores, &boxes, 32, &lb, &mut out);
        assert_eq!(out.len(), 1);
        // Offsets of 1.0 stride units in each direction → a 64px square box.
        assert!((out[0].width - 64.0).abs() < 1e-3);
        assert!((out[0].height - 64.0).abs() < 1e-3);
        assert!((out[0].confidence - 0.95).abs() < 1e-6);
    }
}
