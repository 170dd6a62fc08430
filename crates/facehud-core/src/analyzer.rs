//! The analyzer seam: full per-frame analysis and single-face reference
//! analysis.
//!
//! `OnnxAnalyzer` sequences the five model capabilities; the trait lets the
//! gallery builder and the annotation loop run against deterministic stubs
//! in tests.

use image::RgbImage;
use thiserror::Error;

use crate::alignment;
use crate::models::{InferenceError, ModelBundle};
use crate::types::{Detection, FaceAttributes, ReferenceFace};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("invalid frame buffer: {0}")]
    BadFrame(String),
    #[error("face detection failed: {0}")]
    Detection(#[source] InferenceError),
    #[error("landmark estimation failed: {0}")]
    Landmarks(#[source] InferenceError),
    #[error("descriptor extraction failed: {0}")]
    Descriptor(#[source] InferenceError),
    #[error("attribute estimation failed: {0}")]
    Attributes(#[source] InferenceError),
}

/// Face analysis over frames and reference images.
pub trait Analyzer {
    /// Analyze a reference image, requesting exactly one face: box,
    /// landmarks, and descriptor. `None` when no face is found.
    fn analyze_reference(&mut self, image: &RgbImage)
        -> Result<Option<ReferenceFace>, AnalyzeError>;

    /// Batch-analyze a live frame (`width * height * 3` RGB bytes): every
    /// detected face with landmarks, descriptor, age/gender, and
    /// expressions.
    fn analyze_frame(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, AnalyzeError>;
}

/// ONNX-backed analyzer over a loaded [`ModelBundle`].
pub struct OnnxAnalyzer {
    models: ModelBundle,
}

impl OnnxAnalyzer {
    pub fn new(models: ModelBundle) -> Self {
        Self { models }
    }

    /// Landmarks + aligned crop + descriptor for one detected face.
    fn describe_face(
        &mut self,
        frame: &RgbImage,
        face: &crate::types::FaceBox,
    ) -> Result<Option<(crate::types::Landmarks, Vec<u8>, crate::types::Descriptor)>, AnalyzeError>
    {
        let landmarks = self
            .models
            .landmarker
            .estimate(frame, face)
            .map_err(AnalyzeError::Landmarks)?;

        let Some(anchors) = landmarks.alignment_points() else {
            // Landmark output did not produce the full point set; treat the
            // face as undetectable rather than failing the frame.
            tracing::warn!("incomplete landmark set; dropping face");
            return Ok(None);
        };

        let aligned = alignment::align_face(frame.as_raw(), frame.width(), frame.height(), &anchors);
        let descriptor = self
            .models
            .descriptor
            .extract(&aligned)
            .map_err(AnalyzeError::Descriptor)?;

        Ok(Some((landmarks, aligned, descriptor)))
    }
}

impl Analyzer for OnnxAnalyzer {
    fn analyze_reference(
        &mut self,
        image: &RgbImage,
    ) -> Result<Option<ReferenceFace>, AnalyzeError> {
        let faces = self
            .models
            .detector
            .detect(image)
            .map_err(AnalyzeError::Detection)?;

        // detect() sorts by confidence; the best face stands in for the
        // single requested one.
        let Some(face) = faces.into_iter().next() else {
            return Ok(None);
        };

        let Some((landmarks, _aligned, descriptor)) = self.describe_face(image, &face)? else {
            return Ok(None);
        };

        Ok(Some(ReferenceFace { face, landmarks, descriptor }))
    }

    fn analyze_frame(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, AnalyzeError> {
        let frame = RgbImage::from_raw(width, height, rgb.to_vec()).ok_or_else(|| {
            AnalyzeError::BadFrame(format!(
                "buffer of {} bytes does not hold a {width}x{height} RGB frame",
                rgb.len()
            ))
        })?;

        let faces = self
            .models
            .detector
            .detect(&frame)
            .map_err(AnalyzeError::Detection)?;

        let mut detections = Vec::with_capacity(faces.len());
        for face in faces {
            let Some((landmarks, aligned, descriptor)) = self.describe_face(&frame, &face)? else {
                continue;
            };

            let (age, gender) = self
                .models
                .age_gender
                .estimate(&aligned)
                .map_err(AnalyzeError::Attributes)?;
            let expressions = self
                .models
                .expression
                .estimate(&aligned)
                .map_err(AnalyzeError::Attributes)?;

            detections.push(Detection {
                face,
                landmarks,
                descriptor,
                attributes: FaceAttributes { age, gender, expressions },
            });
        }

        Ok(detections)
    }
}
