//! The five model capabilities and their shared loading plumbing.

pub mod attributes;
pub mod detector;
pub mod landmarker;
pub mod recognizer;
mod session;

use std::path::Path;

use thiserror::Error;

pub use attributes::{AgeGenderNet, ExpressionNet};
pub use detector::FaceDetector;
pub use landmarker::LandmarkNet;
pub use recognizer::{DescriptorNet, DESCRIPTOR_DIM};

/// Model file names expected inside the model directory.
pub const DETECTOR_MODEL: &str = "face_detector.onnx";
pub const LANDMARK_MODEL: &str = "landmark_68.onnx";
pub const DESCRIPTOR_MODEL: &str = "descriptor_128.onnx";
pub const AGE_GENDER_MODEL: &str = "age_gender.onnx";
pub const EXPRESSION_MODEL: &str = "expression.onnx";

/// A model could not be loaded. Fatal at startup: no detection call is
/// possible until every capability is available.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0} — place the bundle in the model directory")]
    NotFound(String),
    #[error("model rejected: {0}")]
    Rejected(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A loaded model failed at inference time. Recoverable per tick.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Failed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// All five capabilities, loaded and ready.
pub struct ModelBundle {
    pub detector: FaceDetector,
    pub landmarker: LandmarkNet,
    pub descriptor: DescriptorNet,
    pub age_gender: AgeGenderNet,
    pub expression: ExpressionNet,
}

impl ModelBundle {
    /// Load every model from `dir`. The five loads proceed concurrently and
    /// this returns only once all of them have finished; any single failure
    /// fails the whole bundle.
    pub fn load_all(dir: &Path) -> Result<Self, ModelError> {
        tracing::info!(dir = %dir.display(), "loading model bundle");

        let (detector, landmarker, descriptor, age_gender, expression) =
            std::thread::scope(|scope| {
                let detector = scope.spawn(|| FaceDetector::load(&dir.join(DETECTOR_MODEL)));
                let landmarker = scope.spawn(|| LandmarkNet::load(&dir.join(LANDMARK_MODEL)));
                let descriptor = scope.spawn(|| DescriptorNet::load(&dir.join(DESCRIPTOR_MODEL)));
                let age_gender = scope.spawn(|| AgeGenderNet::load(&dir.join(AGE_GENDER_MODEL)));
                let expression = scope.spawn(|| ExpressionNet::load(&dir.join(EXPRESSION_MODEL)));

                (
                    join_load(detector),
                    join_load(landmarker),
                    join_load(descriptor),
                    join_load(age_gender),
                    join_load(expression),
                )
            });

        let bundle = Self {
            detector: detector?,
            landmarker: landmarker?,
            descriptor: descriptor?,
            age_gender: age_gender?,
            expression: expression?,
        };

        tracing::info!("model bundle ready");
        Ok(bundle)
    }
}

fn join_load<T>(
    handle: std::thread::ScopedJoinHandle<'_, Result<T, ModelError>>,
) -> Result<T, ModelError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(ModelError::Rejected("model load thread panicked".into())))
}
