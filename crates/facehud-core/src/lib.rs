//! facehud-core — face analysis engine.
//!
//! Runs five ONNX model capabilities (coarse detector, 68-point landmark
//! estimator, descriptor extractor, age/gender estimator, expression
//! estimator) for CPU inference, and provides the reference gallery and
//! descriptor matching used by the live annotation loop.

pub mod alignment;
pub mod analyzer;
pub mod gallery;
pub mod matcher;
pub mod models;
pub mod types;

pub use analyzer::{AnalyzeError, Analyzer, OnnxAnalyzer};
pub use gallery::{build_gallery, EnrollOutcome, Gallery, GalleryBuild, ReferenceSpec};
pub use matcher::{MatchLabel, MatchOutcome, Matcher, NearestMatcher};
pub use models::ModelBundle;
pub use types::{Descriptor, Detection, FaceBox, Landmarks, ReferenceFace};
