//! Reference gallery construction.
//!
//! The gallery is built once at startup from a list of (label, image source)
//! pairs and is immutable afterward; the annotation loop receives it by
//! value. Entries whose images fail to load or contain no detectable face
//! are skipped with a warning, never inserted.

use std::path::PathBuf;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

use crate::analyzer::Analyzer;
use crate::types::Descriptor;

/// One identity in the gallery: a label plus the descriptors extracted from
/// its reference images, in enrollment order. Always holds at least one
/// descriptor — label-only entries are never constructed.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceEntry {
    pub label: String,
    pub descriptors: Vec<Descriptor>,
}

/// The built mapping from identity labels to reference descriptors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gallery {
    entries: Vec<ReferenceEntry>,
}

impl Gallery {
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Append a descriptor under `label`, creating the entry on first use.
    /// Used by the builder; the loop only ever reads.
    pub fn push_descriptor(&mut self, label: &str, descriptor: Descriptor) {
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.descriptors.push(descriptor),
            None => self.entries.push(ReferenceEntry {
                label: label.to_string(),
                descriptors: vec![descriptor],
            }),
        }
    }
}

/// Where a reference image comes from.
#[derive(Debug, Clone, Serialize)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Url(url) => write!(f, "{url}"),
            ImageSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A gallery build input: one labeled reference image.
#[derive(Debug, Clone)]
pub struct ReferenceSpec {
    pub label: String,
    pub source: ImageSource,
}

/// A reference image could not be acquired or decoded.
#[derive(Error, Debug)]
#[error("could not load {uri}: {reason}")]
pub struct ImageLoadError {
    pub uri: String,
    pub reason: String,
}

/// Acquires reference images from their sources. The binary provides an
/// HTTP/file implementation; tests substitute in-memory stubs.
pub trait ImageLoader {
    fn load(&self, source: &ImageSource) -> Result<RgbImage, ImageLoadError>;
}

/// Why a reference entry was left out of the gallery.
#[derive(Debug, Clone, Serialize)]
pub enum SkipReason {
    /// The image was unreachable or undecodable.
    Load(String),
    /// The image loaded but the detector found no face in it.
    NoFace,
    /// Detection itself failed on this image.
    Analysis(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Load(reason) => write!(f, "image load failed: {reason}"),
            SkipReason::NoFace => write!(f, "no face detected"),
            SkipReason::Analysis(reason) => write!(f, "detection failed: {reason}"),
        }
    }
}

/// Per-entry build result, recorded in input order.
#[derive(Debug, Clone, Serialize)]
pub enum EnrollOutcome {
    Enrolled {
        label: String,
        source: String,
    },
    Skipped {
        label: String,
        source: String,
        reason: SkipReason,
    },
}

impl EnrollOutcome {
    pub fn label(&self) -> &str {
        match self {
            EnrollOutcome::Enrolled { label, .. } | EnrollOutcome::Skipped { label, .. } => label,
        }
    }
}

/// The gallery plus the per-entry outcomes that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryBuild {
    pub gallery: Gallery,
    pub outcomes: Vec<EnrollOutcome>,
}

impl GalleryBuild {
    pub fn enrolled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EnrollOutcome::Enrolled { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.enrolled_count()
    }
}

/// Build the reference gallery, processing `specs` strictly in input order.
///
/// Every failure is per-entry and recoverable: the entry is logged and
/// skipped, and the build continues. An all-skip build yields an empty
/// gallery, which downstream matching degrades to always-unknown.
pub fn build_gallery<A, L>(specs: &[ReferenceSpec], analyzer: &mut A, loader: &L) -> GalleryBuild
where
    A: Analyzer + ?Sized,
    L: ImageLoader + ?Sized,
{
    let mut gallery = Gallery::default();
    let mut outcomes = Vec::with_capacity(specs.len());

    for spec in specs {
        let source = spec.source.to_string();

        let img = match loader.load(&spec.source) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!(
                    label = %spec.label,
                    source = %source,
                    error = %err,
                    "skipping reference: image load failed"
                );
                outcomes.push(EnrollOutcome::Skipped {
                    label: spec.label.clone(),
                    source,
                    reason: SkipReason::Load(err.reason),
                });
                continue;
            }
        };

        match analyzer.analyze_reference(&img) {
            Ok(Some(face)) => {
                tracing::info!(
                    label = %spec.label,
                    source = %source,
                    confidence = face.face.confidence,
                    "enrolled reference descriptor"
                );
                gallery.push_descriptor(&spec.label, face.descriptor);
                outcomes.push(EnrollOutcome::Enrolled {
                    label: spec.label.clone(),
                    source,
                });
            }
            Ok(None) => {
                tracing::warn!(
                    label = %spec.label,
                    source = %source,
                    "no face detected in reference image; skipping"
                );
                outcomes.push(EnrollOutcome::Skipped {
                    label: spec.label.clone(),
                    source,
                    reason: SkipReason::NoFace,
                });
            }
            Err(err) => {
                tracing::warn!(
                    label = %spec.label,
                    source = %source,
                    error = %err,
                    "detection failed on reference image; skipping"
                );
                outcomes.push(EnrollOutcome::Skipped {
                    label: spec.label.clone(),
                    source,
                    reason: SkipReason::Analysis(err.to_string()),
                });
            }
        }
    }

    GalleryBuild { gallery, outcomes }
}
