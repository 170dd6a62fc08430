//! Descriptor extractor.
//!
//! Consumes a canonically aligned 112×112 RGB crop and produces a
//! 128-dimensional L2-normalized descriptor for gallery matching.

use std::path::Path;

use ort::value::TensorRef;

use super::session::{extract_output, open_session, rgb_to_nchw};
use super::{InferenceError, ModelError};
use crate::alignment::ALIGNED_SIZE;
use crate::types::Descriptor;

/// Dimension of the descriptor vector.
pub const DESCRIPTOR_DIM: usize = 128;

const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;

pub struct DescriptorNet {
    session: ort::session::Session,
}

impl DescriptorNet {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = open_session(path)?;
        Ok(Self { session })
    }

    /// Extract a descriptor from an aligned crop (`ALIGNED_SIZE`² RGB bytes,
    /// as produced by [`crate::alignment::align_face`]).
    pub fn extract(&mut self, aligned: &[u8]) -> Result<Descriptor, InferenceError> {
        let input = rgb_to_nchw(aligned, ALIGNED_SIZE, ALIGNED_SIZE, INPUT_MEAN, INPUT_STD);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let raw = extract_output(&outputs, 0, "descriptor")?;

        if raw.len() != DESCRIPTOR_DIM {
            return Err(InferenceError::Failed(format!(
                "expected {DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        Ok(Descriptor { values: l2_normalize(raw) })
    }
}

fn l2_normalize(values: &[f32]) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter().map(|x| x / norm).collect()
    } else {
        values.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let v = l2_normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
