//! Age/gender and expression estimators.
//!
//! Both nets consume the same aligned 112×112 crop as the descriptor
//! extractor, so the analyzer warps each face once and fans the crop out.

use std::path::Path;

use ort::value::TensorRef;

use super::session::{extract_output, open_session, rgb_to_nchw};
use super::{InferenceError, ModelError};
use crate::alignment::ALIGNED_SIZE;
use crate::types::{ExpressionScores, Gender, GenderEstimate};

const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;

/// Age/gender estimator. Output 0 is the age in years; output 1 holds two
/// gender logits in [male, female] order.
pub struct AgeGenderNet {
    session: ort::session::Session,
}

impl AgeGenderNet {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = open_session(path)?;

        if session.outputs().len() < 2 {
            return Err(ModelError::Rejected(
                "age/gender model needs two outputs (age, gender logits)".into(),
            ));
        }

        Ok(Self { session })
    }

    pub fn estimate(&mut self, aligned: &[u8]) -> Result<(f32, GenderEstimate), InferenceError> {
        let input = rgb_to_nchw(aligned, ALIGNED_SIZE, ALIGNED_SIZE, INPUT_MEAN, INPUT_STD);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let age_out = extract_output(&outputs, 0, "age")?;
        let age = age_out
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Failed("empty age output".into()))?;

        let gender_out = extract_output(&outputs, 1, "gender logits")?;
        if gender_out.len() != 2 {
            return Err(InferenceError::Failed(format!(
                "expected 2 gender logits, got {}",
                gender_out.len()
            )));
        }

        let probs = softmax(gender_out);
        let gender = if probs[0] >= probs[1] {
            GenderEstimate { gender: Gender::Male, probability: probs[0] }
        } else {
            GenderEstimate { gender: Gender::Female, probability: probs[1] }
        };

        Ok((age, gender))
    }
}

/// Expression estimator: seven logits in [`crate::types::EXPRESSION_NAMES`]
/// order.
pub struct ExpressionNet {
    session: ort::session::Session,
}

impl ExpressionNet {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = open_session(path)?;
        Ok(Self { session })
    }

    pub fn estimate(&mut self, aligned: &[u8]) -> Result<ExpressionScores, InferenceError> {
        let input = rgb_to_nchw(aligned, ALIGNED_SIZE, ALIGNED_SIZE, INPUT_MEAN, INPUT_STD);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let logits = extract_output(&outputs, 0, "expression logits")?;
        if logits.len() != 7 {
            return Err(InferenceError::Failed(format!(
                "expected 7 expression logits, got {}",
                logits.len()
            )));
        }

        let probs = softmax(logits);
        let mut scores = [0.0f32; 7];
        scores.copy_from_slice(&probs);
        Ok(ExpressionScores { scores })
    }
}

/// Numerically-stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_uniform_logits() {
        let p = softmax(&[0.5; 4]);
        for v in p {
            assert!((v - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_large_logits_stable() {
        // Without the max shift this would overflow to NaN.
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert!(p.iter().all(|v| v.is_finite()));
    }
}
