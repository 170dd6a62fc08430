//! Shared ONNX session plumbing: builder, input tensor packing, output
//! extraction.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;

use super::{InferenceError, ModelError};

/// Build a CPU inference session for the model file at `path`.
///
/// Fails with `ModelError::NotFound` before touching ONNX Runtime so the
/// operator gets a path diagnostic rather than a loader backtrace.
pub(crate) fn open_session(path: &Path) -> Result<Session, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(path)?;

    tracing::info!(
        path = %path.display(),
        inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
        "loaded model"
    );

    Ok(session)
}

/// Pack tightly-coupled RGB bytes into a normalized NCHW float tensor:
/// `value = (byte - mean) / std`, channels planar in R, G, B order.
pub(crate) fn rgb_to_nchw(rgb: &[u8], width: usize, height: usize, mean: f32, std: f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

    for y in 0..height {
        for x in 0..width {
            let base = (y * width + x) * 3;
            for c in 0..3 {
                let pixel = rgb.get(base + c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - mean) / std;
            }
        }
    }

    tensor
}

/// Extract output `index` as a flat f32 slice, with a named diagnostic on
/// mismatch.
pub(crate) fn extract_output<'a>(
    outputs: &'a ort::session::SessionOutputs<'_>,
    index: usize,
    what: &str,
) -> Result<&'a [f32], InferenceError> {
    let (_, data) = outputs[index]
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Failed(format!("{what}: {e}")))?;
    Ok(data)
}
