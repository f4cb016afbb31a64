//! ArcFace embedding extractor via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from aligned RGB face crops,
//! using the w600k_r50 ArcFace model.

use crate::alignment;
use crate::types::{BoundingBox, Embedding, EMBEDDING_DIM};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0 — ArcFace uses symmetric normalization
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";
const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — download the insightface ArcFace export and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks — detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl From<ort::Error<ort::session::builder::SessionBuilder>> for RecognizerError {
    fn from(e: ort::Error<ort::session::builder::SessionBuilder>) -> Self {
        RecognizerError::Ort(e.into())
    }
}

/// ArcFace-based embedding extractor.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract a face embedding from a detected face in an RGB24 frame.
    ///
    /// The face must have landmarks (from the SCRFD detector). The face is
    /// aligned to a canonical 112x112 position before embedding extraction,
    /// and the result is L2-normalized.
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;

        let aligned = alignment::align_face(rgb, width, height, landmarks);

        let input = Self::preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize the embedding
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Embedding {
            values,
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }

    /// Preprocess a 112x112 aligned RGB24 crop into a NCHW float tensor.
    fn preprocess(aligned_face: &[u8]) -> Array4<f32> {
        let size = ARCFACE_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, size, size));

        for y in 0..size {
            for x in 0..size {
                for c in 0..RGB_CHANNELS {
                    let pixel = aligned_face
                        .get((y * size + x) * RGB_CHANNELS + c)
                        .copied()
                        .unwrap_or(0) as f32;

                    tensor[[0, c, y, x]] = (pixel - ARCFACE_MEAN) / ARCFACE_STD;
                }
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let aligned = vec![128u8; ARCFACE_INPUT_SIZE * ARCFACE_INPUT_SIZE * 3];
        let tensor = FaceRecognizer::preprocess(&aligned);
        assert_eq!(tensor.shape(), &[1, 3, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let aligned = vec![128u8; ARCFACE_INPUT_SIZE * ARCFACE_INPUT_SIZE * 3];
        let tensor = FaceRecognizer::preprocess(&aligned);
        // 128 - 127.5 = 0.5, / 127.5 ≈ 0.00392
        let val = tensor[[0, 0, 0, 0]];
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_channel_order() {
        // Distinct per-channel values must land in distinct tensor planes.
        let mut aligned = vec![0u8; ARCFACE_INPUT_SIZE * ARCFACE_INPUT_SIZE * 3];
        for px in aligned.chunks_exact_mut(3) {
            px[0] = 255; // R
            px[1] = 128; // G
            px[2] = 0; // B
        }
        let tensor = FaceRecognizer::preprocess(&aligned);

        let r = tensor[[0, 0, 10, 10]];
        let g = tensor[[0, 1, 10, 10]];
        let b = tensor[[0, 2, 10, 10]];
        assert!((r - 1.0).abs() < 1e-3, "r = {r}");
        assert!(g.abs() < 0.01, "g = {g}");
        assert!((b + 1.0).abs() < 1e-3, "b = {b}");
    }

    #[test]
    fn test_extract_requires_landmarks() {
        // Full extract needs a loaded model; the landmark precondition is
        // what we can verify at the type level.
        let face = BoundingBox {
            x: 0.0, y: 0.0, width: 100.0, height: 100.0,
            confidence: 0.9, landmarks: None,
        };
        assert!(face.landmarks.is_none());
    }
}
