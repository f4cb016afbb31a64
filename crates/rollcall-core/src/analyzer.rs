//! Combined detection + embedding pipeline.
//!
//! `FaceAnalyzer` owns both ONNX sessions and turns an RGB frame into a
//! list of detected faces with embeddings, in one call.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("no faces detected in the image")]
    NoFaceDetected,
}

/// A detected face with its embedding.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// Detection + embedding over a shared pair of ONNX sessions.
pub struct FaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FaceAnalyzer {
    /// Load both models from a model directory
    /// (`det_10g.onnx` + `w600k_r50.onnx`).
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzerError> {
        let detector_path = model_dir.join(crate::DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(crate::RECOGNIZER_MODEL_FILE);

        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;

        Ok(Self { detector, recognizer })
    }

    /// Detect every face in an RGB24 frame and extract an embedding for each.
    ///
    /// Faces are returned in detector order: highest confidence first.
    pub fn analyze(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<DetectedFace>, AnalyzerError> {
        let faces = self.detector.detect(rgb, width, height)?;

        let mut analyzed = Vec::with_capacity(faces.len());
        for face in faces {
            let embedding = self.recognizer.extract(rgb, width, height, &face)?;
            analyzed.push(DetectedFace { bbox: face, embedding });
        }

        Ok(analyzed)
    }

    /// Analyze a frame and return the primary face plus the total face count.
    ///
    /// Errors with [`AnalyzerError::NoFaceDetected`] when the frame contains
    /// no face. When more than one face is present, logs a warning and uses
    /// the highest-confidence one.
    pub fn analyze_primary(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(DetectedFace, usize), AnalyzerError> {
        let mut faces = self.analyze(rgb, width, height)?;
        if faces.is_empty() {
            return Err(AnalyzerError::NoFaceDetected);
        }

        let total = faces.len();
        if total > 1 {
            tracing::warn!(
                faces = total,
                "multiple faces detected, using highest-confidence face"
            );
        }

        Ok((faces.remove(0), total))
    }
}
