//! rollcall-core — Face detection and embedding engine.
//!
//! Uses SCRFD for face detection and ArcFace for embedding extraction,
//! both running via ONNX Runtime for CPU inference. Input frames are
//! interleaved RGB24.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod overlay;
pub mod recognizer;
pub mod types;

pub use analyzer::{AnalyzerError, DetectedFace, FaceAnalyzer};
pub use detector::FaceDetector;
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, Embedding, EMBEDDING_DIM};

use std::path::PathBuf;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default directory for ONNX model files: `$XDG_DATA_HOME/rollcall/models`,
/// falling back to `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
