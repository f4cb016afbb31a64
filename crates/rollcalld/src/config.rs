use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Socket address the HTTP server binds (default 0.0.0.0:5000).
    pub bind_addr: String,
    /// Qdrant gRPC endpoint (default http://localhost:6334).
    pub qdrant_url: String,
    /// API key for Qdrant Cloud; unset for a local instance.
    pub qdrant_api_key: Option<String>,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| rollcall_core::default_model_dir());

        Self {
            bind_addr: std::env::var("ROLLCALL_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            qdrant_url: std::env::var("ROLLCALL_QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6334".to_string()),
            qdrant_api_key: std::env::var("ROLLCALL_QDRANT_API_KEY").ok(),
            model_dir,
        }
    }
}
