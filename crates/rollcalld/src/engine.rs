use image::RgbImage;
use rollcall_core::{AnalyzerError, Embedding, FaceAnalyzer};
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of embedding the primary face of an image.
pub struct EmbedOutcome {
    pub embedding: Embedding,
    /// Total faces found in the image (handlers report this back; only the
    /// primary face is embedded).
    pub faces_detected: usize,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Embed {
        image: RgbImage,
        reply: oneshot::Sender<Result<EmbedOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect faces in the image and extract the primary face's embedding.
    pub async fn embed(&self, image: RgbImage) -> Result<EmbedOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Embed {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the inference engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously (fail-fast), then enters a request
/// loop. The sessions live on that thread for the life of the process.
pub fn spawn_engine(model_dir: &Path) -> Result<EngineHandle, EngineError> {
    let mut analyzer = FaceAnalyzer::load(model_dir)?;
    tracing::info!(model_dir = %model_dir.display(), "models loaded");

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Embed { image, reply } => {
                        let result = run_embed(&mut analyzer, image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

fn run_embed(analyzer: &mut FaceAnalyzer, image: RgbImage) -> Result<EmbedOutcome, EngineError> {
    let (width, height) = image.dimensions();
    let rgb = image.into_raw();

    let (face, total) = analyzer.analyze_primary(&rgb, width, height)?;

    Ok(EmbedOutcome {
        embedding: face.embedding,
        faces_detected: total,
    })
}
