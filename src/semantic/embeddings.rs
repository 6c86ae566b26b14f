//! Text encoders.
//!
//! - `TextEncoder`: what the indexer and search engine need from an encoder
//! - `EmbeddingModel`: fastembed-backed encoder with a local model cache

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{mpsc, Mutex};
use std::time::Duration;

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Config names accepted for `semantic_search.model`. The catalog has always
/// been indexed with MiniLM; the quantized build trades a little accuracy for
/// a smaller download.
const SUPPORTED_MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    ("all-MiniLM-L6-v2", fastembed::EmbeddingModel::AllMiniLML6V2),
    ("all-MiniLM-L6-v2-q", fastembed::EmbeddingModel::AllMiniLML6V2Q),
];

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Model download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Deterministic text encoder: the same text and model always give the same
/// vector.
pub trait TextEncoder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Identifies the model version. Vectors are only comparable when their
    /// ids match.
    fn model_id(&self) -> [u8; 32] {
        model_id_hash(self.model_name())
    }
}

/// SHA256 of the model name.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

/// Maps a config name to a fastembed model, ignoring case.
fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    SUPPORTED_MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name.trim()))
        .map(|(_, model)| model.clone())
        .ok_or_else(|| {
            let known: Vec<_> = SUPPORTED_MODELS.iter().map(|(known, _)| *known).collect();
            EmbeddingError::InvalidModel(format!("{name} (expected one of: {})", known.join(", ")))
        })
}

fn encode(model: &mut TextEmbedding, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    model
        .embed(vec![text], None)
        .map_err(|err| EmbeddingError::EmbeddingFailed(err.to_string()))?
        .pop()
        .ok_or_else(|| EmbeddingError::EmbeddingFailed("encoder returned no vector".to_string()))
}

/// Runs the loader on its own thread so a stalled download can be abandoned.
fn load_within(options: InitOptions, timeout: Duration) -> Result<TextEmbedding, EmbeddingError> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(TextEmbedding::try_new(options));
    });

    match rx.recv_timeout(timeout) {
        Ok(loaded) => loaded.map_err(|err| EmbeddingError::InitFailed(err.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(EmbeddingError::DownloadTimeout(timeout.as_secs())),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(EmbeddingError::InitFailed(
            "model loader exited unexpectedly".to_string(),
        )),
    }
}

/// fastembed encoder. Files are cached under `<cache_dir>/models`.
///
/// `TextEmbedding::embed` takes `&mut self`, so calls are serialized.
pub struct EmbeddingModel {
    inner: Mutex<TextEmbedding>,
    name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let model = resolve_model(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|err| {
            EmbeddingError::InitFailed(format!("{}: {err}", models_dir.display()))
        })?;

        let options = InitOptions::new(model)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);
        let mut inner = load_within(options, download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT))?;

        // the output width is only known after a first encode
        let dimensions = encode(&mut inner, "course")?.len();
        log::info!("loaded embedding model '{model_name}' ({dimensions} dimensions)");

        Ok(Self {
            inner: Mutex::new(inner),
            name: model_name.to_string(),
            dimensions,
        })
    }
}

impl TextEncoder for EmbeddingModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// One text per call so a record's vector never depends on its batch.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| EmbeddingError::EmbeddingFailed("encoder lock poisoned".to_string()))?;
        encode(&mut inner, text)
    }
}
