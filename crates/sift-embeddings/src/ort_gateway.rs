//! ONNX Runtime gateway (feature-gated behind `ort`).
//!
//! Fetches the model and tokenizer through `hf-hub`, reporting per-file
//! progress, tokenizes with `tokenizers`, and runs the model with `ort`.
//! The model's pooled `sentence_embedding` output is used when present;
//! otherwise the first output is mean-pooled over the attention mask.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::errors::{EmbeddingError, Result};
use crate::gateway::{GatewayLoader, LoadingProgress, LoadingStatus, ModelGateway, ProgressSink};
use crate::normalize::l2_normalize;

const POOLED_OUTPUT: &str = "sentence_embedding";

/// Builds an [`OnnxGateway`] from the configured Hugging Face repository.
pub struct OnnxLoader {
    config: EmbeddingConfig,
}

impl OnnxLoader {
    /// Create a loader; nothing is fetched until [`GatewayLoader::load`].
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GatewayLoader for OnnxLoader {
    async fn load(&self, progress: ProgressSink) -> Result<Arc<dyn ModelGateway>> {
        // Download, tokenizer parsing and session creation all block.
        let config = self.config.clone();
        let gateway = tokio::task::spawn_blocking(move || OnnxGateway::build(config, &progress))
            .await
            .map_err(|e| EmbeddingError::Internal(format!("join error: {e}")))??;
        Ok(Arc::new(gateway))
    }
}

/// Text embedder backed by an ONNX Runtime session.
pub struct OnnxGateway {
    config: EmbeddingConfig,
    session: Arc<Mutex<ort::session::Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
}

impl OnnxGateway {
    fn build(config: EmbeddingConfig, progress: &ProgressSink) -> Result<Self> {
        let (model_path, tokenizer_path) = fetch_model_files(&config, progress)?;

        info!(model = %model_path.display(), "loading ONNX model");

        let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::Initialization(format!("tokenizer load: {e}")))?;
        let _ = tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: config.max_length,
                ..tokenizers::TruncationParams::default()
            }))
            .map_err(|e| EmbeddingError::Initialization(format!("tokenizer truncation: {e}")))?;

        let session = ort::session::Session::builder()
            .map_err(|e| EmbeddingError::Initialization(format!("session builder: {e}")))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| EmbeddingError::Initialization(format!("thread config: {e}")))?
            .with_log_level(ort::logging::LogLevel::Warning)
            .map_err(|e| EmbeddingError::Initialization(format!("log level: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbeddingError::Initialization(format!("model load: {e}")))?;

        progress(LoadingProgress::new(
            LoadingStatus::Ready,
            config.model.clone(),
            100.0,
        ));

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl ModelGateway for OnnxGateway {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || run_inference(&mut session.lock(), &tokenizer, &texts))
            .await
            .map_err(|e| EmbeddingError::Internal(format!("join error: {e}")))?
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Resolve model files from the local cache, downloading what is missing.
///
/// Returns (`model_path`, `tokenizer_path`).
fn fetch_model_files(config: &EmbeddingConfig, progress: &ProgressSink) -> Result<(PathBuf, PathBuf)> {
    let cache_dir = PathBuf::from(config.resolved_cache_dir());
    debug!(cache_dir = %cache_dir.display(), model = %config.model, "resolving model files");

    let cached = hf_hub::Cache::new(cache_dir.clone()).model(config.model.clone());
    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .with_progress(false)
        .build()
        .map_err(|e| EmbeddingError::Initialization(format!("hf-hub api: {e}")))?;
    let repo = api.model(config.model.clone());

    let fetch = |file: &str| -> Result<PathBuf> {
        progress(LoadingProgress::new(LoadingStatus::Initiate, file, 0.0));
        if let Some(path) = cached.get(file) {
            debug!(file, "model file found in cache");
            progress(LoadingProgress::new(LoadingStatus::Done, file, 100.0));
            return Ok(path);
        }
        repo.download_with_progress(file, DownloadProgress::new(Arc::clone(progress), file))
            .map_err(|e| EmbeddingError::Initialization(format!("download {file}: {e}")))
    };

    let model_file = config.model_file();
    let model_path = fetch(&model_file)?;

    // Larger exports keep weights in a sidecar next to the graph.
    let external = format!("{model_file}_data");
    if let Err(e) = fetch(&external) {
        debug!(file = %external, error = %e, "no external weights file");
    }

    let tokenizer_path = fetch("tokenizer.json")?;

    info!(model = %model_path.display(), tokenizer = %tokenizer_path.display(), "model files ready");
    Ok((model_path, tokenizer_path))
}

/// Translates `hf-hub` byte counts into [`LoadingProgress`] updates.
#[derive(Clone)]
struct DownloadProgress {
    sink: ProgressSink,
    file: String,
    total: usize,
    received: usize,
    last_percent: u8,
}

impl DownloadProgress {
    fn new(sink: ProgressSink, file: &str) -> Self {
        Self {
            sink,
            file: file.to_string(),
            total: 0,
            received: 0,
            last_percent: 0,
        }
    }

    fn emit(&self, status: LoadingStatus, progress: f32) {
        (self.sink)(LoadingProgress::new(status, self.file.clone(), progress));
    }
}

impl hf_hub::api::Progress for DownloadProgress {
    fn init(&mut self, size: usize, _filename: &str) {
        self.total = size;
        self.emit(LoadingStatus::Download, 0.0);
    }

    fn update(&mut self, size: usize) {
        self.received += size;
        let update = LoadingProgress::new(
            LoadingStatus::Progress,
            self.file.clone(),
            percent_of(self.received, self.total),
        );
        // One update per whole percent is plenty for a terminal.
        if update.percent() != self.last_percent {
            self.last_percent = update.percent();
            (self.sink)(update);
        }
    }

    fn finish(&mut self) {
        self.emit(LoadingStatus::Done, 100.0);
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn percent_of(received: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (received as f64 / total as f64 * 100.0) as f32
}

/// Run inference on a batch of texts.
fn run_inference(
    session: &mut ort::session::Session,
    tokenizer: &tokenizers::Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbeddingError::Inference(format!("tokenize: {e}")))?;

    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);
    if max_len == 0 {
        return Err(EmbeddingError::Inference("empty tokenization".into()));
    }

    let batch_size = texts.len();

    // Padded [batch_size, max_len] inputs, flattened row-major.
    let mut input_ids = vec![0i64; batch_size * max_len];
    let mut attention_mask = vec![0i64; batch_size * max_len];
    for (i, enc) in encodings.iter().enumerate() {
        let offset = i * max_len;
        for (j, &id) in enc.get_ids().iter().enumerate() {
            input_ids[offset + j] = i64::from(id);
        }
        for (j, &m) in enc.get_attention_mask().iter().enumerate() {
            attention_mask[offset + j] = i64::from(m);
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    let shape = vec![batch_size as i64, max_len as i64];

    let input_ids_tensor = ort::value::Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| EmbeddingError::Inference(format!("input_ids tensor: {e}")))?;
    let attention_mask_tensor =
        ort::value::Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| EmbeddingError::Inference(format!("attention_mask tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor
        ])
        .map_err(|e| EmbeddingError::Inference(format!("inference: {e}")))?;

    if let Some(pooled) = outputs.get(POOLED_OUTPUT) {
        let (output_shape, data) = pooled
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(format!("extract {POOLED_OUTPUT}: {e}")))?;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 2 || dims[0] != batch_size || dims[1] == 0 {
            return Err(EmbeddingError::Inference(format!(
                "unexpected {POOLED_OUTPUT} shape: {dims:?}"
            )));
        }
        return Ok(data
            .chunks(dims[1])
            .map(|row| {
                let mut v = row.to_vec();
                l2_normalize(&mut v);
                v
            })
            .collect());
    }

    let (output_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbeddingError::Inference(format!("extract tensor: {e}")))?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
    let dim = hidden_width(&dims, batch_size, max_len)?;
    Ok(mean_pool(data, &attention_mask, batch_size, max_len, dim))
}

/// Width of a `[batch, seq_len, dim]` hidden-state output, whose sequence
/// axis must line up with the padded attention mask.
fn hidden_width(dims: &[usize], batch_size: usize, max_len: usize) -> Result<usize> {
    match *dims {
        [b, seq, dim] if b == batch_size && seq == max_len && dim > 0 => Ok(dim),
        _ => Err(EmbeddingError::Inference(format!(
            "unexpected output shape {dims:?} for batch {batch_size} x {max_len} tokens"
        ))),
    }
}

/// Average token states where the attention mask is set, then L2-normalize.
///
/// `hidden` is `[batch, seq_len, dim]` flattened; `mask` is `[batch, seq_len]`.
fn mean_pool(hidden: &[f32], mask: &[i64], batch: usize, seq_len: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|i| {
            let mut pooled = vec![0.0f32; dim];
            let mut count = 0usize;
            for j in 0..seq_len {
                if mask.get(i * seq_len + j).copied().unwrap_or(0) == 0 {
                    continue;
                }
                count += 1;
                let base = (i * seq_len + j) * dim;
                for (p, h) in pooled.iter_mut().zip(&hidden[base..base + dim]) {
                    *p += h;
                }
            }
            if count > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f32;
                pooled.iter_mut().for_each(|p| *p /= n);
            }
            l2_normalize(&mut pooled);
            pooled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_implements_traits() {
        fn assert_gateway<T: ModelGateway>() {}
        fn assert_loader<T: GatewayLoader>() {}
        assert_gateway::<OnnxGateway>();
        assert_loader::<OnnxLoader>();
    }

    #[test]
    fn percent_of_handles_unknown_total() {
        assert!(percent_of(10, 0).abs() < f32::EPSILON);
        assert!((percent_of(50, 200) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn download_progress_emits_once_per_percent() {
        use hf_hub::api::Progress;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |p: LoadingProgress| seen.lock().push(p))
        };
        let mut progress = DownloadProgress::new(sink, "onnx/model_q4.onnx");
        progress.init(1000, "onnx/model_q4.onnx");
        for _ in 0..20 {
            progress.update(1);
        }
        progress.finish();

        let seen = seen.lock();
        let statuses: Vec<_> = seen.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                LoadingStatus::Download,
                LoadingStatus::Progress,
                LoadingStatus::Progress,
                LoadingStatus::Done,
            ]
        );
    }

    #[test]
    fn hidden_width_requires_padded_length() {
        assert_eq!(hidden_width(&[2, 7, 768], 2, 7).unwrap(), 768);
        assert!(hidden_width(&[2, 5, 768], 2, 7).is_err());
        assert!(hidden_width(&[1, 7, 768], 2, 7).is_err());
        assert!(hidden_width(&[2, 768], 2, 7).is_err());
        assert!(hidden_width(&[2, 7, 0], 2, 7).is_err());
    }

    #[test]
    fn mean_pool_ignores_padding() {
        // batch 1, seq 3, dim 2; last token is padding
        let hidden = vec![1.0, 0.0, 3.0, 0.0, 100.0, 100.0];
        let mask = vec![1, 1, 0];
        let pooled = mean_pool(&hidden, &mask, 1, 3, 2);
        assert_eq!(pooled.len(), 1);
        assert!((pooled[0][0] - 1.0).abs() < 1e-6);
        assert!(pooled[0][1].abs() < 1e-6);
    }

    #[test]
    fn mean_pool_batch_offsets() {
        // batch 2, seq 2, dim 2
        let hidden = vec![1.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 4.0];
        let mask = vec![1, 1, 1, 1];
        let pooled = mean_pool(&hidden, &mask, 2, 2, 2);
        assert!((pooled[0][0] - 1.0).abs() < 1e-6);
        assert!((pooled[1][1] - 1.0).abs() < 1e-6);
    }
}
