use serde::{Deserialize, Serialize};

/// Which model gateway produces embeddings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Neural model run locally through ONNX Runtime.
    #[default]
    Onnx,
    /// Deterministic feature-hashing vectors. Needs no model download.
    Hashing,
}

impl EmbeddingBackend {
    /// Stable lowercase name, as written in settings and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Hashing => "hashing",
        }
    }

    /// Parse a backend name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "onnx" => Some(Self::Onnx),
            "hashing" | "hash" => Some(Self::Hashing),
            _ => None,
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Gateway implementation.
    pub backend: EmbeddingBackend,
    /// Hugging Face model repository.
    pub model: String,
    /// Quantization variant, selects `onnx/model_{dtype}.onnx`.
    pub dtype: String,
    /// Local model cache directory (may start with `~/`).
    pub cache_dir: String,
    /// Token limit per input text; longer inputs are truncated.
    pub max_length: usize,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
    /// Vector width of the hashing backend.
    pub hashing_dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "onnx-community/embeddinggemma-300m-ONNX".to_string(),
            dtype: "q4".to_string(),
            cache_dir: "~/.sift/models".to_string(),
            max_length: 2048,
            intra_threads: 2,
            hashing_dimensions: 384,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parse() {
        assert_eq!(EmbeddingBackend::parse("onnx"), Some(EmbeddingBackend::Onnx));
        assert_eq!(
            EmbeddingBackend::parse(" Hashing "),
            Some(EmbeddingBackend::Hashing)
        );
        assert_eq!(EmbeddingBackend::parse("gpu"), None);
    }

    #[test]
    fn backend_serde_lowercase() {
        let json = serde_json::to_string(&EmbeddingBackend::Hashing).unwrap();
        assert_eq!(json, "\"hashing\"");
        let back: EmbeddingBackend = serde_json::from_str("\"onnx\"").unwrap();
        assert_eq!(back, EmbeddingBackend::Onnx);
        assert_eq!(back.as_str(), "onnx");
    }

    #[test]
    fn default_model_is_embeddinggemma() {
        let s = EmbeddingSettings::default();
        assert_eq!(s.model, "onnx-community/embeddinggemma-300m-ONNX");
        assert_eq!(s.dtype, "q4");
        assert_eq!(s.hashing_dimensions, 384);
    }
}
