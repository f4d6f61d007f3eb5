//! FastEmbed-backed query embedder and cross-encoder rerankers.
//!
//! The embedder downloads `BAAI/bge-m3` into the configured cache on first
//! use. Rerankers are never downloaded: each model is loaded from
//! `<model_dir>/<model id>/` and must contain the ONNX graph and tokenizer
//! files listed in [`REQUIRED_MODEL_FILES`].
//!
//! Requires the `fastembed-models` feature flag.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptionsUserDefined, TextEmbedding, TextRerank,
    TokenizerFiles, UserDefinedRerankingModel,
};
use tracing::{debug, info};

use super::embed::Embedder;
use super::rerank::{Reranker, RerankerPool};
use crate::core::RerankerModel;
use crate::error::RetrievalError;

const EMBED_MODEL_NAME: &str = "BAAI/bge-m3";

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_JSON: &str = "tokenizer.json";
const CONFIG_JSON: &str = "config.json";
const SPECIAL_TOKENS_JSON: &str = "special_tokens_map.json";
const TOKENIZER_CONFIG_JSON: &str = "tokenizer_config.json";

/// Files every reranker model directory must contain.
pub const REQUIRED_MODEL_FILES: [&str; 5] = [
    MODEL_FILE,
    TOKENIZER_JSON,
    CONFIG_JSON,
    SPECIAL_TOKENS_JSON,
    TOKENIZER_CONFIG_JSON,
];

/// BGE-M3 query embedder.
///
/// The model is loaded on the first [`Embedder::embed`] call; a failed
/// load is retried on the next call.
pub struct FastembedEmbedder {
    cache_dir: PathBuf,
    model: Mutex<Option<TextEmbedding>>,
}

impl FastembedEmbedder {
    /// Creates an embedder that downloads into `cache_dir` when first used.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            model: Mutex::new(None),
        }
    }

    fn load(&self) -> Result<TextEmbedding, RetrievalError> {
        let options = InitOptions::new(EmbeddingModel::BGEM3)
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(|e| RetrievalError::Embedding {
            message: format!("failed to load {EMBED_MODEL_NAME}: {e}"),
        })?;
        info!(model = EMBED_MODEL_NAME, cache = %self.cache_dir.display(), "embedding model loaded");
        Ok(model)
    }
}

impl Embedder for FastembedEmbedder {
    fn name(&self) -> &str {
        EMBED_MODEL_NAME
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut slot = self.model.lock().map_err(|_| RetrievalError::Embedding {
            message: "embedding model lock poisoned".to_string(),
        })?;
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        let Some(model) = slot.as_mut() else {
            return Err(RetrievalError::Embedding {
                message: "embedding model not loaded".to_string(),
            });
        };

        let mut vectors = model
            .embed(vec![text], None)
            .map_err(|e| RetrievalError::Embedding {
                message: e.to_string(),
            })?;
        vectors.pop().ok_or_else(|| RetrievalError::Embedding {
            message: "model returned no embedding".to_string(),
        })
    }
}

impl std::fmt::Debug for FastembedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastembedEmbedder")
            .field("model", &EMBED_MODEL_NAME)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

/// A cross-encoder loaded from a local model directory.
pub struct FastembedReranker {
    model: Mutex<TextRerank>,
    model_id: &'static str,
}

impl FastembedReranker {
    /// Loads `model` from `model_dir/<model id>/`, truncating inputs at
    /// `max_length` tokens.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Rerank`] when the directory or any required
    /// file is missing, or the ONNX session cannot be created.
    pub fn load(
        model_dir: &Path,
        model: RerankerModel,
        max_length: usize,
    ) -> Result<Self, RetrievalError> {
        let model_id = model.id();
        let dir = model_dir.join(model_id);
        let fail = |message: String| RetrievalError::Rerank {
            model: model_id.to_string(),
            message,
        };

        if !dir.is_dir() {
            return Err(fail(format!(
                "reranker model directory not found: {}",
                dir.display()
            )));
        }
        let missing: Vec<&str> = REQUIRED_MODEL_FILES
            .iter()
            .copied()
            .filter(|name| !dir.join(name).is_file())
            .collect();
        if !missing.is_empty() {
            return Err(fail(format!(
                "reranker model files missing in {}: {}",
                dir.display(),
                missing.join(", ")
            )));
        }

        let read = |name: &str| -> Result<Vec<u8>, RetrievalError> {
            let path: PathBuf = dir.join(name);
            fs::read(&path).map_err(|e| fail(format!("unable to read {}: {e}", path.display())))
        };
        let tokenizer_files = TokenizerFiles {
            tokenizer_file: read(TOKENIZER_JSON)?,
            config_file: read(CONFIG_JSON)?,
            special_tokens_map_file: read(SPECIAL_TOKENS_JSON)?,
            tokenizer_config_file: read(TOKENIZER_CONFIG_JSON)?,
        };
        let user_model = UserDefinedRerankingModel::new(read(MODEL_FILE)?, tokenizer_files);
        let options = RerankInitOptionsUserDefined::default().with_max_length(max_length);

        let session = TextRerank::try_new_from_user_defined(user_model, options)
            .map_err(|e| fail(format!("fastembed reranker init failed: {e}")))?;

        info!(model = model_id, max_length, "reranker loaded");
        Ok(Self {
            model: Mutex::new(session),
            model_id,
        })
    }
}

impl Reranker for FastembedReranker {
    fn model_id(&self) -> &str {
        self.model_id
    }

    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError> {
        #[allow(unused_mut)]
        let mut model = self.model.lock().map_err(|_| RetrievalError::Rerank {
            model: self.model_id.to_string(),
            message: "reranker lock poisoned".to_string(),
        })?;

        let documents: Vec<String> = passages.iter().map(|p| (*p).to_string()).collect();
        let results = model
            .rerank(query.to_string(), documents, false, None)
            .map_err(|e| RetrievalError::Rerank {
                model: self.model_id.to_string(),
                message: format!("fastembed rerank failed: {e}"),
            })?;

        // Results come back sorted by score; restore input order.
        let mut scores = vec![f32::NEG_INFINITY; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}

impl std::fmt::Debug for FastembedReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastembedReranker")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Lazily loads and caches one [`FastembedReranker`] per model and length.
pub struct FastembedRerankerPool {
    model_dir: PathBuf,
    loaded: Mutex<HashMap<(RerankerModel, usize), Arc<FastembedReranker>>>,
}

impl FastembedRerankerPool {
    /// Creates an empty pool reading models from `model_dir`.
    #[must_use]
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }
}

impl RerankerPool for FastembedRerankerPool {
    fn get(
        &self,
        model: RerankerModel,
        max_length: usize,
    ) -> Result<Arc<dyn Reranker>, RetrievalError> {
        let mut loaded = self.loaded.lock().map_err(|_| RetrievalError::Rerank {
            model: model.id().to_string(),
            message: "reranker pool lock poisoned".to_string(),
        })?;

        if let Some(existing) = loaded.get(&(model, max_length)) {
            return Ok(Arc::clone(existing) as Arc<dyn Reranker>);
        }

        debug!(model = model.id(), max_length, "loading reranker");
        let reranker = Arc::new(FastembedReranker::load(&self.model_dir, model, max_length)?);
        loaded.insert((model, max_length), Arc::clone(&reranker));
        Ok(reranker)
    }
}

impl std::fmt::Debug for FastembedRerankerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastembedRerankerPool")
            .field("model_dir", &self.model_dir)
            .finish_non_exhaustive()
    }
}
