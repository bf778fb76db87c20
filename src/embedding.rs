//! Modelos de embeddings. Se cargan una vez por proceso y se comparten por referencia.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use async_trait::async_trait;
use tracing::info;

use crate::{
    config::{EmbeddingBackend, EmbeddingConfig},
    error::{ConfigError, EmbeddingError},
};

pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Un modelo que convierte texto en vectores de dimensión fija.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Nombre para logs.
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Un vector por texto, en el mismo orden.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_texts(&[query.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

/// Carga el backend configurado. Pensado para llamarse una sola vez por proceso.
pub async fn load_embedder(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    info!("Cargando modelo de embeddings ({:?})...", cfg.backend);
    match cfg.backend {
        EmbeddingBackend::Hashed => Ok(Box::new(HashedEmbedder::new(cfg.dimension))),
        EmbeddingBackend::OpenAI => Ok(Box::new(OpenAiEmbedder::from_env(cfg.model.clone())?)),
        #[cfg(feature = "fastembed")]
        EmbeddingBackend::FastEmbed => Ok(Box::new(FastEmbedder::load(cfg.model.clone()).await?)),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingBackend::FastEmbed => Err(EmbeddingError::Init(
            "el binario se compiló sin la feature 'fastembed'".into(),
        )),
    }
}

// ---------------------------------------------------------------------
// HASHED
// ---------------------------------------------------------------------

/// Bolsa de tokens con hashing a `dimension` cubetas y normalización L2.
/// Determinista y sin dependencias externas.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            vector[bucket(&token, self.dimension)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    fn name(&self) -> &str {
        "hashed"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

// ---------------------------------------------------------------------
// OPENAI (vía Rig)
// ---------------------------------------------------------------------

/// Embeddings de OpenAI a través del cliente de Rig. Requiere `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn from_env(model: Option<String>) -> Result<Self, EmbeddingError> {
        if std::env::var("OPENAI_API_KEY").map(|k| k.trim().is_empty()).unwrap_or(true) {
            return Err(EmbeddingError::Init(
                ConfigError::MissingKeys(vec!["OPENAI_API_KEY".into()]).to_string(),
            ));
        }
        let model = model.unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string());
        let dimension = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Ok(Self { model, dimension })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        use rig::client::{EmbeddingsClient as _, ProviderClient as _};
        use rig::embeddings::EmbeddingModel as _;
        use rig::providers::openai;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = openai::Client::from_env();
        let embedding_model = client.embedding_model(&self.model);
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }

        Ok(embeddings
            .into_iter()
            .map(|e| e.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

// ---------------------------------------------------------------------
// FASTEMBED (modelo local)
// ---------------------------------------------------------------------

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use std::{str::FromStr, sync::Arc};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
    use tokio::sync::Mutex;

    use super::Embedder;
    use crate::error::EmbeddingError;

    /// Modelo ONNX local; por defecto `BAAI/bge-small-en-v1.5`.
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: String,
        dimension: usize,
    }

    impl FastEmbedder {
        pub async fn load(model_override: Option<String>) -> Result<Self, EmbeddingError> {
            let model_name = match model_override {
                Some(code) => EmbeddingModel::from_str(&code).map_err(|e| EmbeddingError::Init(e.to_string()))?,
                None => EmbeddingModel::default(),
            };
            let model_code = model_name.to_string();
            let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);

            // La carga lee el modelo de disco (o lo descarga): fuera del runtime.
            let (model, dimension) = tokio::task::spawn_blocking(move || {
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::Init(e.to_string()))?;
                let info = EmbeddingModel::get_model_info(&model_name).ok_or_else(|| {
                    EmbeddingError::Init(format!("faltan metadatos del modelo {model_name}"))
                })?;
                Ok::<_, EmbeddingError>((model, info.dim))
            })
            .await
            .map_err(|e| EmbeddingError::Init(e.to_string()))??;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                model_name: model_code,
                dimension,
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn name(&self) -> &str {
            &self.model_name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut guard = self.model.lock().await;
            guard
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::Provider(e.to_string()))
        }
    }
}
