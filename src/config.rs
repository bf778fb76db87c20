//! Carga y validación de la configuración (ingesta + crew) desde variables de entorno.
//!
//! Los binarios llaman antes a `dotenvy::dotenv()`, así que un `.env` local
//! también cuenta. Las variables desconocidas se ignoran.

use std::{env, path::PathBuf, str::FromStr};

use crate::error::ConfigError;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 10;
pub const DEFAULT_HASHED_DIMENSION: usize = 384;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TOP_K: usize = 4;

const REQUIRED_INGESTION_KEYS: [&str; 3] = ["DOCUMENTS_DIR", "VECTOR_STORE_DIR", "COLLECTION_NAME"];

/// Backend usado para generar embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Modelo local ONNX (bge-small-en-v1.5 por defecto).
    FastEmbed,
    OpenAI,
    /// Embedding determinista por hashing de tokens. Sin red ni modelo.
    Hashed,
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        if cfg!(feature = "fastembed") {
            Self::FastEmbed
        } else {
            Self::Hashed
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastembed" | "fast-embed" | "local" => Ok(Self::FastEmbed),
            "openai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            other => Err(format!(
                "backend desconocido '{other}', se esperaba 'fastembed', 'openai' o 'hashed'"
            )),
        }
    }
}

/// Qué hacer con chunks cuyo contenido ya existe en la colección.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Añadir siempre (comportamiento "get or create" + append).
    #[default]
    Append,
    /// Omitir chunks cuyo hash de contenido ya está almacenado.
    Skip,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "skip" | "dedup" | "deduplicate" => Ok(Self::Skip),
            other => Err(format!("política desconocida '{other}', se esperaba 'append' o 'skip'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Nombre del modelo; `None` usa el del backend.
    pub model: Option<String>,
    /// Sólo se usa con el backend `hashed`.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: None,
            dimension: DEFAULT_HASHED_DIMENSION,
        }
    }
}

impl EmbeddingConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = parse_or(lookup, "EMBEDDING_BACKEND", EmbeddingBackend::default())?;
        let model = non_blank(lookup, "EMBEDDING_MODEL");
        let dimension = parse_or(lookup, "EMBEDDING_DIMENSION", DEFAULT_HASHED_DIMENSION)?;
        if dimension == 0 {
            return Err(ConfigError::invalid("EMBEDDING_DIMENSION", "0", "debe ser mayor que cero"));
        }
        Ok(Self {
            backend,
            model,
            dimension,
        })
    }
}

/// Configuración de la ingesta. Inmutable una vez cargada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    pub documents_dir: PathBuf,
    pub vector_store_dir: PathBuf,
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub duplicate_policy: DuplicatePolicy,
    pub embedding: EmbeddingConfig,
}

impl IngestionConfig {
    /// Configuración con los valores por defecto para las claves opcionales.
    pub fn new(
        documents_dir: impl Into<PathBuf>,
        vector_store_dir: impl Into<PathBuf>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            vector_store_dir: vector_store_dir.into(),
            collection_name: collection_name.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            duplicate_policy: DuplicatePolicy::default(),
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Carga la configuración desde variables de entorno (usando .env si ya se cargó).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<String> = REQUIRED_INGESTION_KEYS
            .iter()
            .filter(|key| non_blank(&lookup, key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        // Las tres existen: comprobado arriba.
        let documents_dir = non_blank(&lookup, "DOCUMENTS_DIR").unwrap_or_default();
        let vector_store_dir = non_blank(&lookup, "VECTOR_STORE_DIR").unwrap_or_default();
        let collection_name = non_blank(&lookup, "COLLECTION_NAME").unwrap_or_default();

        let chunk_size = parse_or(&lookup, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_or(&lookup, "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_size == 0 {
            return Err(ConfigError::invalid("CHUNK_SIZE", "0", "debe ser mayor que cero"));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::invalid(
                "CHUNK_OVERLAP",
                &chunk_overlap.to_string(),
                format!("debe ser menor que CHUNK_SIZE ({chunk_size})"),
            ));
        }

        let embed_batch_size = parse_or(&lookup, "EMBED_BATCH_SIZE", DEFAULT_EMBED_BATCH_SIZE)?;
        if embed_batch_size == 0 {
            return Err(ConfigError::invalid("EMBED_BATCH_SIZE", "0", "debe ser mayor que cero"));
        }

        Ok(Self {
            documents_dir: PathBuf::from(documents_dir),
            vector_store_dir: PathBuf::from(vector_store_dir),
            collection_name,
            chunk_size,
            chunk_overlap,
            embed_batch_size,
            duplicate_policy: parse_or(&lookup, "DUPLICATE_POLICY", DuplicatePolicy::default())?,
            embedding: EmbeddingConfig::from_lookup(&lookup)?,
        })
    }
}

/// Colección de la que el crew recupera contexto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeSource {
    pub vector_store_dir: PathBuf,
    pub collection_name: String,
}

/// Configuración del crew de preguntas y respuestas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewConfig {
    pub chat_model: String,
    pub top_k: usize,
    /// `None` si no hay vector store configurado: el crew responde sin contexto.
    pub knowledge: Option<KnowledgeSource>,
    pub embedding: EmbeddingConfig,
}

impl CrewConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chat_model =
            non_blank(&lookup, "LLM_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let top_k = parse_or(&lookup, "RETRIEVAL_TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(ConfigError::invalid("RETRIEVAL_TOP_K", "0", "debe ser mayor que cero"));
        }

        let knowledge = match (
            non_blank(&lookup, "VECTOR_STORE_DIR"),
            non_blank(&lookup, "COLLECTION_NAME"),
        ) {
            (Some(dir), Some(name)) => Some(KnowledgeSource {
                vector_store_dir: PathBuf::from(dir),
                collection_name: name,
            }),
            _ => None,
        };

        Ok(Self {
            chat_model,
            top_k,
            knowledge,
            embedding: EmbeddingConfig::from_lookup(&lookup)?,
        })
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DOCUMENTS_DIR", "./docs"),
        ("VECTOR_STORE_DIR", "./store"),
        ("COLLECTION_NAME", "papers"),
    ];

    #[test]
    fn loads_required_keys_with_defaults() {
        let cfg = IngestionConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(cfg.documents_dir, PathBuf::from("./docs"));
        assert_eq!(cfg.vector_store_dir, PathBuf::from("./store"));
        assert_eq!(cfg.collection_name, "papers");
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.chunk_overlap, 50);
        assert_eq!(cfg.embed_batch_size, 10);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Append);
    }

    #[test]
    fn extra_keys_are_ignored() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("OPENAI_API_KEY", "sk-test"));
        pairs.push(("SOMETHING_ELSE", "whatever"));
        assert!(IngestionConfig::from_lookup(lookup_from(&pairs)).is_ok());
    }

    #[test]
    fn reports_every_missing_key() {
        let err = IngestionConfig::from_lookup(lookup_from(&[("VECTOR_STORE_DIR", "./store")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingKeys(vec!["DOCUMENTS_DIR".into(), "COLLECTION_NAME".into()])
        );
    }

    #[test]
    fn blank_collection_name_counts_as_missing() {
        let err = IngestionConfig::from_lookup(lookup_from(&[
            ("DOCUMENTS_DIR", "./docs"),
            ("VECTOR_STORE_DIR", "./store"),
            ("COLLECTION_NAME", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingKeys(vec!["COLLECTION_NAME".into()]));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CHUNK_SIZE", "100"));
        pairs.push(("CHUNK_OVERLAP", "100"));
        let err = IngestionConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHUNK_OVERLAP"));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CHUNK_SIZE", "mil"));
        let err = IngestionConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHUNK_SIZE"));
    }

    #[test]
    fn parses_optional_embedding_and_duplicate_settings() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("EMBEDDING_BACKEND", "Hashed"));
        pairs.push(("EMBEDDING_DIMENSION", "64"));
        pairs.push(("DUPLICATE_POLICY", "skip"));
        let cfg = IngestionConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.embedding.backend, EmbeddingBackend::Hashed);
        assert_eq!(cfg.embedding.dimension, 64);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Skip);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("EMBEDDING_BACKEND", "huggingface-cloud"));
        assert!(IngestionConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn crew_config_knowledge_requires_both_keys() {
        let cfg = CrewConfig::from_lookup(lookup_from(&[("COLLECTION_NAME", "papers")])).unwrap();
        assert_eq!(cfg.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(cfg.top_k, DEFAULT_TOP_K);
        assert!(cfg.knowledge.is_none());

        let cfg = CrewConfig::from_lookup(lookup_from(&[
            ("COLLECTION_NAME", "papers"),
            ("VECTOR_STORE_DIR", "./store"),
            ("LLM_CHAT_MODEL", "gpt-4o"),
        ]))
        .unwrap();
        assert_eq!(cfg.chat_model, "gpt-4o");
        assert_eq!(
            cfg.knowledge,
            Some(KnowledgeSource {
                vector_store_dir: PathBuf::from("./store"),
                collection_name: "papers".into(),
            })
        );
    }
}
