//! Tipos de error de la librería.
//!
//! Cada etapa de la ingesta tiene su propio error y `IngestError` los agrupa
//! para que quien llama pueda distinguir la causa del fallo.

use std::path::PathBuf;

use thiserror::Error;

/// Errores al leer la configuración del entorno.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("faltan variables de entorno obligatorias: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("valor inválido para {key} ('{value}'): {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errores del lector de documentos.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("el directorio de documentos no existe: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("la ruta no es un directorio: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no se encontraron documentos en {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("no se pudo leer {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error recorriendo el directorio: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errores del modelo de embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("el proveedor de embeddings falló: {0}")]
    Provider(String),

    #[error("número de embeddings ({got}) distinto al número de textos ({expected})")]
    CountMismatch { expected: usize, got: usize },

    #[error("no se pudo inicializar el modelo de embeddings: {0}")]
    Init(String),
}

/// Errores del vector store persistente.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("nombre de colección inválido '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("dimensión del embedding ({found}) distinta a la de la colección ({expected})")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("error de E/S en {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error de la base de datos: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("registro corrupto '{record}': {reason}")]
    Corrupt { record: String, reason: String },

    #[error("error serializando metadatos: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errores al recuperar fragmentos de una colección para una consulta.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("no se pudo embeber la consulta: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("no se pudo consultar la colección: {0}")]
    Storage(#[from] StoreError),
}

/// Resultado tipado de la ingesta: un fallo por etapa.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("error de configuración: {0}")]
    Config(#[from] ConfigError),

    #[error("error cargando documentos: {0}")]
    Load(#[from] LoadError),

    #[error("error generando embeddings: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("error en el vector store: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    /// Nombre corto del tipo de fallo, útil en logs y tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Load(_) => "load",
            Self::Embedding(_) => "embedding",
            Self::Storage(_) => "storage",
        }
    }

    /// Código de salida del proceso. Todos los fallos se reportan como 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Errores del crew de agentes.
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("falta la variable '{key}' para interpolar la tarea '{task}'")]
    MissingInput { key: String, task: String },

    #[error("el crew no tiene tareas")]
    EmptyCrew,

    #[error("la tarea '{task}' referencia un agente inexistente ({agent})")]
    UnknownAgent { task: String, agent: usize },

    #[error("error del LLM: {0}")]
    Completion(String),

    #[error("error recuperando conocimiento: {0}")]
    Knowledge(#[from] RetrievalError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_message_lists_every_key() {
        let err = ConfigError::MissingKeys(vec![
            "DOCUMENTS_DIR".to_string(),
            "COLLECTION_NAME".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("DOCUMENTS_DIR"));
        assert!(msg.contains("COLLECTION_NAME"));
    }

    #[test]
    fn ingest_error_kinds_map_to_exit_code_one() {
        let errors = [
            IngestError::from(ConfigError::MissingKeys(vec!["X".into()])),
            IngestError::from(LoadError::NoDocuments(PathBuf::from("docs"))),
            IngestError::from(EmbeddingError::Provider("boom".into())),
            IngestError::from(StoreError::DimensionMismatch {
                expected: 3,
                found: 4,
            }),
        ];
        let kinds: Vec<_> = errors.iter().map(IngestError::kind).collect();
        assert_eq!(kinds, ["config", "load", "embedding", "storage"]);
        assert!(errors.iter().all(|e| e.exit_code() == 1));
    }

    #[test]
    fn knowledge_errors_keep_their_cause() {
        use std::error::Error as _;

        let err = CrewError::from(RetrievalError::from(EmbeddingError::Provider("timeout".into())));
        let retrieval = err.source().unwrap();
        assert!(retrieval.to_string().contains("timeout"));
        let cause = retrieval.source().unwrap();
        assert!(cause.downcast_ref::<EmbeddingError>().is_some());
    }
}
