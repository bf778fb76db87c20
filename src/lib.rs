//! Ingesta de documentos en un vector store persistente y consulta a un crew de
//! agentes que responde usando ese conocimiento.
//!
//! Binarios:
//!   - `ingest_docs`: directorio → chunks → embeddings → colección.
//!   - `check_crew`: lanza el crew QA con una consulta de ejemplo.

pub mod chunker;
pub mod config;
pub mod crew;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod models;
pub mod vector_store;

pub use config::{CrewConfig, IngestionConfig};
pub use error::{CrewError, IngestError};
pub use ingest::{build_vector_store_from_documents, run_ingestion, IngestionSummary};
