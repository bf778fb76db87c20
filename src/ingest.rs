//! Ingesta de un directorio de documentos en una colección persistente del vector store:
//! carga → chunks → embeddings → inserción.

use std::path::PathBuf;

use tracing::{error, info};

use crate::{
    chunker::NodeParser,
    config::IngestionConfig,
    embedding::Embedder,
    error::IngestError,
    index::{BuildOptions, StorageContext, VectorStoreIndex},
    loader::DirectoryReader,
    vector_store::PersistentClient,
};

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub documents_loaded: usize,
    pub nodes_parsed: usize,
    pub records_inserted: usize,
    pub records_skipped: usize,
    pub collection_name: String,
    pub vector_store_path: PathBuf,
    /// `true` si la colección ya existía antes de esta ejecución.
    pub collection_existed: bool,
    /// Registros totales en la colección al terminar.
    pub collection_count: usize,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} documentos cargados, {} chunks, {} insertados, {} omitidos. Colección '{}' ({}) con {} registros.",
            self.documents_loaded,
            self.nodes_parsed,
            self.records_inserted,
            self.records_skipped,
            self.collection_name,
            if self.collection_existed { "reutilizada" } else { "creada" },
            self.collection_count
        )
    }
}

/// Construye (o amplía) el vector store a partir de los documentos del directorio configurado.
///
/// La configuración y el modelo de embeddings vienen de fuera: el modelo se
/// carga una vez por proceso. Nada de lo escrito antes de un fallo se deshace.
pub async fn build_vector_store_from_documents(
    settings: &IngestionConfig,
    embed_model: &dyn Embedder,
) -> Result<IngestionSummary, IngestError> {
    info!("Iniciando la ingesta en el vector store...");

    let parser = NodeParser::new(settings.chunk_size, settings.chunk_overlap)?;

    info!("Cargando documentos del directorio: {}", settings.documents_dir.display());
    let documents = DirectoryReader::new(&settings.documents_dir).load_data()?;
    info!("{} documentos cargados, creando el parser de chunks...", documents.len());

    info!(
        "Dividiendo documentos (chunk_size={}, chunk_overlap={})...",
        parser.chunk_size(),
        parser.chunk_overlap()
    );
    let nodes = parser.get_nodes_from_documents(&documents);
    info!("{} chunks generados", nodes.len());

    info!("Inicializando el vector store en {}", settings.vector_store_dir.display());
    let client = PersistentClient::open(&settings.vector_store_dir)?;
    let opened = client.get_or_create_collection(&settings.collection_name)?;
    info!(
        "Colección '{}' lista ({}).",
        settings.collection_name,
        if opened.existed { "reutilizada" } else { "nueva" }
    );

    info!("Construyendo el índice con el modelo '{}'...", embed_model.name());
    let nodes_parsed = nodes.len();
    let index = VectorStoreIndex::build(
        nodes,
        StorageContext::from_collection(opened.collection),
        embed_model,
        BuildOptions {
            embed_batch_size: settings.embed_batch_size,
            duplicate_policy: settings.duplicate_policy,
        },
    )
    .await?;

    let summary = IngestionSummary {
        documents_loaded: documents.len(),
        nodes_parsed,
        records_inserted: index.inserted(),
        records_skipped: index.skipped(),
        collection_name: settings.collection_name.clone(),
        vector_store_path: client.path().to_path_buf(),
        collection_existed: opened.existed,
        collection_count: index.storage_context().collection().count(),
    };
    info!("Vector store construido correctamente. {summary}");
    Ok(summary)
}

/// Ejecuta la ingesta y la reduce a un código de salida: 0 si todo fue bien, 1 si no.
pub async fn run_ingestion(settings: &IngestionConfig, embed_model: &dyn Embedder) -> i32 {
    match build_vector_store_from_documents(settings, embed_model).await {
        Ok(_) => 0,
        Err(e) => {
            error!(kind = e.kind(), "Error durante la construcción del vector store: {e}");
            e.exit_code()
        }
    }
}
