//! Lanza el crew QA con una consulta de ejemplo e imprime el resultado como JSON.
//!
//! Uso: `check_crew ["consulta"]`. El historial de la conversación va vacío.

use anyhow::{Context, Result};
use doc_rag_crew::{
    config::{CrewConfig, KnowledgeSource},
    crew::{invoke_query, qa_crew, QueryRequest},
    embedding::load_embedder,
    index::{StorageContext, VectorStoreIndex},
    llm::OpenAiCompletion,
    logging,
    vector_store::{Collection, PersistentClient},
};
use tracing::{info, warn};

const DEFAULT_QUERY: &str = "Explain about Attention Mechanism";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    logging::init_tracing();

    // 2. Configuración y LLM
    let cfg = CrewConfig::from_env().context("Error al cargar la configuración")?;
    let llm = OpenAiCompletion::from_env(&cfg.chat_model).context("Error inicializando el LLM")?;

    // 3. Conocimiento opcional: sólo si la colección ya existe
    let collection = match &cfg.knowledge {
        Some(source) => find_collection(source)?,
        None => None,
    };
    let embed_model = match &collection {
        Some(_) => Some(load_embedder(&cfg.embedding).await?),
        None => None,
    };
    let index = match (collection, embed_model.as_deref()) {
        (Some(collection), Some(embed_model)) => Some(VectorStoreIndex::from_storage(
            StorageContext::from_collection(collection),
            embed_model,
        )),
        _ => None,
    };

    // 4. Lanzar el crew
    let crew = qa_crew(&llm, index.as_ref(), cfg.top_k);
    let user_query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());
    let result = invoke_query(&crew, QueryRequest::new(user_query))
        .await
        .context("Error ejecutando el crew")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Abre la colección configurada sin crear nada en disco.
fn find_collection(source: &KnowledgeSource) -> Result<Option<Collection>> {
    let Some(client) = PersistentClient::open_existing(&source.vector_store_dir)? else {
        warn!(
            "El vector store {} no existe; el crew responderá sin documentos.",
            source.vector_store_dir.display()
        );
        return Ok(None);
    };

    let collection = client.get_collection(&source.collection_name)?;
    match &collection {
        Some(c) => info!("Usando la colección '{}' ({} registros).", c.name(), c.count()),
        None => warn!(
            "La colección '{}' no existe; el crew responderá sin documentos.",
            source.collection_name
        ),
    }
    Ok(collection)
}
