//! Construye el vector store a partir de los documentos de `DOCUMENTS_DIR`.
//! Sale con 0 si todo fue bien y con 1 ante cualquier fallo.

use doc_rag_crew::{embedding::load_embedder, logging, run_ingestion, IngestionConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    logging::init_tracing();

    // 2. Cargar configuración (falla antes de tocar el disco)
    let settings = match IngestionConfig::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Error al cargar la configuración: {e}");
            std::process::exit(1);
        }
    };

    // 3. Modelo de embeddings: una sola vez por proceso
    let embed_model = match load_embedder(&settings.embedding).await {
        Ok(model) => model,
        Err(e) => {
            error!("Error cargando el modelo de embeddings: {e}");
            std::process::exit(1);
        }
    };
    info!("Modelo de embeddings '{}' listo ({} dimensiones).", embed_model.name(), embed_model.dimension());

    // 4. Ingesta
    let code = run_ingestion(&settings, embed_model.as_ref()).await;
    std::process::exit(code);
}
