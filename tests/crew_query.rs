use std::{fs, sync::Mutex};

use async_trait::async_trait;
use doc_rag_crew::{
    build_vector_store_from_documents,
    config::IngestionConfig,
    crew::{invoke_query, qa_crew, QueryRequest},
    embedding::HashedEmbedder,
    error::CrewError,
    index::{StorageContext, VectorStoreIndex},
    llm::CompletionBackend,
    vector_store::PersistentClient,
};
use serde_json::json;

/// Responde con el número de llamada y guarda cada prompt.
#[derive(Default)]
struct RecordingLlm {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionBackend for RecordingLlm {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, _preamble: &str, prompt: &str) -> Result<String, CrewError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("respuesta {}", prompts.len()))
    }
}

#[tokio::test]
async fn example_query_without_knowledge_returns_printable_mapping() {
    let llm = RecordingLlm::default();
    let crew = qa_crew(&llm, None, 4);

    let request = QueryRequest::new("Explain X").with_chat_history(json!({}));
    let result = invoke_query(&crew, request).await.unwrap();

    assert_eq!(result["raw"], "respuesta 2");
    assert_eq!(result["tasks_output"].as_array().unwrap().len(), 2);
    assert!(result["sources"].as_array().unwrap().is_empty());
    let printed = serde_json::to_string_pretty(&result).unwrap();
    assert!(printed.contains("Explain X"));
}

#[tokio::test]
async fn researcher_receives_chunks_from_ingested_collection() {
    let docs = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    fs::write(
        docs.path().join("attention.txt"),
        "The attention mechanism lets a model weigh every token of the input.",
    )
    .unwrap();
    fs::write(
        docs.path().join("finches.txt"),
        "Adaptive radiation explains the diversity of Darwin finches.",
    )
    .unwrap();

    let embedder = HashedEmbedder::new(1024);
    let cfg = IngestionConfig::new(docs.path(), store.path(), "papers");
    build_vector_store_from_documents(&cfg, &embedder).await.unwrap();

    let collection = PersistentClient::open(store.path())
        .unwrap()
        .get_collection("papers")
        .unwrap()
        .unwrap();
    let index = VectorStoreIndex::from_storage(StorageContext::from_collection(collection), &embedder);

    let llm = RecordingLlm::default();
    let crew = qa_crew(&llm, Some(&index), 1);
    let result = invoke_query(&crew, QueryRequest::new("Explain about attention mechanism"))
        .await
        .unwrap();

    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("attention mechanism lets a model"));
    assert!(!prompts[0].contains("Darwin finches"));
    assert!(prompts[1].contains("respuesta 1"));
    assert_eq!(result["sources"][0]["file_name"], "attention.txt");
}
