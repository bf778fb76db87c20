//! Índice vectorial: une nodos, modelo de embeddings y la colección donde se guardan.

use serde_json::{Map, Value};
use tracing::info;

use crate::{
    config::DuplicatePolicy,
    embedding::Embedder,
    error::{EmbeddingError, IngestError, RetrievalError, StoreError},
    models::Node,
    vector_store::{content_hash, Collection, StoredRecord},
};

/// Contexto de almacenamiento: la colección que respalda al índice.
#[derive(Debug)]
pub struct StorageContext {
    collection: Collection,
}

impl StorageContext {
    pub fn from_collection(collection: Collection) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub embed_batch_size: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            embed_batch_size: crate::config::DEFAULT_EMBED_BATCH_SIZE,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// Un fragmento recuperado con su puntuación de similitud.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
}

pub struct VectorStoreIndex<'a> {
    storage_context: StorageContext,
    embed_model: &'a dyn Embedder,
    inserted: usize,
    skipped: usize,
}

impl<'a> VectorStoreIndex<'a> {
    /// Embebe los nodos y los inserta en la colección del contexto en un solo lote.
    pub async fn build(
        nodes: Vec<Node>,
        mut storage_context: StorageContext,
        embed_model: &'a dyn Embedder,
        options: BuildOptions,
    ) -> Result<VectorStoreIndex<'a>, IngestError> {
        let (nodes, skipped): (Vec<Node>, usize) = match options.duplicate_policy {
            DuplicatePolicy::Append => (nodes, 0),
            DuplicatePolicy::Skip => {
                let total = nodes.len();
                let stored = storage_context.collection.content_hashes()?;
                let mut seen = std::collections::HashSet::new();
                let fresh: Vec<Node> = nodes
                    .into_iter()
                    .filter(|n| {
                        let hash = content_hash(&n.text);
                        !stored.contains(&hash) && seen.insert(hash)
                    })
                    .collect();
                let skipped = total - fresh.len();
                (fresh, skipped)
            }
        };
        if skipped > 0 {
            info!("{skipped} chunks ya presentes en la colección, se omiten.");
        }

        let embeddings = embed_nodes(&nodes, embed_model, options.embed_batch_size).await?;

        let records: Vec<StoredRecord> = nodes
            .into_iter()
            .zip(embeddings)
            .map(|(node, embedding)| {
                let metadata = node.storage_metadata();
                StoredRecord::new(node.id, node.text, metadata, embedding)
            })
            .collect();

        let inserted = storage_context.collection.add(records)?;

        Ok(VectorStoreIndex {
            storage_context,
            embed_model,
            inserted,
            skipped,
        })
    }

    /// Índice sobre una colección ya poblada, para consultas.
    pub fn from_storage(storage_context: StorageContext, embed_model: &'a dyn Embedder) -> Self {
        Self {
            storage_context,
            embed_model,
            inserted: 0,
            skipped: 0,
        }
    }

    pub fn storage_context(&self) -> &StorageContext {
        &self.storage_context
    }

    /// Registros insertados por `build`.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Nodos omitidos por duplicados en `build`.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Los `top_k` fragmentos más parecidos a la consulta.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredNode>, RetrievalError> {
        if self.storage_context.collection.count() == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embed_model.embed_query(query).await?;
        let matches = self.storage_context.collection.query(&embedding, top_k)?;
        Ok(matches
            .into_iter()
            .map(|m| ScoredNode {
                id: m.id,
                text: m.document,
                metadata: m.metadata,
                score: m.score,
            })
            .collect())
    }
}

async fn embed_nodes(
    nodes: &[Node],
    embed_model: &dyn Embedder,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, IngestError> {
    let mut embeddings = Vec::with_capacity(nodes.len());
    for batch in nodes.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|n| n.text.clone()).collect();
        let vectors = embed_model.embed_texts(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            }
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != embed_model.dimension()) {
            return Err(StoreError::DimensionMismatch {
                expected: embed_model.dimension(),
                found: bad.len(),
            }
            .into());
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedding::HashedEmbedder, vector_store::PersistentClient};

    fn node(text: &str, index: usize) -> Node {
        Node {
            id: format!("node-{index}"),
            ref_doc_id: "doc".into(),
            index,
            text: text.into(),
            start_char_idx: 0,
            end_char_idx: text.chars().count(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn build_inserts_every_node_and_retrieves_best_match() {
        let tmp = tempfile::tempdir().unwrap();
        let client = PersistentClient::open(tmp.path()).unwrap();
        let opened = client.get_or_create_collection("papers").unwrap();
        let embedder = HashedEmbedder::new(1024);

        let nodes = vec![
            node("attention mechanism in transformers", 0),
            node("adaptive radiation of darwin finches", 1),
            node("gradient descent optimisation", 2),
        ];
        let options = BuildOptions {
            embed_batch_size: 2,
            ..BuildOptions::default()
        };
        let index = VectorStoreIndex::build(
            nodes,
            StorageContext::from_collection(opened.collection),
            &embedder,
            options,
        )
        .await
        .unwrap();

        assert_eq!(index.inserted(), 3);
        assert_eq!(index.storage_context().collection().count(), 3);
        let hits = index.retrieve("what is the attention mechanism", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "attention mechanism in transformers");
        assert_eq!(hits[0].metadata["chunk_index"], 0);
    }

    #[tokio::test]
    async fn skip_policy_ignores_stored_and_repeated_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let client = PersistentClient::open(tmp.path()).unwrap();
        let embedder = HashedEmbedder::new(16);
        let options = BuildOptions {
            embed_batch_size: 10,
            duplicate_policy: DuplicatePolicy::Skip,
        };

        let opened = client.get_or_create_collection("papers").unwrap();
        let first = VectorStoreIndex::build(
            vec![node("uno", 0), node("dos", 1), node("uno", 2)],
            StorageContext::from_collection(opened.collection),
            &embedder,
            options,
        )
        .await
        .unwrap();
        assert_eq!((first.inserted(), first.skipped()), (2, 1));

        let opened = client.get_or_create_collection("papers").unwrap();
        let second = VectorStoreIndex::build(
            vec![node("uno", 0), node("tres", 1)],
            StorageContext::from_collection(opened.collection),
            &embedder,
            options,
        )
        .await
        .unwrap();
        assert_eq!((second.inserted(), second.skipped()), (1, 1));
        assert_eq!(second.storage_context().collection().count(), 3);
    }

    #[tokio::test]
    async fn retrieve_with_wrong_model_reports_storage_cause() {
        let tmp = tempfile::tempdir().unwrap();
        let client = PersistentClient::open(tmp.path()).unwrap();
        let opened = client.get_or_create_collection("papers").unwrap();
        let embedder = HashedEmbedder::new(16);
        let index = VectorStoreIndex::build(
            vec![node("uno", 0)],
            StorageContext::from_collection(opened.collection),
            &embedder,
            BuildOptions::default(),
        )
        .await
        .unwrap();

        let other = HashedEmbedder::new(8);
        let collection = index.storage_context().collection().clone();
        let index = VectorStoreIndex::from_storage(StorageContext::from_collection(collection), &other);
        let err = index.retrieve("uno", 1).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Storage(StoreError::DimensionMismatch { expected: 16, found: 8 })
        ));
    }

    #[tokio::test]
    async fn retrieve_on_empty_collection_returns_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let client = PersistentClient::open(tmp.path()).unwrap();
        let opened = client.get_or_create_collection("papers").unwrap();
        let embedder = HashedEmbedder::new(16);
        let index =
            VectorStoreIndex::from_storage(StorageContext::from_collection(opened.collection), &embedder);
        assert!(index.retrieve("cualquier cosa", 3).await.unwrap().is_empty());
    }
}
