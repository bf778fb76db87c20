//! Modelos de dominio: documentos cargados del disco y los nodos (chunks) en que se dividen.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadatos del fichero del que sale un documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub file_size: u64,
    /// Fechas con formato `YYYY-MM-DD`.
    pub creation_date: Option<String>,
    pub last_modified_date: Option<String>,
}

impl DocumentMetadata {
    /// Metadatos como objeto JSON plano, tal cual se guardan en la colección.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Contenido de un fichero ya extraído como texto.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Un trozo acotado de un documento: la unidad que se embebe y se guarda.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub ref_doc_id: String,
    /// Posición del chunk dentro de su documento.
    pub index: usize,
    pub text: String,
    /// Offsets en caracteres (no bytes) dentro del documento.
    pub start_char_idx: usize,
    pub end_char_idx: usize,
    pub metadata: Map<String, Value>,
}

impl Node {
    /// Metadatos del nodo más las referencias a su documento y posición.
    pub fn storage_metadata(&self) -> Map<String, Value> {
        let mut meta = self.metadata.clone();
        meta.insert("ref_doc_id".into(), Value::from(self.ref_doc_id.clone()));
        meta.insert("chunk_index".into(), Value::from(self.index));
        meta.insert("start_char_idx".into(), Value::from(self.start_char_idx));
        meta.insert("end_char_idx".into(), Value::from(self.end_char_idx));
        meta
    }
}
