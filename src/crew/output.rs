//! Resultado estructurado de un `kickoff`, convertible a un mapa ordenado.

use serde::Serialize;
use serde_json::{Map, Value};

/// Salida de una tarea.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub name: String,
    pub agent: String,
    pub description: String,
    pub expected_output: String,
    pub raw: String,
}

/// Fragmento del vector store que se usó como contexto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub task: String,
    pub file_name: Option<String>,
    pub chunk_index: Option<u64>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrewOutput {
    /// Salida de la última tarea: la respuesta final.
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
    pub sources: Vec<SourceRef>,
}

impl CrewOutput {
    /// Mapa con las claves en orden fijo: `raw`, `tasks_output`, `sources`.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("raw".into(), Value::from(self.raw.clone()));
        map.insert(
            "tasks_output".into(),
            serde_json::to_value(&self.tasks_output).unwrap_or(Value::Array(Vec::new())),
        );
        map.insert(
            "sources".into(),
            serde_json::to_value(&self.sources).unwrap_or(Value::Array(Vec::new())),
        );
        map
    }
}

impl std::fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
