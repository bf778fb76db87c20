//! Crew de agentes para responder consultas.
//!
//! Flujo (proceso secuencial):
//!   1. Se interpolan los inputs (`user_query`, `chat_history`) en cada tarea.
//!   2. Si el agente tiene conocimiento, se recuperan los fragmentos más
//!      relevantes de la colección.
//!   3. El agente recibe como contexto las salidas de las tareas anteriores.
//!   4. La salida de la última tarea es la respuesta final.

mod agent;
mod output;
mod qa;
mod task;

pub use agent::Agent;
pub use output::{CrewOutput, SourceRef, TaskOutput};
pub use qa::qa_crew;
pub use task::{interpolate, Task};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{error::CrewError, index::ScoredNode};

/// Petición al crew: la consulta del usuario y el historial de la conversación.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub user_query: String,
    pub chat_history: Value,
}

impl QueryRequest {
    /// Petición con historial vacío (`{}`).
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            chat_history: Value::Object(Map::new()),
        }
    }

    pub fn with_chat_history(mut self, chat_history: Value) -> Self {
        self.chat_history = chat_history;
        self
    }

    pub fn into_inputs(self) -> Map<String, Value> {
        let mut inputs = Map::new();
        inputs.insert("user_query".into(), Value::from(self.user_query));
        inputs.insert("chat_history".into(), self.chat_history);
        inputs
    }
}

/// Agentes más tareas, ejecutadas en orden.
pub struct Crew<'a> {
    agents: Vec<Agent<'a>>,
    tasks: Vec<Task>,
}

impl<'a> Crew<'a> {
    pub fn new(agents: Vec<Agent<'a>>, tasks: Vec<Task>) -> Self {
        Self { agents, tasks }
    }

    pub fn agents(&self) -> &[Agent<'a>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Ejecuta todas las tareas de forma secuencial con los inputs dados.
    pub async fn kickoff(&self, inputs: &Map<String, Value>) -> Result<CrewOutput, CrewError> {
        if self.tasks.is_empty() {
            return Err(CrewError::EmptyCrew);
        }

        info!("Iniciando crew con {} tareas...", self.tasks.len());
        let mut tasks_output: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        let mut sources = Vec::new();

        for task in &self.tasks {
            let agent = self.agents.get(task.agent).ok_or_else(|| CrewError::UnknownAgent {
                task: task.name.clone(),
                agent: task.agent,
            })?;

            let description = interpolate(&task.description, inputs, &task.name)?;
            let expected_output = interpolate(&task.expected_output, inputs, &task.name)?;

            let knowledge = match (agent.knowledge, &task.knowledge_query) {
                (Some(index), Some(query)) => {
                    let query = interpolate(query, inputs, &task.name)?;
                    let hits = index.retrieve(&query, agent.top_k).await?;
                    if hits.is_empty() {
                        warn!("Tarea '{}': la colección no devolvió fragmentos.", task.name);
                    }
                    hits
                }
                _ => Vec::new(),
            };

            sources.extend(knowledge.iter().map(|hit| SourceRef {
                task: task.name.clone(),
                file_name: hit
                    .metadata
                    .get("file_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                chunk_index: hit.metadata.get("chunk_index").and_then(Value::as_u64),
                score: hit.score,
            }));

            let prompt = task_prompt(&description, &expected_output, &tasks_output, &knowledge);
            info!(
                "Agente '{}' ({}) ejecutando la tarea '{}'...",
                agent.role,
                agent.llm.model_name(),
                task.name
            );
            let raw = agent.llm.complete(&agent.preamble(), &prompt).await?;

            tasks_output.push(TaskOutput {
                name: task.name.clone(),
                agent: agent.role.clone(),
                description,
                expected_output,
                raw,
            });
        }

        let raw = tasks_output
            .last()
            .map(|t| t.raw.clone())
            .unwrap_or_default();
        info!("Crew terminado.");
        Ok(CrewOutput {
            raw,
            tasks_output,
            sources,
        })
    }
}

/// Lanza el crew con la petición y devuelve el resultado como mapa ordenado.
pub async fn invoke_query(crew: &Crew<'_>, request: QueryRequest) -> Result<Map<String, Value>, CrewError> {
    let output = crew.kickoff(&request.into_inputs()).await?;
    Ok(output.to_dict())
}

fn task_prompt(
    description: &str,
    expected_output: &str,
    previous: &[TaskOutput],
    knowledge: &[ScoredNode],
) -> String {
    let mut prompt = format!(
        "Tarea actual: {description}\n\nCriterio de la respuesta esperada: {expected_output}\n"
    );

    if !knowledge.is_empty() {
        prompt.push_str("\nFragmentos de los documentos:\n");
        for (i, hit) in knowledge.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, hit.text.trim()));
        }
    }

    if !previous.is_empty() {
        prompt.push_str("\nContexto de tareas anteriores:\n");
        let joined: Vec<&str> = previous.iter().map(|t| t.raw.as_str()).collect();
        prompt.push_str(&joined.join("\n\n---\n\n"));
        prompt.push('\n');
    }

    prompt.push_str("\nComienza. Da tu mejor respuesta final.");
    prompt
}
