//! Crew de preguntas y respuestas ya montado: un investigador que reúne
//! contexto de la colección y un redactor que escribe la respuesta final.

use super::{Agent, Crew, Task};
use crate::{index::VectorStoreIndex, llm::CompletionBackend};

const RESEARCH_DESCRIPTION: &str = "\
Analiza la consulta del usuario: \"{user_query}\".
Historial de la conversación (JSON, puede estar vacío): {chat_history}
Reúne los hechos, definiciones y ejemplos relevantes para responderla. Usa sólo \
la información de los fragmentos de los documentos y del historial; si no hay \
información suficiente, dilo explícitamente.";

const RESEARCH_EXPECTED: &str =
    "Una lista breve de hechos relevantes, cada uno con la fuente de la que sale.";

const ANSWER_DESCRIPTION: &str = "\
Responde a la consulta del usuario: \"{user_query}\".
Ten en cuenta el historial de la conversación: {chat_history}
Basa la respuesta en los hechos reunidos en la tarea anterior.";

const ANSWER_EXPECTED: &str = "\
Una respuesta clara y concisa, en el idioma de la consulta. Si el contexto no \
contiene la respuesta, indica que no la sabes.";

/// Monta el crew QA. Sin `knowledge`, el investigador trabaja sólo con la consulta
/// y el historial.
pub fn qa_crew<'a>(
    llm: &'a dyn CompletionBackend,
    knowledge: Option<&'a VectorStoreIndex<'a>>,
    top_k: usize,
) -> Crew<'a> {
    let mut researcher = Agent::new(
        "un investigador de contexto",
        "Encontrar en los documentos ingeridos la información que responde a la consulta",
        "Conoces a fondo la colección de documentos y sabes citar de dónde sale cada dato.",
        llm,
    );
    if let Some(index) = knowledge {
        researcher = researcher.with_knowledge(index, top_k);
    }

    let writer = Agent::new(
        "un redactor de respuestas",
        "Escribir la respuesta final a la consulta del usuario",
        "Explicas conceptos técnicos de forma clara, sin inventar nada que no esté en el contexto.",
        llm,
    );

    Crew::new(
        vec![researcher, writer],
        vec![
            Task::new("research", RESEARCH_DESCRIPTION, RESEARCH_EXPECTED, 0)
                .with_knowledge_query("{user_query}"),
            Task::new("answer", ANSWER_DESCRIPTION, ANSWER_EXPECTED, 1),
        ],
    )
}
