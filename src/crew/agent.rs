use crate::{index::VectorStoreIndex, llm::CompletionBackend};

/// Un agente: rol, objetivo e historia que forman su preámbulo, más el LLM que
/// usa y, opcionalmente, el índice del que recupera conocimiento.
pub struct Agent<'a> {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub(crate) llm: &'a dyn CompletionBackend,
    pub(crate) knowledge: Option<&'a VectorStoreIndex<'a>>,
    pub(crate) top_k: usize,
}

impl<'a> Agent<'a> {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: &'a dyn CompletionBackend,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            llm,
            knowledge: None,
            top_k: crate::config::DEFAULT_TOP_K,
        }
    }

    /// Da al agente acceso a los `top_k` fragmentos más relevantes del índice.
    pub fn with_knowledge(mut self, index: &'a VectorStoreIndex<'a>, top_k: usize) -> Self {
        self.knowledge = Some(index);
        self.top_k = top_k.max(1);
        self
    }

    pub fn has_knowledge(&self) -> bool {
        self.knowledge.is_some()
    }

    pub fn preamble(&self) -> String {
        format!(
            "Eres {}. {}\nTu objetivo personal es: {}",
            self.role, self.backstory, self.goal
        )
    }
}
