//! Tareas del crew y la interpolación de `{variables}` en sus plantillas.

use serde_json::{Map, Value};

use crate::error::CrewError;

#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    /// Plantilla; admite `{variable}` con claves de los inputs.
    pub description: String,
    pub expected_output: String,
    /// Índice del agente en `Crew::agents`.
    pub agent: usize,
    /// Plantilla de la consulta al vector store, si el agente tiene conocimiento.
    pub knowledge_query: Option<String>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            knowledge_query: None,
        }
    }

    pub fn with_knowledge_query(mut self, query: impl Into<String>) -> Self {
        self.knowledge_query = Some(query.into());
        self
    }
}

/// Sustituye cada `{clave}` por su valor en `inputs`.
///
/// Sólo cuentan como variables los identificadores (`[A-Za-z_][A-Za-z0-9_-]*`);
/// cualquier otra llave se deja tal cual. Los strings se insertan sin comillas y
/// el resto de valores como JSON compacto.
pub fn interpolate(template: &str, inputs: &Map<String, Value>, task: &str) -> Result<String, CrewError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let key = after
            .find('}')
            .map(|close| &after[..close])
            .filter(|candidate| is_identifier(candidate));

        match key {
            Some(key) => {
                let value = inputs.get(key).ok_or_else(|| CrewError::MissingInput {
                    key: key.to_string(),
                    task: task.to_string(),
                })?;
                out.push_str(&render(value));
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn inputs() -> Map<String, Value> {
        match json!({"user_query": "Explain X", "chat_history": {}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn replaces_known_placeholders() {
        let text = interpolate("Q: {user_query} / H: {chat_history}", &inputs(), "t").unwrap();
        assert_eq!(text, "Q: Explain X / H: {}");
    }

    #[test]
    fn leaves_non_identifier_braces_alone() {
        let text = interpolate("json {\"a\": 1} y {user_query} {", &inputs(), "t").unwrap();
        assert_eq!(text, "json {\"a\": 1} y Explain X {");
    }

    #[test]
    fn missing_input_names_key_and_task() {
        let err = interpolate("{topic}", &inputs(), "research").unwrap_err();
        match err {
            CrewError::MissingInput { key, task } => {
                assert_eq!(key, "topic");
                assert_eq!(task, "research");
            }
            other => panic!("error inesperado: {other}"),
        }
    }

    #[test]
    fn structured_values_are_rendered_as_json() {
        let mut map = inputs();
        map.insert("chat_history".into(), json!([{"role": "user", "content": "hola"}]));
        let text = interpolate("{chat_history}", &map, "t").unwrap();
        assert_eq!(text, r#"[{"role":"user","content":"hola"}]"#);
    }
}
