//! Prompt types for Tabula.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
///
/// `template` is a Handlebars template rendered into the user message. The
/// retrieval pipeline supplies the variables `chat_history`, `context` and
/// `query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System message sent ahead of the rendered template
    pub system: String,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// A fully built prompt ready for completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: String,

    /// User message
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: rag.chat.custom
title: Custom RAG prompt
apiVersion: "1.0"
system: |
  You answer questions about inventory records.
template: |
  Context:
  {{context}}

  Question: {{query}}
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "rag.chat.custom");
        assert_eq!(def.api_version, "1.0");
        assert!(def.system.contains("inventory records"));
        assert!(def.template.contains("{{query}}"));
    }
}
