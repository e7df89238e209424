//! Built-in prompt definitions.

use crate::types::PromptDefinition;

/// Identifier of the grounded chat prompt used by the retrieval pipeline.
pub const DEFAULT_CHAT_PROMPT_ID: &str = "rag.chat.default";

const DEFAULT_SYSTEM: &str = "You are a precise and knowledgeable assistant specializing in \
tabular records and the column metadata that describes them.
Follow these guidelines:
1. Use ONLY the provided context to answer questions
2. Consider the chat history for context and continuity
3. If asking for clarification, reference previous exchanges
4. Be specific about which data sources you're using
5. If information is partial or unclear, explain why
6. Format numbers and dates consistently
7. Use the column descriptions to interpret abbreviated or coded values";

const DEFAULT_TEMPLATE: &str = "Previous conversation:
{{chat_history}}

Current context:
{{context}}

Question: {{query}}

Provide a detailed answer using the above context. Reference specific data points and explain any assumptions made.
If the question relates to previous exchanges, maintain consistency with earlier responses.
";

/// The grounded chat prompt shipped with Tabula.
pub fn default_chat_prompt() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_CHAT_PROMPT_ID.to_string(),
        title: "Grounded answer over tabular records".to_string(),
        api_version: "1.0".to_string(),
        system: DEFAULT_SYSTEM.to_string(),
        template: DEFAULT_TEMPLATE.to_string(),
    }
}
