//! Prompt builder for rendering templates into chat messages.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use std::collections::HashMap;
use tabula_core::{AppError, AppResult};

/// Number of prior exchanges rendered into the chat prompt.
pub const CHAT_HISTORY_TURNS: usize = 3;

/// Build a prompt from a definition and template variables.
///
/// The system message is taken verbatim from the definition; the template is
/// rendered with Handlebars into the user message.
///
/// # Example
/// ```no_run
/// use tabula_prompt::{build_prompt, default_chat_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "What is the average price?".to_string());
/// vars.insert("context".to_string(), "Column Information:\n...".to_string());
/// vars.insert("chat_history".to_string(), String::new());
///
/// let built = build_prompt(&default_chat_prompt(), vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Render the most recent exchanges as `Human:`/`Assistant:` pairs.
///
/// Only the last [`CHAT_HISTORY_TURNS`] exchanges are kept, oldest first,
/// separated by a newline.
pub fn format_chat_history<Q, A>(turns: &[(Q, A)]) -> String
where
    Q: AsRef<str>,
    A: AsRef<str>,
{
    let start = turns.len().saturating_sub(CHAT_HISTORY_TURNS);
    turns[start..]
        .iter()
        .map(|(q, a)| format!("Human: {}\nAssistant: {}", q.as_ref(), a.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
