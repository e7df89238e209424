//! Prompt system for Tabula.
//!
//! Prompts are YAML definitions with a system message and a Handlebars
//! template. A built-in grounded chat prompt is used unless the workspace
//! overrides it under `.tabula/prompts/`.

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

pub use builder::{build_prompt, format_chat_history, CHAT_HISTORY_TURNS};
pub use defaults::{default_chat_prompt, DEFAULT_CHAT_PROMPT_ID};
pub use loader::{list_prompts, load_prompt, load_prompt_or_default, validate_prompt};
pub use types::{BuiltPrompt, PromptDefinition};
