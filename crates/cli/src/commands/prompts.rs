//! Prompts command handler.

use clap::Args;
use serde::Serialize;
use std::path::Path;
use tabula_core::{config::AppConfig, AppResult};
use tabula_prompt::{default_chat_prompt, list_prompts, load_prompt, DEFAULT_CHAT_PROMPT_ID};

/// List the chat prompts available to the workspace
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One available prompt and whether it loads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptStatus {
    pub id: String,

    /// Title, when the definition loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `true` for the definition compiled into the binary
    pub built_in: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        let prompts_dir = config.prompts_dir();
        let statuses = prompt_statuses(&prompts_dir)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            return Ok(());
        }

        println!("Prompts ({:?}):", prompts_dir);
        for status in &statuses {
            let origin = if status.built_in { "built-in" } else { "workspace" };
            match (&status.title, &status.error) {
                (_, Some(error)) => println!("  {} [{}] invalid: {}", status.id, origin, error),
                (Some(title), None) => println!("  {} [{}] {}", status.id, origin, title),
                (None, None) => println!("  {} [{}]", status.id, origin),
            }
        }

        Ok(())
    }
}

/// Workspace prompts, each loaded and validated, plus the built-in chat
/// prompt unless the workspace overrides it.
pub fn prompt_statuses(prompts_dir: &Path) -> AppResult<Vec<PromptStatus>> {
    let ids = list_prompts(prompts_dir)?;
    let mut statuses = Vec::with_capacity(ids.len() + 1);

    if !ids.iter().any(|id| id == DEFAULT_CHAT_PROMPT_ID) {
        statuses.push(PromptStatus {
            id: DEFAULT_CHAT_PROMPT_ID.to_string(),
            title: Some(default_chat_prompt().title),
            built_in: true,
            error: None,
        });
    }

    for id in ids {
        let status = match load_prompt(prompts_dir, &id) {
            Ok(definition) => PromptStatus {
                id,
                title: Some(definition.title),
                built_in: false,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Prompt {} failed to load: {}", id, e);
                PromptStatus {
                    id,
                    title: None,
                    built_in: false,
                    error: Some(e.to_string()),
                }
            }
        };
        statuses.push(status);
    }

    Ok(statuses)
}
