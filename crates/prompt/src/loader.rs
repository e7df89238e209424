//! Prompt loader for YAML prompt definitions.

use crate::defaults::{default_chat_prompt, DEFAULT_CHAT_PROMPT_ID};
use crate::types::PromptDefinition;
use std::path::Path;
use tabula_core::{AppError, AppResult};
use walkdir::WalkDir;

/// Load a prompt definition by ID from a prompts directory.
///
/// Looks for `<prompts_dir>/<id>.yml`.
///
/// # Example
/// ```no_run
/// use tabula_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".tabula/prompts"), "rag.chat.default")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a prompt, falling back to the built-in definition of the same ID.
///
/// Only a missing file falls back; a file that exists but is invalid is an
/// error so a broken override is never silently ignored.
pub fn load_prompt_or_default(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));
    if prompt_file.exists() {
        return load_prompt(prompts_dir, prompt_id);
    }

    if prompt_id == DEFAULT_CHAT_PROMPT_ID {
        tracing::debug!("Using built-in prompt '{}'", prompt_id);
        return Ok(default_chat_prompt());
    }

    Err(AppError::Prompt(format!(
        "Prompt '{}' not found in {:?} and has no built-in default",
        prompt_id, prompts_dir
    )))
}

/// List the prompt IDs defined in a prompts directory, sorted.
///
/// Only `*.yml` files directly inside `prompts_dir` count; a missing
/// directory has no prompts.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids: Vec<String> = WalkDir::new(prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("yml"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
pub fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {:?}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // A chat template that never shows the retrieved context cannot ground anything.
    if !def.template.contains("{{context}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' template must reference {{{{context}}}}",
            def.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let file_path = dir.join(format!("{}.yml", id));
        fs::write(&file_path, body).unwrap();
        file_path
    }

    fn valid_prompt(id: &str) -> String {
        format!(
            r#"
id: {}
title: "Test Prompt"
apiVersion: "1.0"
system: "Be terse."
template: "Context: {{{{context}}}} Question: {{{{query}}}}"
"#,
            id
        )
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "test.prompt", &valid_prompt("test.prompt"));

        let prompt = load_prompt(temp_dir.path(), "test.prompt").unwrap();
        assert_eq!(prompt.id, "test.prompt");
        assert_eq!(prompt.system, "Be terse.");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");

        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_default_used_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt_or_default(temp_dir.path(), DEFAULT_CHAT_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, DEFAULT_CHAT_PROMPT_ID);
        assert!(prompt.template.contains("{{chat_history}}"));
    }

    #[test]
    fn test_override_replaces_default() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            DEFAULT_CHAT_PROMPT_ID,
            &valid_prompt(DEFAULT_CHAT_PROMPT_ID),
        );

        let prompt = load_prompt_or_default(temp_dir.path(), DEFAULT_CHAT_PROMPT_ID).unwrap();
        assert_eq!(prompt.system, "Be terse.");
    }

    #[test]
    fn test_unknown_prompt_without_default() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt_or_default(temp_dir.path(), "rag.other").is_err());
    }

    #[test]
    fn test_template_must_reference_context() {
        let mut def = crate::defaults::default_chat_prompt();
        def.template = "Question: {{query}}".to_string();
        assert!(validate_prompt(&def).is_err());
    }

    #[test]
    fn test_list_prompts_sorted_yml_only() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "rag.chat.terse", &valid_prompt("rag.chat.terse"));
        write_prompt(temp_dir.path(), DEFAULT_CHAT_PROMPT_ID, &valid_prompt(DEFAULT_CHAT_PROMPT_ID));
        std::fs::write(temp_dir.path().join("notes.txt"), "not a prompt").unwrap();

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec![DEFAULT_CHAT_PROMPT_ID, "rag.chat.terse"]);

        assert!(list_prompts(&temp_dir.path().join("missing")).unwrap().is_empty());
    }
}
