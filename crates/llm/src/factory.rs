//! Completion client factory.

use crate::client::LlmClient;
use crate::providers::ChatCompletionsClient;
use crate::types::ProviderType;
use std::sync::Arc;
use tabula_core::{AppError, AppResult};

/// Create a completion client for a provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("groq", "openai", "ollama")
/// * `endpoint` - Optional base URL overriding the provider default
/// * `api_key` - API key, required by every provider except Ollama
///
/// # Errors
/// Returns a `Config` error if the provider is unknown or its key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    if provider_type.requires_api_key() && api_key.is_none() {
        return Err(AppError::Config(format!(
            "{} provider requires API key",
            provider_type.as_str()
        )));
    }

    let base_url = endpoint.unwrap_or_else(|| provider_type.default_endpoint());
    tracing::debug!(
        "Creating {} client at {}",
        provider_type.as_str(),
        base_url
    );

    let client = ChatCompletionsClient::new(
        provider_type.as_str(),
        base_url,
        api_key.map(str::to_string),
    )?;

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_groq_with_key() {
        let client = create_client("groq", None, Some("gsk_test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_groq_requires_api_key() {
        match create_client("groq", None, None) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for Groq without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
