//! Completion capability for Tabula.
//!
//! A provider-agnostic chat completion interface ([`LlmClient`]) plus one
//! implementation for OpenAI-compatible APIs (Groq, OpenAI, Ollama).
//!
//! # Example
//! ```no_run
//! use tabula_llm::{collect_stream, create_client, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None)?;
//! let request = LlmRequest::new("llama3.2")
//!     .with_system("Answer briefly.")
//!     .with_user("Hello!");
//! let answer = collect_stream(client.stream(&request).await?).await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    collect_stream, ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmStream,
    LlmStreamChunk, LlmUsage,
};
pub use factory::create_client;
pub use providers::ChatCompletionsClient;
pub use types::ProviderType;
