//! Command handlers for the Tabula CLI.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod log;
pub mod prompts;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use log::LogCommand;
pub use prompts::PromptsCommand;
