//! Tabula CLI
//!
//! Ingests tables with their column metadata into a local vector index and
//! answers questions over them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, IngestCommand, LogCommand, PromptsCommand};
use std::path::PathBuf;
use tabula_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppResult,
};

/// Tabula - grounded question answering over tabular records
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(about = "Grounded question answering over tabular records", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TABULA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TABULA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Completion provider (groq, openai, ollama)
    #[arg(short, long, global = true, env = "TABULA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "TABULA_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest tables and their column metadata into the vector index
    Ingest(IngestCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive multi-turn conversation
    Chat(ChatCommand),

    /// Show recently answered questions
    Log(LogCommand),

    /// List the chat prompts available to the workspace
    Prompts(PromptsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Log(_) => "log",
            Commands::Prompts(_) => "prompts",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let log_format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_format)?;

    tracing::info!("Tabula CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_tabula_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Log(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["tabula", "ask", "What columns exist?", "--json"]).unwrap();
        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.question, "What columns exist?");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_file_requires_metadata() {
        assert!(Cli::try_parse_from(["tabula", "ingest", "--file", "sales.json"]).is_err());

        let cli = Cli::try_parse_from([
            "tabula",
            "ingest",
            "--file",
            "sales.json",
            "--metadata",
            "sales.yaml",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest(cmd) => {
                assert_eq!(cmd.file, Some(PathBuf::from("sales.json")));
                assert!(cmd.force);
                assert!(!cmd.reset);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_file_with_directory_env_set() {
        std::env::set_var("DATA_DIR", "/srv/tabula/data");
        std::env::set_var("METADATA_DIR", "/srv/tabula/metadata");

        let cli = Cli::try_parse_from([
            "tabula",
            "ingest",
            "--file",
            "sales.json",
            "--metadata",
            "sales.yaml",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest(cmd) => {
                assert_eq!(cmd.file, Some(PathBuf::from("sales.json")));
                assert_eq!(cmd.metadata, Some(PathBuf::from("sales.yaml")));
                assert_eq!(cmd.data_dir, Some(PathBuf::from("/srv/tabula/data")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tabula", "log", "--limit", "3", "--provider", "ollama"]).unwrap();
        assert_eq!(cli.provider.as_deref(), Some("ollama"));
        assert_eq!(cli.command.name(), "log");

        let cli = Cli::try_parse_from(["tabula", "prompts", "--json"]).unwrap();
        assert_eq!(cli.command.name(), "prompts");
    }
}
