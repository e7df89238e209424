//! Log command handler.

use clap::Args;
use tabula_core::{config::AppConfig, AppResult};
use tabula_knowledge::QaLog;

/// Show recently answered questions
#[derive(Args, Debug)]
pub struct LogCommand {
    /// Number of most recent entries to show
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LogCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing log command");

        let log = QaLog::new(config.qa_log_path());
        let entries = log.load().await?;
        let start = entries.len().saturating_sub(self.limit);
        let recent = &entries[start..];

        if self.json {
            println!("{}", serde_json::to_string_pretty(recent)?);
            return Ok(());
        }

        if recent.is_empty() {
            println!("No questions logged yet ({:?})", log.path());
            return Ok(());
        }

        for entry in recent {
            match entry.timestamp {
                Some(ts) => println!("[{}] Q: {}", ts.format("%Y-%m-%d %H:%M:%S"), entry.question),
                None => println!("Q: {}", entry.question),
            }
            println!("A: {}", entry.answer);

            let details = &entry.retrieval_details;
            print!(
                "   {} query, {} chunks",
                entry.query_type.as_str(),
                details.chunks.len()
            );
            if let Some(ref error) = details.error {
                print!(", error: {}", error);
            }
            println!();
            println!();
        }

        Ok(())
    }
}
