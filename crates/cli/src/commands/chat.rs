//! Chat command handler.
//!
//! A line-oriented REPL. The conversation history lives here, owned by the
//! session, and is handed to the pipeline on every turn.

use super::ask::open_pipeline;
use clap::Args;
use std::io::Write;
use tabula_core::{config::AppConfig, AppResult};
use tabula_knowledge::{ChatHistory, Explanation};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive multi-turn conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Print the retrieval summary after every answer
    #[arg(long)]
    pub explain: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let pipeline = open_pipeline(config).await?;
        let mut history = ChatHistory::new();

        println!("Ask a question about your data. Type 'clear' to reset, 'exit' to quit.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let question = line.trim();
            match question {
                "" => continue,
                "exit" | "quit" => break,
                "clear" => {
                    history = ChatHistory::new();
                    println!("Chat history cleared.");
                    continue;
                }
                _ => {}
            }

            let answer = pipeline.query(question, &history).await;

            println!("{}", answer.answer);
            if self.explain {
                println!();
                print!("{}", Explanation::from_trace(&answer.trace));
            }
            println!();

            history.push(question, answer.answer);
        }

        tracing::info!("Chat ended after {} turns", history.len());
        Ok(())
    }
}
