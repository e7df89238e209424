//! Ask command handler.
//!
//! Answers one question with an empty chat history.

use clap::Args;
use std::sync::Arc;
use tabula_core::{config::AppConfig, AppResult};
use tabula_knowledge::{
    build_pipeline, open_index, ChatHistory, Explanation, RagAnswer, RagPipeline, VectorIndex,
};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output answer and full retrieval trace as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let pipeline = open_pipeline(config).await?;
        let answer = pipeline.query(&self.question, &ChatHistory::new()).await;

        if self.json {
            println!("{}", answer_json(&self.question, &answer)?);
        } else {
            println!("{}", answer.answer);
            println!();
            print!("{}", Explanation::from_trace(&answer.trace));
        }

        Ok(())
    }
}

/// Validate the configuration and build the pipeline over the workspace index.
pub async fn open_pipeline(config: &AppConfig) -> AppResult<RagPipeline> {
    config.validate()?;

    let index = Arc::new(open_index(config)?);
    let count = index.count().await?;
    if count == 0 {
        tracing::warn!("Vector index is empty");
        eprintln!("The index is empty. Run 'tabula ingest' first.");
    } else {
        tracing::debug!("Vector index holds {} chunks", count);
    }

    build_pipeline(config, index)
}

/// Answer and trace as pretty-printed JSON.
pub fn answer_json(question: &str, answer: &RagAnswer) -> AppResult<String> {
    let output = serde_json::json!({
        "question": question,
        "answer": answer.answer,
        "queryType": answer.query_type,
        "outcome": answer.outcome,
        "trace": answer.trace,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::ErrorKind;
    use tabula_knowledge::{QueryType, RetrievalTrace, NO_DATA_ANSWER};

    #[test]
    fn test_answer_json_reports_outcome() {
        let answer = RagAnswer {
            answer: NO_DATA_ANSWER.to_string(),
            query_type: QueryType::Data,
            outcome: Some(ErrorKind::NoRelevantData),
            trace: RetrievalTrace::new(),
        };

        let json: serde_json::Value =
            serde_json::from_str(&answer_json("Average price?", &answer).unwrap()).unwrap();
        assert_eq!(json["answer"], "Data Not Available");
        assert_eq!(json["outcome"], "no_relevant_data");
        assert_eq!(json["queryType"], "data");
    }
}
