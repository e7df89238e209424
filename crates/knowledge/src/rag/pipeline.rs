//! Retrieval pipeline orchestration.
//!
//! A query moves through a fixed sequence of stages. Each stage appends a
//! step to the trace. No failure escapes [`RagPipeline::query`]: errors end
//! in the `Error` stage with a generic answer and the error recorded in the
//! trace.

use super::context::assemble_context;
use super::filter::{filter_by_confidence, ScoredPassage};
use super::qa_log::{QaLog, QaLogEntry};
use super::query::{classify_query, enhance_query, extract_history_context, retrieval_count};
use super::trace::RetrievalTrace;
use super::types::{ChatHistory, QueryType, RagAnswer};
use crate::vector_index::{QueryResult, VectorIndex};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tabula_core::{AppError, AppResult, ErrorKind, RagSettings};
use tabula_llm::{collect_stream, LlmClient, LlmRequest};
use tabula_prompt::{build_prompt, default_chat_prompt, format_chat_history, PromptDefinition};

/// Answer when no retrieved chunk meets the confidence threshold.
pub const NO_DATA_ANSWER: &str = "Data Not Available";

/// Answer when the query fails before a response could be generated.
pub const QUERY_FAILED_ANSWER: &str = "An error occurred while processing your query.";

/// Answer when the completion provider fails.
pub const COMPLETION_FAILED_ANSWER: &str =
    "An error occurred while generating the response. Please try again later.";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AnalyzeQuery,
    CheckHistory,
    Search,
    FilterContext,
    ShortCircuitNoData,
    CombineContext,
    EnhanceQuery,
    GenerateResponse,
    Persist,
    Done,
    Error,
}

impl Stage {
    /// Trace step recorded on entering the stage.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Stage::AnalyzeQuery => Some("Analyzing query type"),
            Stage::CheckHistory => Some("Checking chat history for context"),
            Stage::Search => Some("Performing semantic search"),
            Stage::FilterContext => Some("Filtering relevant contexts"),
            Stage::ShortCircuitNoData => Some("No context met the confidence threshold"),
            Stage::CombineContext => Some("Combining contexts and generating response"),
            Stage::EnhanceQuery => Some("Enhanced query with context and metadata awareness"),
            Stage::GenerateResponse => Some("Generating response"),
            Stage::Persist => Some("Saving question and answer to log"),
            Stage::Done | Stage::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }
}

/// Working state of one query.
struct QueryRun<'a> {
    query: &'a str,
    history: &'a ChatHistory,
    query_type: QueryType,
    history_context: String,
    retrieved: QueryResult,
    passages: Vec<ScoredPassage>,
    context: String,
    enhanced_query: String,
    answer: String,
    outcome: Option<ErrorKind>,
    trace: RetrievalTrace,
}

impl<'a> QueryRun<'a> {
    fn new(query: &'a str, history: &'a ChatHistory) -> Self {
        Self {
            query,
            history,
            query_type: QueryType::Data,
            history_context: String::new(),
            retrieved: QueryResult::default(),
            passages: Vec::new(),
            context: String::new(),
            enhanced_query: String::new(),
            answer: String::new(),
            outcome: None,
            trace: RetrievalTrace::new(),
        }
    }
}

/// Grounded question answering over the vector index.
///
/// Built once by the caller from explicit service handles and shared by
/// every session; it holds no per-conversation state.
pub struct RagPipeline {
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    model: String,
    settings: RagSettings,
    prompt: PromptDefinition,
    qa_log: Option<Arc<QaLog>>,
}

impl RagPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        settings: RagSettings,
    ) -> Self {
        Self {
            index,
            llm,
            model: model.into(),
            settings,
            prompt: default_chat_prompt(),
            qa_log: None,
        }
    }

    /// Use a custom chat prompt.
    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    /// Persist every generated answer to `qa_log`.
    pub fn with_qa_log(mut self, qa_log: Arc<QaLog>) -> Self {
        self.qa_log = Some(qa_log);
        self
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Answer `query` in the context of `history`.
    ///
    /// Always returns an answer and its trace; failures are reported through
    /// the trace's `error` field and the answer's `outcome`.
    pub async fn query(&self, query: &str, history: &ChatHistory) -> RagAnswer {
        tracing::info!("Answering query: {}", query);

        let mut run = QueryRun::new(query, history);
        let mut stage = Stage::AnalyzeQuery;

        while !stage.is_terminal() {
            if let Some(step) = stage.description() {
                run.trace.step(step);
            }

            stage = match self.advance(stage, &mut run).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!("Query failed in {:?}: {}", stage, e);
                    run.trace.fail(&e);
                    run.answer = QUERY_FAILED_ANSWER.to_string();
                    Stage::Error
                }
            };
        }

        RagAnswer {
            answer: run.answer,
            query_type: run.query_type,
            outcome: run.outcome.or(run.trace.error_kind),
            trace: run.trace,
        }
    }

    async fn advance(&self, stage: Stage, run: &mut QueryRun<'_>) -> AppResult<Stage> {
        match stage {
            Stage::AnalyzeQuery => {
                run.query_type = classify_query(run.query);
                run.trace.metadata_used = run.query_type == QueryType::Metadata;
                tracing::debug!("Query classified as {}", run.query_type.as_str());
                Ok(Stage::CheckHistory)
            }

            Stage::CheckHistory => {
                run.history_context = extract_history_context(run.history);
                Ok(Stage::Search)
            }

            Stage::Search => {
                let k = retrieval_count(self.settings.n_chunks, run.query_type);
                run.retrieved = self.index.query(run.query, k).await.map_err(|e| match e {
                    AppError::Retrieval(_) => e,
                    other => AppError::Retrieval(other.to_string()),
                })?;
                tracing::debug!(
                    "Retrieved {} chunks (k={}), scores {:?}",
                    run.retrieved.len(),
                    k,
                    run.retrieved.scores
                );
                Ok(Stage::FilterContext)
            }

            Stage::FilterContext => {
                run.passages =
                    filter_by_confidence(&run.retrieved, self.settings.confidence_threshold);
                for passage in &run.passages {
                    run.trace.record_passage(passage);
                }
                tracing::debug!(
                    "{} of {} chunks met threshold {}",
                    run.passages.len(),
                    run.retrieved.len(),
                    self.settings.confidence_threshold
                );

                if run.passages.is_empty() {
                    Ok(Stage::ShortCircuitNoData)
                } else {
                    Ok(Stage::CombineContext)
                }
            }

            Stage::ShortCircuitNoData => {
                let no_data = AppError::NoRelevantData(format!(
                    "no chunk scored at least {}",
                    self.settings.confidence_threshold
                ));
                tracing::info!("{}", no_data);
                run.outcome = Some(no_data.kind());
                run.answer = NO_DATA_ANSWER.to_string();
                Ok(Stage::Done)
            }

            Stage::CombineContext => {
                let texts: Vec<&str> = run.passages.iter().map(|p| p.text.as_str()).collect();
                run.context = assemble_context(&texts);
                Ok(Stage::EnhanceQuery)
            }

            Stage::EnhanceQuery => {
                run.enhanced_query =
                    enhance_query(run.query, run.query_type, &run.history_context);
                Ok(Stage::GenerateResponse)
            }

            Stage::GenerateResponse => {
                let request = self.build_request(run)?;

                match self.complete(&request).await {
                    Ok(answer) => run.answer = answer,
                    Err(e) => {
                        tracing::warn!("Completion failed: {}", e);
                        run.trace.fail(&e);
                        run.answer = COMPLETION_FAILED_ANSWER.to_string();
                    }
                }

                if self.qa_log.is_some() {
                    Ok(Stage::Persist)
                } else {
                    Ok(Stage::Done)
                }
            }

            Stage::Persist => {
                self.persist(run).await;
                Ok(Stage::Done)
            }

            Stage::Done | Stage::Error => Ok(stage),
        }
    }

    fn build_request(&self, run: &QueryRun<'_>) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert(
            "chat_history".to_string(),
            format_chat_history(&run.history.pairs()),
        );
        variables.insert("context".to_string(), run.context.clone());
        variables.insert("query".to_string(), run.enhanced_query.clone());

        let built = build_prompt(&self.prompt, variables)?;

        Ok(LlmRequest::new(&self.model)
            .with_system(built.system)
            .with_user(built.user)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .with_top_p(self.settings.top_p)
            .with_streaming())
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<String> {
        let to_completion = |e: AppError| match e {
            AppError::Completion(_) => e,
            other => AppError::Completion(other.to_string()),
        };

        let stream = self.llm.stream(request).await.map_err(to_completion)?;
        collect_stream(stream).await.map_err(to_completion)
    }

    async fn persist(&self, run: &QueryRun<'_>) {
        let Some(qa_log) = &self.qa_log else {
            return;
        };

        let entry = QaLogEntry {
            question: run.query.to_string(),
            answer: run.answer.clone(),
            query_type: run.query_type,
            retrieval_details: run.trace.clone(),
            timestamp: Some(Utc::now()),
        };

        if let Err(e) = qa_log.append(&entry).await {
            tracing::error!("Failed to save QA log entry to {:?}: {}", qa_log.path(), e);
        }
    }
}
