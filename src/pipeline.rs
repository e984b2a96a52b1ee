//! Pipeline Orchestrator
//!
//! Sequences routing, SQL synthesis, extraction, execution and
//! summarization for one question:
//!
//! ```text
//! ROUTING -> REJECTED | ROUTING_FAILED | SYNTHESIZING
//! SYNTHESIZING -> EXTRACTING -> EXECUTING -> EXECUTION_FAILED | SUMMARIZING -> DONE
//! ```
//!
//! Every terminal state yields exactly one caller-visible string.
//! Intermediate diagnostics only go through the Notifier.

use crate::execution::QueryExecutor;
use crate::llm::LanguageModel;
use crate::registry::DatasetRegistry;
use crate::routing::{Router, RoutingDecision};
use crate::summarize::Summarizer;
use crate::synthesis::SqlSynthesizer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};

/// Message returned when data could not be retrieved; never carries store internals
pub const EXECUTION_FAILED_MESSAGE: &str =
    "Sorry, I could not retrieve data to answer that question. Try rephrasing it or asking about something else.";

/// Message returned when the summary could not be produced
pub const SUMMARY_FAILED_MESSAGE: &str =
    "Sorry, I found the data but could not put an answer together. Please try again.";

/// Side-channel for intermediate progress
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

/// Discards every notification
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _text: &str) {}
}

/// Pipeline states, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Routing,
    Synthesizing,
    Extracting,
    Executing,
    Summarizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Routing => "ROUTING",
            Stage::Synthesizing => "SYNTHESIZING",
            Stage::Extracting => "EXTRACTING",
            Stage::Executing => "EXECUTING",
            Stage::Summarizing => "SUMMARIZING",
        };
        write!(f, "{}", name)
    }
}

/// Terminal state of one run and the text it hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Rejected(String),
    RoutingFailed(String),
    ExecutionFailed(String),
    Answered(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Rejected(t) | Outcome::RoutingFailed(t) | Outcome::ExecutionFailed(t) | Outcome::Answered(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Rejected(t) | Outcome::RoutingFailed(t) | Outcome::ExecutionFailed(t) | Outcome::Answered(t) => t,
        }
    }
}

/// Models for each stage; router and summarizer are the "senior" side,
/// the SQL generator the "junior" side
#[derive(Clone)]
pub struct StageModels {
    pub router: Arc<dyn LanguageModel>,
    pub sql: Arc<dyn LanguageModel>,
    pub summarizer: Arc<dyn LanguageModel>,
}

impl StageModels {
    /// One model for every stage
    pub fn shared(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            router: Arc::clone(&model),
            sql: Arc::clone(&model),
            summarizer: model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub query_timeout: Duration,
    pub max_rows: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            max_rows: 50,
        }
    }
}

/// Stateless across questions; safe to share between tasks
pub struct Pipeline {
    registry: Arc<DatasetRegistry>,
    router: Router,
    synthesizer: SqlSynthesizer,
    executor: QueryExecutor,
    summarizer: Summarizer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        models: StageModels,
        executor: QueryExecutor,
        registry: Arc<DatasetRegistry>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            router: Router::new(models.router, Arc::clone(&registry)),
            synthesizer: SqlSynthesizer::new(models.sql, executor.dialect(), settings.max_rows),
            summarizer: Summarizer::new(models.summarizer),
            executor,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// Public entry point: the final text for one question
    pub async fn answer(&self, question: &str, notifier: &dyn Notifier) -> String {
        self.run(question, notifier).await.into_text()
    }

    /// Runs the state machine and reports which terminal state was reached
    pub async fn run(&self, question: &str, notifier: &dyn Notifier) -> Outcome {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("question", %request_id);
        self.run_stages(question, notifier).instrument(span).await
    }

    async fn run_stages(&self, question: &str, notifier: &dyn Notifier) -> Outcome {
        info!(stage = %Stage::Routing, "Routing question");
        let (dataset, rephrased) = match self.router.route(question).await {
            Ok(RoutingDecision::Unanswerable { reason }) => {
                info!("Question rejected by router");
                return Outcome::Rejected(reason);
            }
            Ok(RoutingDecision::Answerable {
                dataset,
                rephrased_question,
            }) => (dataset, rephrased_question),
            Err(e) => {
                error!(error = %e, "Routing failed");
                return Outcome::RoutingFailed(e.to_string());
            }
        };
        notifier
            .notify(&format!("Routing to `{}`: {}", dataset.marker, rephrased))
            .await;

        info!(stage = %Stage::Synthesizing, dataset = %dataset.name, "Generating SQL");
        let candidate = match self.synthesizer.synthesize(&rephrased, &dataset).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "SQL generation failed");
                return Outcome::ExecutionFailed(EXECUTION_FAILED_MESSAGE.to_string());
            }
        };

        info!(stage = %Stage::Extracting, "Extracting SQL");
        let Some(sql) = candidate.sql else {
            error!(raw = %candidate.raw, "No SQL could be extracted from the model reply");
            return Outcome::ExecutionFailed(EXECUTION_FAILED_MESSAGE.to_string());
        };
        notifier.notify(&format!("Generated SQL:\n```\n{}\n```", sql)).await;

        info!(stage = %Stage::Executing, "Executing SQL");
        let result = match self.executor.execute(&sql, self.settings.query_timeout).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, sql = %sql, "Execution failed");
                return Outcome::ExecutionFailed(EXECUTION_FAILED_MESSAGE.to_string());
            }
        };
        let table = result.to_markdown_table();
        notifier.notify(&format!("Query result:\n```\n{}\n```", table)).await;

        info!(stage = %Stage::Summarizing, rows = result.row_count, "Summarizing result");
        match self.summarizer.summarize(question, &table).await {
            Ok(answer) => {
                info!("Question answered");
                Outcome::Answered(answer)
            }
            Err(e) => {
                error!(error = %e, "Summarization failed");
                Outcome::ExecutionFailed(SUMMARY_FAILED_MESSAGE.to_string())
            }
        }
    }
}
