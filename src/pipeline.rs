//! Question answering pipeline
//!
//! Runs schema selection, intent matching, execution and synthesis in order
//! and packages each stage's output into an [`AskResponse`]. The first
//! failing stage ends the request; later stages are not invoked.

use crate::error::PipelineError;
use crate::executor::{QueryExecutor, Row};
use crate::intent::IntentMatcher;
use crate::schema::{SchemaCatalog, TableSet};
use crate::synth;
use crate::time::Clock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const NO_MATCHING_RECORDS: &str = "No matching records found for your question.";

/// What each stage produced, `None` for stages never reached.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Steps {
    pub schema_used: Option<TableSet>,
    pub generated_sql: Option<String>,
    pub result_rows: Option<Vec<Row>>,
}

/// Response envelope for one question.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub error: Option<String>,
    pub steps: Steps,
}

impl AskResponse {
    fn failed(err: &PipelineError, steps: Steps) -> Self {
        Self {
            answer: err.apology().to_string(),
            error: Some(err.to_string()),
            steps,
        }
    }
}

pub struct AskPipeline {
    catalog: &'static SchemaCatalog,
    executor: Arc<dyn QueryExecutor>,
    clock: Clock,
}

impl AskPipeline {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            catalog: SchemaCatalog::global(),
            executor,
            clock: Clock::System,
        }
    }

    /// Pin "today" for temporal phrases such as "last year".
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn ask(&self, question: &str) -> AskResponse {
        let request_id = Uuid::new_v4();
        self.run(question)
            .instrument(info_span!("ask", %request_id))
            .await
    }

    async fn run(&self, question: &str) -> AskResponse {
        let question = question.trim();
        if question.is_empty() {
            return AskResponse::failed(&PipelineError::EmptyQuestion, Steps::default());
        }
        debug!("Question: {}", question);

        let relevant = self.catalog.relevant_tables(question);
        if relevant.is_empty() {
            return AskResponse::failed(&PipelineError::NoRelevantTable, Steps::default());
        }
        debug!(tables = ?relevant.keys().collect::<Vec<_>>(), "Relevant tables");

        let matcher = IntentMatcher::new(self.clock.resolver());
        let directive = matcher.build(question, &relevant);
        let sql = match (directive.sql, directive.error) {
            (Some(sql), None) => sql,
            (_, error) => {
                let message = error.unwrap_or_else(|| crate::intent::UNSUPPORTED_QUERY.to_string());
                warn!("Unsupported question");
                return AskResponse::failed(
                    &PipelineError::UnsupportedIntent(message),
                    Steps {
                        schema_used: Some(relevant),
                        ..Steps::default()
                    },
                );
            }
        };
        info!(rule = ?directive.rule, params = directive.params.len(), "Generated SQL: {}", sql);

        let rows = match self.executor.execute(&sql, &directive.params).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Execution failed: {}", e);
                let err = match e {
                    PipelineError::Execution(_) => e,
                    other => PipelineError::Execution(other.to_string()),
                };
                return AskResponse::failed(
                    &err,
                    Steps {
                        schema_used: Some(relevant),
                        generated_sql: Some(sql),
                        result_rows: None,
                    },
                );
            }
        };
        info!(rows = rows.len(), "Query executed");

        if rows.is_empty() {
            return AskResponse {
                answer: NO_MATCHING_RECORDS.to_string(),
                error: None,
                steps: Steps {
                    schema_used: Some(relevant),
                    generated_sql: Some(sql),
                    result_rows: Some(rows),
                },
            };
        }

        let answer = synth::synthesize(question, &rows);
        AskResponse {
            answer,
            error: None,
            steps: Steps {
                schema_used: Some(relevant),
                generated_sql: Some(sql),
                result_rows: Some(rows),
            },
        }
    }
}
