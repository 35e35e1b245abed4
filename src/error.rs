use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Empty question.")]
    EmptyQuestion,

    #[error("Schema or table not found.")]
    NoRelevantTable,

    #[error("{0}")]
    UnsupportedIntent(String),

    #[error("Database execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// The user-facing answer for a request that stopped at this error.
    pub fn apology(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuestion => "Please provide a valid question.",
            PipelineError::NoRelevantTable => {
                "I couldn't find any relevant tables for your question."
            }
            PipelineError::UnsupportedIntent(_) => {
                "Sorry, I could not understand your question or generate SQL."
            }
            PipelineError::Execution(_) => "There was an error while running your SQL query.",
            PipelineError::Config(_) | PipelineError::Json(_) => {
                "Something went wrong while handling your question."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
