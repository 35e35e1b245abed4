//! Natural-language questions over the customers / employees / products /
//! sales dataset, answered by deterministic rule matching.

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod intent;
pub mod pipeline;
pub mod schema;
pub mod synth;
pub mod time;

pub use error::{PipelineError, Result};
pub use pipeline::{AskPipeline, AskResponse};
