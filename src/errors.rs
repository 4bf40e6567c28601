use thiserror::Error;

use crate::config::ConfigError;
use crate::converter::LoweringError;
use crate::domain_model::DomainModelError;
use crate::executor::ExecutionError;
use crate::initializer::HydrationError;
use crate::query_parser::QueryParseError;
use crate::sql_renderer::RenderError;

/// Everything the pipeline can report to its caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] DomainModelError),

    #[error(transparent)]
    Parse(#[from] QueryParseError),

    /// Unknown navigables, cyclic fetches, ambiguous joins.
    #[error(transparent)]
    Lowering(#[from] LoweringError),

    /// Internal invariant violations found while rendering.
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error("`{query}` does not return rows; run it with execute_update")]
    NotASelect { query: String },

    #[error("`{query}` returns rows; run it with list")]
    NotAMutation { query: String },
}
