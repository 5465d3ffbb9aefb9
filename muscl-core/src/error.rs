use thiserror::Error;

use crate::diagnostics::Violation;

pub type HydroResult<T> = Result<T, HydroError>;

#[derive(Debug, Error)]
pub enum HydroError {
    /// Rejected at construction; `field` is the dotted config path.
    #[error("invalid configuration `{field}`: {message}")]
    Config { field: String, message: String },

    #[error("non-physical state at iteration {iteration}, t = {time:e}: {violation} in cell {cell:?}")]
    NonPhysical {
        iteration: u64,
        time: f64,
        cell: Vec<usize>,
        violation: Violation,
    },

    #[error("time step failure at iteration {iteration}, t = {time:e}: {reason}")]
    TimeStep {
        iteration: u64,
        time: f64,
        reason: String,
    },

    /// A stencil or buffer contract was broken. Always fatal.
    #[error("stencil contract violated: {0}")]
    Consistency(String),

    #[error("communication failure: {0}")]
    Communication(String),

    #[error("run already finished at t = {time:e}")]
    Finished { time: f64 },
}

impl HydroError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        HydroError::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}
