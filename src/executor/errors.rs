use thiserror::Error;

use super::store::StoreError;
use crate::domain_model::ValueConversionError;
use crate::value::Value;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No value supplied for parameter {parameter}")]
    MissingParameter { parameter: String },

    #[error("Parameter {parameter} cannot be bound: {source}")]
    ParameterType {
        parameter: String,
        source: ValueConversionError,
    },

    #[error("Store failure executing `{sql}` with parameters {parameters:?}: {source}")]
    Store {
        sql: String,
        parameters: Vec<Value>,
        source: StoreError,
    },
}
