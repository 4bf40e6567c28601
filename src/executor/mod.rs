//! Statement execution.
//!
//! The [`Executor`] pairs each bind descriptor with the caller's value,
//! encodes it through the descriptor's value mapping and hands statement text
//! plus ordered values to a [`StoreConnection`]. Store failures come back as
//! [`ExecutionError::Store`] carrying the SQL and the bound values; nothing is
//! retried here.

pub mod clickhouse_store;
mod errors;
mod parameters;
mod store;

pub use clickhouse_store::{ClickHouseStore, LineCursor};
pub use errors::ExecutionError;
pub use parameters::QueryParameters;
pub use store::{RowCursor, StoreConnection, StoreError, VecCursor};

#[cfg(test)]
pub use store::MockStoreConnection;

use log::{debug, error};

use crate::sql_ast::{ParameterBinding, ParameterSource};
use crate::value::Value;

/// Resolve every bind descriptor, in placeholder order, to an encoded value.
pub fn bind_values(
    bindings: &[ParameterBinding],
    parameters: &QueryParameters,
) -> Result<Vec<Value>, ExecutionError> {
    bindings
        .iter()
        .map(|binding| {
            let value = match &binding.source {
                ParameterSource::Named(name) => parameters.named(name),
                ParameterSource::Positional(position) => parameters.positional(*position),
                ParameterSource::Literal(value) => Some(value),
            }
            .ok_or_else(|| ExecutionError::MissingParameter {
                parameter: binding.source.to_string(),
            })?;
            match &binding.mapping {
                Some(mapping) => mapping
                    .encode(value)
                    .map_err(|source| ExecutionError::ParameterType {
                        parameter: binding.source.to_string(),
                        source,
                    }),
                None => Ok(value.clone()),
            }
        })
        .collect()
}

/// Runs rendered statements against one connection.
pub struct Executor<'c> {
    connection: &'c dyn StoreConnection,
}

impl<'c> Executor<'c> {
    pub fn new(connection: &'c dyn StoreConnection) -> Self {
        Executor { connection }
    }

    pub async fn query(
        &self,
        sql: &str,
        bindings: &[ParameterBinding],
        parameters: &QueryParameters,
    ) -> Result<ResultCursor, ExecutionError> {
        let values = bind_values(bindings, parameters)?;
        debug!("Executing SQL:\n{}\nwith {:?}", sql, values);
        match self.connection.query(sql, &values).await {
            Ok(inner) => Ok(ResultCursor {
                inner,
                sql: sql.to_string(),
                values,
                done: false,
            }),
            Err(source) => {
                error!("Store query failed. SQL was:\n{}\nError: {}", sql, source);
                Err(ExecutionError::Store {
                    sql: sql.to_string(),
                    parameters: values,
                    source,
                })
            }
        }
    }

    pub async fn execute(
        &self,
        sql: &str,
        bindings: &[ParameterBinding],
        parameters: &QueryParameters,
    ) -> Result<u64, ExecutionError> {
        let values = bind_values(bindings, parameters)?;
        debug!("Executing SQL:\n{}\nwith {:?}", sql, values);
        self.connection.execute(sql, &values).await.map_err(|source| {
            error!("Store statement failed. SQL was:\n{}\nError: {}", sql, source);
            ExecutionError::Store {
                sql: sql.to_string(),
                parameters: values,
                source,
            }
        })
    }
}

/// Row cursor that remembers its statement for error reporting and fuses
/// after exhaustion or the first failure.
pub struct ResultCursor {
    inner: Box<dyn RowCursor>,
    sql: String,
    values: Vec<Value>,
    done: bool,
}

impl ResultCursor {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>, ExecutionError> {
        if self.done {
            return Ok(None);
        }
        match self.inner.next_row().await {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(source) => {
                self.done = true;
                error!("Reading rows failed. SQL was:\n{}\nError: {}", self.sql, source);
                Err(ExecutionError::Store {
                    sql: self.sql.clone(),
                    parameters: self.values.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::value_mapping::INT64;
    use async_trait::async_trait;
    use mockall::predicate::eq;

    fn named(name: &str, mapping: Option<crate::domain_model::ValueMapping>) -> ParameterBinding {
        ParameterBinding {
            source: ParameterSource::Named(name.to_string()),
            mapping,
        }
    }

    #[test]
    fn test_bind_values_in_placeholder_order() {
        let bindings = vec![
            named("b", Some(INT64)),
            ParameterBinding {
                source: ParameterSource::Literal(Value::from("lit")),
                mapping: None,
            },
            ParameterBinding {
                source: ParameterSource::Positional(1),
                mapping: None,
            },
            named("b", Some(INT64)),
        ];
        let params = QueryParameters::new()
            .with_named("b", "7")
            .with_positional(true);
        let values = bind_values(&bindings, &params).unwrap();
        assert_eq!(
            values,
            vec![Value::Int(7), Value::from("lit"), Value::Bool(true), Value::Int(7)]
        );
    }

    #[test]
    fn test_bind_values_reports_missing_and_mistyped() {
        let err = bind_values(&[named("a", None)], &QueryParameters::new()).unwrap_err();
        assert!(matches!(err, ExecutionError::MissingParameter { ref parameter } if parameter == ":a"));

        let params = QueryParameters::new().with_named("a", "seven");
        let err = bind_values(&[named("a", Some(INT64))], &params).unwrap_err();
        assert!(matches!(err, ExecutionError::ParameterType { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_carries_sql_and_values() {
        let mut store = MockStoreConnection::new();
        store
            .expect_query()
            .with(eq("SELECT 1 WHERE ?"), eq(vec![Value::Int(3)]))
            .returning(|_, _| Err(StoreError::new("connection reset")));
        let executor = Executor::new(&store);
        let params = QueryParameters::new().with_named("a", 3);
        let err = match executor
            .query("SELECT 1 WHERE ?", &[named("a", Some(INT64))], &params)
            .await
        {
            Err(err) => err,
            Ok(_) => panic!("expected a store failure"),
        };
        match err {
            ExecutionError::Store {
                sql,
                parameters,
                source,
            } => {
                assert_eq!(sql, "SELECT 1 WHERE ?");
                assert_eq!(parameters, vec![Value::Int(3)]);
                assert_eq!(source.message, "connection reset");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    struct FailingCursor {
        served: bool,
    }

    #[async_trait]
    impl RowCursor for FailingCursor {
        async fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
            if self.served {
                return Err(StoreError::new("timeout"));
            }
            self.served = true;
            Ok(Some(vec![Value::Int(1)]))
        }
    }

    #[tokio::test]
    async fn test_cursor_fuses_after_failure() {
        let mut store = MockStoreConnection::new();
        store
            .expect_query()
            .returning(|_, _| Ok(Box::new(FailingCursor { served: false })));
        let executor = Executor::new(&store);
        let mut cursor = match executor.query("SELECT 1", &[], &QueryParameters::new()).await {
            Ok(cursor) => cursor,
            Err(err) => panic!("{}", err),
        };
        assert_eq!(cursor.next_row().await.unwrap(), Some(vec![Value::Int(1)]));
        assert!(cursor.next_row().await.is_err());
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_execute_returns_store_count() {
        let mut store = MockStoreConnection::new();
        store.expect_execute().times(1).returning(|_, _| Ok(4));
        let executor = Executor::new(&store);
        let count = executor
            .execute("DELETE FROM notes", &[], &QueryParameters::new())
            .await
            .unwrap();
        assert_eq!(count, 4);
    }
}
