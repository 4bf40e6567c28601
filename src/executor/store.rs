use async_trait::async_trait;
use thiserror::Error;

use crate::value::Value;

/// Opaque failure reported by the store. The pipeline wraps it and never
/// looks at store-specific codes.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Forward-only, single-pass row sequence.
#[async_trait]
pub trait RowCursor: Send {
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError>;
}

/// Accepts statement text plus ordered bound values.
///
/// Placeholders are positional `?` markers; `values[i]` binds the i-th one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreConnection: Send + Sync {
    async fn query(&self, sql: &str, values: &[Value]) -> Result<Box<dyn RowCursor>, StoreError>;

    /// Returns the number of affected rows when the store reports it.
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, StoreError>;
}

/// Cursor over rows already held in memory.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl VecCursor {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        VecCursor {
            rows: rows.into_iter(),
        }
    }
}

#[async_trait]
impl RowCursor for VecCursor {
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
        Ok(self.rows.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_vec_cursor_drains_in_order() {
        let mut cursor = VecCursor::new(vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        tokio_test::block_on(async {
            assert_eq!(cursor.next_row().await.unwrap(), Some(vec![Value::Int(1)]));
            assert_eq!(cursor.next_row().await.unwrap(), Some(vec![Value::Int(2)]));
            assert_eq!(cursor.next_row().await.unwrap(), None);
        });
    }

    #[test]
    fn test_store_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::with_source("connection lost", io);
        assert_eq!(err.to_string(), "connection lost");
        assert!(err.source().is_some());
        assert!(StoreError::new("plain").source().is_none());
    }
}
