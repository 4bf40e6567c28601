//! ClickHouse-backed [`StoreConnection`].
//!
//! Values are bound through the client's own `?` placeholder support and rows
//! are streamed as `JSONCompactEachRow`, one JSON array per line.

use async_trait::async_trait;
use clickhouse::Client;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::store::{RowCursor, StoreConnection, StoreError};
use crate::config::ClickHouseSettings;
use crate::value::Value;

const ROW_FORMAT: &str = "JSONCompactEachRow";

pub struct ClickHouseStore {
    client: Client,
}

impl ClickHouseStore {
    pub fn new(client: Client) -> Self {
        ClickHouseStore { client }
    }

    pub fn from_settings(settings: &ClickHouseSettings) -> Self {
        let client = Client::default()
            .with_url(&settings.url)
            .with_user(&settings.user)
            .with_password(&settings.password)
            .with_database(&settings.database)
            .with_option("join_use_nulls", "1"); // NULL for unmatched LEFT JOIN columns
        ClickHouseStore { client }
    }

    fn bound_query(&self, sql: &str, values: &[Value]) -> clickhouse::query::Query {
        values
            .iter()
            .fold(self.client.query(sql), |query, value| query.bind(value))
    }
}

#[async_trait]
impl StoreConnection for ClickHouseStore {
    async fn query(&self, sql: &str, values: &[Value]) -> Result<Box<dyn RowCursor>, StoreError> {
        let lines = self
            .bound_query(sql, values)
            .fetch_bytes(ROW_FORMAT)
            .map_err(|e| StoreError::with_source("ClickHouse query failed", e))?
            .lines();
        Ok(Box::new(LineCursor::new(lines)))
    }

    /// ClickHouse does not report affected rows for mutations; always 0.
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, StoreError> {
        self.bound_query(sql, values)
            .execute()
            .await
            .map_err(|e| StoreError::with_source("ClickHouse statement failed", e))?;
        Ok(0)
    }
}

/// Reads one JSON array per line.
pub struct LineCursor<R> {
    lines: Lines<R>,
}

impl<R> LineCursor<R> {
    pub fn new(lines: Lines<R>) -> Self {
        LineCursor { lines }
    }
}

#[async_trait]
impl<R> RowCursor for LineCursor<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| StoreError::with_source("reading ClickHouse response failed", e))?;
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<serde_json::Value> = serde_json::from_str(&line)
                .map_err(|e| StoreError::with_source("malformed ClickHouse row", e))?;
            return Ok(Some(cells.into_iter().map(Value::from_json).collect()));
        }
    }
}
