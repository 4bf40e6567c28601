use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relgraph::config::PipelineConfig;
use relgraph::domain_model::{DomainModel, DomainModelConfig};
use relgraph::executor::{RowCursor, StoreConnection, StoreError, VecCursor};
use relgraph::{QueryEngine, Value};

pub fn shop_model() -> DomainModel {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/shop.yaml");
    DomainModelConfig::from_yaml_file(path)
        .and_then(|config| config.build())
        .expect("shop fixture should load")
}

pub fn shop_engine() -> QueryEngine {
    QueryEngine::new(Arc::new(shop_model()), PipelineConfig::default())
}

/// What the store answers to the next statement.
pub enum Canned {
    Rows(Vec<Vec<Value>>),
    Affected(u64),
    Fail(&'static str),
}

/// Replays canned answers in order and records every statement it receives.
#[derive(Default)]
pub struct MemoryStore {
    answers: Mutex<VecDeque<Canned>>,
    received: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemoryStore {
    pub fn new(answers: Vec<Canned>) -> Self {
        MemoryStore {
            answers: Mutex::new(answers.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<(String, Vec<Value>)> {
        self.received.lock().unwrap().clone()
    }

    fn next(&self, sql: &str, values: &[Value]) -> Canned {
        self.received
            .lock()
            .unwrap()
            .push((sql.to_string(), values.to_vec()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Canned::Fail("no canned answer left"))
    }
}

#[async_trait]
impl StoreConnection for MemoryStore {
    async fn query(&self, sql: &str, values: &[Value]) -> Result<Box<dyn RowCursor>, StoreError> {
        match self.next(sql, values) {
            Canned::Rows(rows) => Ok(Box::new(VecCursor::new(rows))),
            Canned::Affected(_) => Err(StoreError::new("statement does not return rows")),
            Canned::Fail(message) => Err(StoreError::new(message)),
        }
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, StoreError> {
        match self.next(sql, values) {
            Canned::Affected(count) => Ok(count),
            Canned::Rows(_) => Err(StoreError::new("statement returns rows")),
            Canned::Fail(message) => Err(StoreError::new(message)),
        }
    }
}

pub fn int(i: i64) -> Value {
    Value::Int(i)
}

pub fn text(s: &str) -> Value {
    Value::from(s)
}
