//! Query engine and unit of work.
//!
//! A [`QueryEngine`] owns the domain model, the configuration and the
//! statement cache; it is shared. A [`Session`] is one unit of work: it owns
//! an [`IdentityRegistry`] and borrows a store connection, and is used from a
//! single task at a time. Every `list` call builds a fresh initializer forest
//! under a fresh execution id.

mod cache;
mod prepared;
mod results;

pub use cache::{CacheStats, StatementCache, StatementCacheKey};
pub use prepared::{PreparedKind, PreparedQuery};
pub use results::QueryResults;

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};

use crate::config::PipelineConfig;
use crate::converter::{lower_statement, LoweredStatement, LoweringOptions};
use crate::domain_model::DomainModel;
use crate::errors::PipelineError;
use crate::executor::{Executor, QueryParameters, StoreConnection};
use crate::identity::{EntityHandle, EntityInstance, EntityKey, ExecutionId, IdentityRegistry};
use crate::initializer::{InitializerForest, ResultValue, RowContext};
use crate::query_parser::parse_statement;
use crate::results::DomainResult;
use crate::sql_renderer::render;
use crate::value::Value;

pub struct QueryEngine {
    model: Arc<DomainModel>,
    config: PipelineConfig,
    cache: StatementCache,
}

impl QueryEngine {
    pub fn new(model: Arc<DomainModel>, config: PipelineConfig) -> Self {
        let cache = StatementCache::new(
            config.statement_cache_enabled,
            config.statement_cache_max_entries,
        );
        QueryEngine {
            model,
            config,
            cache,
        }
    }

    pub fn model(&self) -> &DomainModel {
        &self.model
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Parse, lower and render `query`, or return the cached preparation.
    pub fn prepare(&self, query: &str) -> Result<Arc<PreparedQuery>, PipelineError> {
        let key = StatementCacheKey::new(query, self.model.name());
        if let Some(prepared) = self.cache.get(&key) {
            debug!("Statement cache hit {}", key.fingerprint());
            return Ok(prepared);
        }

        let statement = parse_statement(query)?;
        let options = LoweringOptions {
            max_fetch_depth: self.config.max_fetch_depth,
        };
        let lowered = lower_statement(&self.model, &options, &statement)?;
        let rendered = render(lowered.statement())?;
        let kind = match lowered {
            LoweredStatement::Select(select) => {
                let single_entity = matches!(select.results.as_slice(), [DomainResult::Entity(_)]);
                let dedupe = select.distinct
                    || (self.config.unique_entity_results && single_entity && select.collection_fetched);
                PreparedKind::Select {
                    results: select.results,
                    dedupe,
                }
            }
            LoweredStatement::Mutation(_) => PreparedKind::Mutation,
        };
        let prepared = Arc::new(PreparedQuery {
            query: key.normalized_query.clone(),
            sql: rendered.sql,
            bindings: rendered.bindings,
            kind,
        });
        debug!("Prepared statement {}:\n{}", key.fingerprint(), prepared.sql);
        self.cache.insert(key, Arc::clone(&prepared));
        Ok(prepared)
    }

    pub fn session<'c>(&self, connection: &'c dyn StoreConnection) -> Session<'_, 'c> {
        Session::new(self, connection)
    }
}

/// One unit of work. Entity identity is unique within a session until
/// [`Session::clear`] or [`Session::close`].
pub struct Session<'e, 'c> {
    engine: &'e QueryEngine,
    connection: &'c dyn StoreConnection,
    registry: IdentityRegistry,
    last_execution: ExecutionId,
}

impl<'e, 'c> Session<'e, 'c> {
    pub fn new(engine: &'e QueryEngine, connection: &'c dyn StoreConnection) -> Self {
        Session {
            engine,
            connection,
            registry: IdentityRegistry::new(),
            last_execution: 0,
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityInstance> {
        self.registry.entity(handle)
    }

    /// Look up an instance already known to this session.
    pub fn find(&self, entity_name: &str, id: impl Into<Value>) -> Option<EntityHandle> {
        let root = self.engine.model().entity(entity_name).ok()?;
        self.registry
            .find_entity(&EntityKey::new(root.root_entity.as_str(), id.into()))
    }

    /// Run a select and hydrate its rows.
    pub async fn list(
        &mut self,
        query: &str,
        parameters: &QueryParameters,
    ) -> Result<QueryResults, PipelineError> {
        let prepared = self.engine.prepare(query)?;
        self.list_prepared(&prepared, parameters).await
    }

    pub async fn list_prepared(
        &mut self,
        prepared: &PreparedQuery,
        parameters: &QueryParameters,
    ) -> Result<QueryResults, PipelineError> {
        let PreparedKind::Select { results, dedupe } = &prepared.kind else {
            return Err(PipelineError::NotASelect {
                query: prepared.query.clone(),
            });
        };
        self.last_execution += 1;
        let execution = self.last_execution;
        match self.hydrate(prepared, results, *dedupe, parameters, execution).await {
            Ok(rows) => {
                self.registry.finish_execution(execution);
                Ok(QueryResults {
                    columns: prepared.columns(),
                    rows,
                })
            }
            Err(err) => {
                self.registry.abort_execution(execution);
                Err(err)
            }
        }
    }

    async fn hydrate(
        &mut self,
        prepared: &PreparedQuery,
        results: &[DomainResult],
        dedupe: bool,
        parameters: &QueryParameters,
        execution: ExecutionId,
    ) -> Result<Vec<Vec<ResultValue>>, PipelineError> {
        let executor = Executor::new(self.connection);
        let mut cursor = executor
            .query(&prepared.sql, &prepared.bindings, parameters)
            .await?;
        let mut forest = InitializerForest::new(results);
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut index = 0;
        while let Some(row) = cursor.next_row().await? {
            let mut ctx = RowContext {
                model: self.engine.model(),
                registry: &mut self.registry,
                execution,
                row: index,
            };
            let values = forest.process_row(&row, &mut ctx)?;
            index += 1;
            if dedupe && !seen.insert(values.clone()) {
                continue;
            }
            rows.push(values);
        }
        debug!("Execution {} read {} rows, returned {}", execution, index, rows.len());
        Ok(rows)
    }

    /// Run an UPDATE, DELETE or INSERT; returns the store's affected-row count.
    pub async fn execute_update(
        &mut self,
        query: &str,
        parameters: &QueryParameters,
    ) -> Result<u64, PipelineError> {
        let prepared = self.engine.prepare(query)?;
        if prepared.is_select() {
            return Err(PipelineError::NotAMutation {
                query: prepared.query.clone(),
            });
        }
        let executor = Executor::new(self.connection);
        let affected = executor
            .execute(&prepared.sql, &prepared.bindings, parameters)
            .await?;
        Ok(affected)
    }

    /// Forget every instance; handles obtained so far become invalid.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// End the unit of work.
    pub fn close(mut self) {
        info!(
            "Closing session with {} entities and {} collections",
            self.registry.entity_count(),
            self.registry.collection_count()
        );
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::testing::shop_model;
    use crate::executor::{MockStoreConnection, StoreError, VecCursor};
    use crate::identity::InstanceState;
    use crate::sql_ast::ParameterSource;

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(shop_model()), PipelineConfig::default())
    }

    #[test]
    fn test_prepare_uses_statement_cache() {
        let engine = engine();
        let first = engine.prepare("select t from Tag t where t.label = :l").unwrap();
        let second = engine.prepare("select t  from Tag t\nwhere t.label = :l").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            first.sql,
            "SELECT tags_1.id, tags_1.label FROM tags AS tags_1 WHERE tags_1.label = ?"
        );
        assert_eq!(first.columns(), vec!["t".to_string()]);
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_literals_differing_only_in_spacing_are_cached_apart() {
        let engine = engine();
        let spaced = engine.prepare("select t from Tag t where t.label = 'a  b'").unwrap();
        let single = engine.prepare("select t from Tag t where t.label = 'a b'").unwrap();
        assert!(!Arc::ptr_eq(&spaced, &single));
        assert_eq!(
            spaced.bindings[0].source,
            ParameterSource::Literal(Value::from("a  b"))
        );
        assert_eq!(
            single.bindings[0].source,
            ParameterSource::Literal(Value::from("a b"))
        );
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[test]
    fn test_collection_fetch_dedupes_roots() {
        let engine = engine();
        let prepared = engine.prepare("select o from Order o join fetch o.tags").unwrap();
        assert!(matches!(prepared.kind, PreparedKind::Select { dedupe: true, .. }));
        let prepared = engine.prepare("select o, o.total from Order o join fetch o.tags").unwrap();
        assert!(matches!(prepared.kind, PreparedKind::Select { dedupe: false, .. }));
    }

    #[tokio::test]
    async fn test_list_hydrates_and_finishes_execution() {
        let engine = engine();
        let mut store = MockStoreConnection::new();
        store.expect_query().times(1).returning(|_, values| {
            assert_eq!(values, &[Value::from("a")][..]);
            Ok(Box::new(VecCursor::new(vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::from("a")],
            ])))
        });
        let mut session = engine.session(&store);
        let params = QueryParameters::new().with_named("l", "a");
        let results = session
            .list("select t from Tag t where t.label = :l", &params)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        let handles = results.entities(0);
        assert_eq!(session.find("Tag", 2), Some(handles[1]));
        assert!(session.entity(handles[0]).unwrap().is_initialized());
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back_execution() {
        let engine = engine();
        let mut store = MockStoreConnection::new();
        store
            .expect_query()
            .returning(|_, _| Err(StoreError::new("gone")));
        let mut session = engine.session(&store);
        let err = session
            .list("select t from Tag t", &QueryParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Execution(_)));
        assert!(session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_hydration_failure_leaves_no_half_built_instances() {
        let engine = engine();
        let mut store = MockStoreConnection::new();
        store.expect_query().returning(|_, _| {
            Ok(Box::new(VecCursor::new(vec![
                vec![Value::Int(1), Value::from("dog"), Value::from("Rex"), Value::Int(3), Value::Null],
                vec![Value::Int(2), Value::from("bird"), Value::from("Tweety"), Value::Null, Value::Null],
            ])))
        });
        let mut session = engine.session(&store);
        let err = session
            .list("select a from Animal a", &QueryParameters::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::Hydration(err) => {
                assert_eq!(err.row, 1);
                assert_eq!(err.path, "Animal#2");
            }
            other => panic!("unexpected error {:?}", other),
        }
        let rex = session.find("Animal", 1).unwrap();
        assert_eq!(session.entity(rex).unwrap().state(), InstanceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_execute_update_rejects_selects() {
        let engine = engine();
        let mut store = MockStoreConnection::new();
        store.expect_execute().times(1).returning(|sql, _| {
            assert_eq!(sql, "DELETE FROM notes WHERE body IS NULL");
            Ok(3)
        });
        let mut session = engine.session(&store);
        let count = session
            .execute_update("delete from Note n where n.body is null", &QueryParameters::new())
            .await
            .unwrap();
        assert_eq!(count, 3);
        let err = session
            .execute_update("select n from Note n", &QueryParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotAMutation { .. }));
    }
}
