use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use super::errors::LoweringError;
use super::resolver::{ColumnDescriptor, SqlResolver};
use crate::domain_model::{
    AssociationJoin, AssociationMapping, AttributeMapping, ColumnMapping, DomainModel,
    EntityMapping,
};
use crate::navigable::NavigablePath;
use crate::query_model::{FromSpec, JoinKind, JoinSpec, PathExpression};
use crate::sql_ast::{
    ColumnReference, FromClause, Join, JoinType, ParameterBinding, ParameterSource, SelectItem,
    SqlExpr, TableReference,
};
use crate::value::Value;

/// A table group introduced for a navigable path.
#[derive(Debug, Clone)]
pub(super) struct JoinedPath {
    pub entity: Arc<EntityMapping>,
    pub table: TableReference,
    /// `None` for the query root.
    pub join_kind: Option<JoinKind>,
    pub fetch: bool,
    pub association: Option<AssociationMapping>,
    /// Link table of a many-to-many association.
    pub link_table: Option<TableReference>,
}

/// What a dotted path denotes once resolved.
#[derive(Debug, Clone)]
pub(super) enum PathTarget {
    Column(ColumnReference),
    Entity(NavigablePath),
    /// To-one association that was not joined, referenced through the
    /// owner's foreign key.
    ForeignKey {
        column: ColumnReference,
        target: Arc<EntityMapping>,
    },
}

/// Single-pass walker state for one statement.
pub(super) struct QueryConverter<'m> {
    pub(super) model: &'m DomainModel,
    pub(super) max_fetch_depth: usize,
    /// UPDATE/DELETE/INSERT: no joins may be introduced.
    pub(super) mutation: bool,
    pub(super) resolver: SqlResolver,
    aliases: HashMap<String, NavigablePath>,
    pub(super) joined: HashMap<NavigablePath, JoinedPath>,
    pub(super) from: Option<FromClause>,
    pub(super) root_path: Option<NavigablePath>,
    pub(super) explicit_fetches: Vec<NavigablePath>,
    pub(super) consumed_fetches: HashSet<NavigablePath>,
    pub(super) fetched_bags: BTreeSet<String>,
    pub(super) collection_fetched: bool,
    pub(super) select_items: Vec<SelectItem>,
    positions: HashMap<ColumnReference, usize>,
    pub(super) root_restriction: Option<SqlExpr>,
}

impl<'m> QueryConverter<'m> {
    pub fn new(model: &'m DomainModel, max_fetch_depth: usize, mutation: bool) -> Self {
        QueryConverter {
            model,
            max_fetch_depth,
            mutation,
            resolver: SqlResolver::new(),
            aliases: HashMap::new(),
            joined: HashMap::new(),
            from: None,
            root_path: None,
            explicit_fetches: Vec::new(),
            consumed_fetches: HashSet::new(),
            fetched_bags: BTreeSet::new(),
            collection_fetched: false,
            select_items: Vec::new(),
            positions: HashMap::new(),
            root_restriction: None,
        }
    }

    pub fn register_root(&mut self, from: &FromSpec) -> Result<NavigablePath, LoweringError> {
        let entity = Arc::clone(self.model.entity(&from.entity)?);
        let path = NavigablePath::root(entity.name.as_str());
        let table = self.resolver.register_table(&path, &entity.table);
        self.from = Some(FromClause::new(table.clone()));
        self.declare_alias(&from.alias, &path)?;
        self.root_restriction = self.type_restriction(&path, &entity)?;
        self.joined.insert(
            path.clone(),
            JoinedPath {
                entity,
                table,
                join_kind: None,
                fetch: false,
                association: None,
                link_table: None,
            },
        );
        self.root_path = Some(path.clone());
        Ok(path)
    }

    fn declare_alias(&mut self, alias: &str, path: &NavigablePath) -> Result<(), LoweringError> {
        if self.aliases.insert(alias.to_string(), path.clone()).is_some() {
            return Err(LoweringError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        Ok(())
    }

    fn alias_path(&self, alias: &str) -> Result<NavigablePath, LoweringError> {
        self.aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| LoweringError::UnknownAlias {
                alias: alias.to_string(),
            })
    }

    pub(super) fn joined_path(&self, path: &NavigablePath) -> Result<&JoinedPath, LoweringError> {
        if self.resolver.is_excluded(path) {
            return Err(LoweringError::ExcludedPath {
                path: path.full_path().to_string(),
            });
        }
        // Every path handed out by the walker has a table group
        self.joined.get(path).ok_or_else(|| LoweringError::ExcludedPath {
            path: path.full_path().to_string(),
        })
    }

    /// `[INNER|LEFT] JOIN [FETCH] alias.a.b [alias]`
    pub fn add_explicit_join(&mut self, join: &JoinSpec) -> Result<(), LoweringError> {
        let mut current = self.alias_path(join.path.root_alias())?;
        let tail = join.path.tail();
        let Some((last, intermediate)) = tail.split_last() else {
            return Err(LoweringError::unsupported(&join.path, "join needs an association"));
        };

        for segment in intermediate {
            let association = self.to_one_association(&current, segment, &join.path)?;
            current = self.implicit_join(&current, &association, &join.path)?;
        }

        if join.fetch && self.resolver.is_excluded(&current) {
            // Fetches below a pruned fetch are pruned with it
            let path = current.append(last.as_str());
            if let Some(alias) = &join.alias {
                self.declare_alias(alias, &path)?;
            }
            return Ok(());
        }

        let owner = self.joined_path(&current)?.clone();
        let association = owner
            .entity
            .association(last)
            .cloned()
            .ok_or_else(|| LoweringError::unknown_navigable(&owner.entity.name, last, &join.path))?;
        let path = current.append(last.as_str());

        if join.fetch && path.depth() > self.max_fetch_depth {
            debug!(
                "Pruning fetch of {} (depth {} > {})",
                path,
                path.depth(),
                self.max_fetch_depth
            );
            self.resolver.exclude(&path);
            if let Some(alias) = &join.alias {
                self.declare_alias(alias, &path)?;
            }
            return Ok(());
        }

        if join.fetch {
            self.check_cyclic_fetch(&owner, &association, &path)?;
            self.explicit_fetches.push(path.clone());
        }

        match self.joined.get_mut(&path) {
            Some(existing) => {
                let existing_kind = existing.join_kind.unwrap_or(JoinKind::Inner);
                if existing_kind != join.kind {
                    return Err(LoweringError::AmbiguousJoin {
                        path: path.full_path().to_string(),
                        existing: existing_kind,
                        requested: join.kind,
                    });
                }
                debug!("Reusing join for {}", path);
                existing.fetch |= join.fetch;
            }
            None => {
                self.create_association_join(&current, &association, join.kind, join.fetch)?;
            }
        }
        if let Some(alias) = &join.alias {
            self.declare_alias(alias, &path)?;
        }
        Ok(())
    }

    /// Fetching the inverse of the association that produced the owner would
    /// loop back to an already open path.
    fn check_cyclic_fetch(
        &self,
        owner: &JoinedPath,
        association: &AssociationMapping,
        path: &NavigablePath,
    ) -> Result<(), LoweringError> {
        let Some(incoming) = &owner.association else {
            return Ok(());
        };
        if self.is_inverse(incoming, association) {
            return Err(LoweringError::CyclicFetch {
                path: path.full_path().to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn is_inverse(&self, incoming: &AssociationMapping, outgoing: &AssociationMapping) -> bool {
        let named = outgoing.mapped_by.as_deref() == Some(incoming.name.as_str())
            || incoming.mapped_by.as_deref() == Some(outgoing.name.as_str());
        let role_owner = incoming.role.parent().map(|p| p.full_path().to_string());
        named
            && role_owner.is_some_and(|owner| {
                self.model.is_same_or_subtype(&outgoing.target, &owner)
                    || self.model.is_same_or_subtype(&owner, &outgoing.target)
            })
    }

    pub(super) fn to_one_association(
        &self,
        owner_path: &NavigablePath,
        name: &str,
        query_path: &PathExpression,
    ) -> Result<AssociationMapping, LoweringError> {
        let owner = self.joined_path(owner_path)?;
        match owner.entity.attribute(name) {
            Some((_, AttributeMapping::Association(association))) => {
                if association.is_collection() {
                    Err(LoweringError::IllegalCollectionDereference {
                        path: query_path.to_string(),
                    })
                } else {
                    Ok(association.clone())
                }
            }
            Some(_) => Err(LoweringError::unsupported(
                query_path,
                format!("`{}` is not an association", name),
            )),
            None => Err(LoweringError::unknown_navigable(
                &owner.entity.name,
                name,
                query_path,
            )),
        }
    }

    /// Join needed to navigate through a to-one association; an existing join
    /// of any kind is reused.
    pub(super) fn implicit_join(
        &mut self,
        owner_path: &NavigablePath,
        association: &AssociationMapping,
        query_path: &PathExpression,
    ) -> Result<NavigablePath, LoweringError> {
        let path = owner_path.append(association.name.as_str());
        if self.resolver.is_excluded(&path) {
            return Err(LoweringError::ExcludedPath {
                path: path.full_path().to_string(),
            });
        }
        if self.joined.contains_key(&path) {
            return Ok(path);
        }
        if self.mutation {
            return Err(LoweringError::JoinInMutation {
                path: query_path.to_string(),
            });
        }
        self.create_association_join(owner_path, association, JoinKind::Inner, false)
    }

    pub(super) fn column(
        &mut self,
        path: &NavigablePath,
        table: &str,
        column: &ColumnMapping,
    ) -> Result<ColumnReference, LoweringError> {
        self.resolver.resolve(ColumnDescriptor {
            path,
            table,
            column,
        })
    }

    /// Add the join(s) for `association` below `owner_path` and record the new
    /// table group.
    pub(super) fn create_association_join(
        &mut self,
        owner_path: &NavigablePath,
        association: &AssociationMapping,
        kind: JoinKind,
        fetch: bool,
    ) -> Result<NavigablePath, LoweringError> {
        let owner = self.joined_path(owner_path)?.clone();
        let target = Arc::clone(self.model.entity(&association.target)?);
        let path = owner_path.append(association.name.as_str());
        let join_type = match kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        };

        let mut joins = Vec::new();
        let mut link_table = None;
        let target_table = match &association.join {
            AssociationJoin::ForeignKeyOnOwner { column } => {
                let table = self.resolver.register_table(&path, &target.table);
                let fk = self.column(owner_path, &owner.entity.table, column)?;
                let id = self.column(&path, &target.table, &target.identifier)?;
                joins.push(Join {
                    table: table.clone(),
                    joining_on: SqlExpr::equals(SqlExpr::Column(fk), SqlExpr::Column(id)),
                    join_type,
                });
                table
            }
            AssociationJoin::ForeignKeyOnTarget { column } => {
                let table = self.resolver.register_table(&path, &target.table);
                let fk = self.column(&path, &target.table, column)?;
                let id = self.column(owner_path, &owner.entity.table, &owner.entity.identifier)?;
                joins.push(Join {
                    table: table.clone(),
                    joining_on: SqlExpr::equals(SqlExpr::Column(fk), SqlExpr::Column(id)),
                    join_type,
                });
                table
            }
            AssociationJoin::JoinTable {
                table: link,
                owner_column,
                target_column,
            } => {
                let link_ref = self.resolver.register_table(&path, link);
                let owner_id =
                    self.column(owner_path, &owner.entity.table, &owner.entity.identifier)?;
                let link_owner = self.column(&path, link, owner_column)?;
                joins.push(Join {
                    table: link_ref.clone(),
                    joining_on: SqlExpr::equals(
                        SqlExpr::Column(owner_id),
                        SqlExpr::Column(link_owner),
                    ),
                    join_type,
                });
                let table = self.resolver.register_table(&path, &target.table);
                let link_target = self.column(&path, link, target_column)?;
                let target_id = self.column(&path, &target.table, &target.identifier)?;
                joins.push(Join {
                    table: table.clone(),
                    joining_on: SqlExpr::equals(
                        SqlExpr::Column(link_target),
                        SqlExpr::Column(target_id),
                    ),
                    join_type,
                });
                link_table = Some(link_ref);
                table
            }
        };

        if let Some(restriction) = self.type_restriction(&path, &target)? {
            if let Some(last) = joins.last_mut() {
                let on = std::mem::replace(&mut last.joining_on, SqlExpr::And(Vec::new()));
                last.joining_on = SqlExpr::and_with(Some(on), restriction);
            }
        }

        debug!("Joined {} as {} ({:?})", path, target_table.table_alias, join_type);
        if let Some(from) = self.from.as_mut() {
            from.joins.extend(joins);
        }
        self.joined.insert(
            path.clone(),
            JoinedPath {
                entity: target,
                table: target_table,
                join_kind: Some(kind),
                fetch,
                association: Some(association.clone()),
                link_table,
            },
        );
        Ok(path)
    }

    /// Discriminator restriction for a subtype: its own value and those of
    /// its descendants.
    pub(super) fn type_restriction(
        &mut self,
        path: &NavigablePath,
        entity: &EntityMapping,
    ) -> Result<Option<SqlExpr>, LoweringError> {
        if entity.is_hierarchy_root() {
            return Ok(None);
        }
        let Some(discriminator) = &entity.discriminator else {
            return Ok(None);
        };
        let column = self.column(path, &entity.table, &discriminator.column)?;
        let list = self
            .model
            .self_and_descendants(&entity.name)
            .into_iter()
            .filter_map(|e| e.discriminator.as_ref())
            .map(|d| literal_expr(d.value.clone(), Some(d.column.mapping)))
            .collect();
        Ok(Some(SqlExpr::InList {
            operand: Box::new(SqlExpr::Column(column)),
            list,
            negated: false,
        }))
    }

    /// Resolve `alias.a.b...`.
    ///
    /// With `join_to_one` a trailing to-one association is joined so the path
    /// denotes the entity; otherwise it denotes the owner's foreign key.
    pub(super) fn resolve_path(
        &mut self,
        query_path: &PathExpression,
        join_to_one: bool,
    ) -> Result<PathTarget, LoweringError> {
        let mut current = self.alias_path(query_path.root_alias())?;
        if self.resolver.is_excluded(&current) {
            return Err(LoweringError::ExcludedPath {
                path: current.full_path().to_string(),
            });
        }
        let segments = query_path.tail();
        let mut index = 0;
        while index < segments.len() {
            let segment = segments[index].as_str();
            let is_last = index + 1 == segments.len();
            let entity = Arc::clone(&self.joined_path(&current)?.entity);

            if segment == entity.identifier_name {
                if !is_last {
                    return Err(LoweringError::unknown_navigable(
                        &entity.name,
                        &segments[index + 1],
                        query_path,
                    ));
                }
                let id = self.column(&current, &entity.table, &entity.identifier)?;
                return Ok(PathTarget::Column(id));
            }

            let Some((_, attribute)) = entity.attribute(segment) else {
                return Err(LoweringError::unknown_navigable(&entity.name, segment, query_path));
            };
            match attribute {
                AttributeMapping::Basic(basic) => {
                    if !is_last {
                        return Err(LoweringError::unknown_navigable(
                            &entity.name,
                            &segments[index + 1],
                            query_path,
                        ));
                    }
                    let column = self.column(&current, &entity.table, &basic.column)?;
                    return Ok(PathTarget::Column(column));
                }
                AttributeMapping::Embedded(embedded) => {
                    if is_last {
                        return Err(LoweringError::unsupported(
                            query_path,
                            "embedded values can only be used through their components",
                        ));
                    }
                    let component_name = segments[index + 1].as_str();
                    let component = embedded.attribute(component_name).ok_or_else(|| {
                        LoweringError::unknown_navigable(
                            &format!("{}.{}", entity.name, embedded.name),
                            component_name,
                            query_path,
                        )
                    })?;
                    if index + 2 != segments.len() {
                        return Err(LoweringError::unknown_navigable(
                            &entity.name,
                            &segments[index + 2],
                            query_path,
                        ));
                    }
                    let column = self.column(&current, &entity.table, &component.column)?;
                    return Ok(PathTarget::Column(column));
                }
                AttributeMapping::Association(association) => {
                    if association.is_collection() {
                        return Err(LoweringError::IllegalCollectionDereference {
                            path: query_path.to_string(),
                        });
                    }
                    let association = association.clone();
                    let child = current.append(segment);
                    let already_joined = self.joined.contains_key(&child);
                    if is_last {
                        if already_joined || join_to_one {
                            let path = self.implicit_join(&current, &association, query_path)?;
                            return Ok(PathTarget::Entity(path));
                        }
                        return self.foreign_key_target(&current, &entity, &association, query_path);
                    }
                    let target = Arc::clone(self.model.entity(&association.target)?);
                    let next = segments[index + 1].as_str();
                    if !already_joined && next == target.identifier_name && index + 2 == segments.len() {
                        if let AssociationJoin::ForeignKeyOnOwner { column } = &association.join {
                            let fk = self.column(&current, &entity.table, column)?;
                            return Ok(PathTarget::Column(fk));
                        }
                    }
                    current = self.implicit_join(&current, &association, query_path)?;
                }
            }
            index += 1;
        }
        Ok(PathTarget::Entity(current))
    }

    fn foreign_key_target(
        &mut self,
        owner_path: &NavigablePath,
        owner: &EntityMapping,
        association: &AssociationMapping,
        query_path: &PathExpression,
    ) -> Result<PathTarget, LoweringError> {
        let target = Arc::clone(self.model.entity(&association.target)?);
        match &association.join {
            AssociationJoin::ForeignKeyOnOwner { column } => {
                let fk = self.column(owner_path, &owner.table, column)?;
                Ok(PathTarget::ForeignKey { column: fk, target })
            }
            _ => {
                let path = self.implicit_join(owner_path, association, query_path)?;
                Ok(PathTarget::Entity(path))
            }
        }
    }

    /// Position of `column` in the select list, adding it on first use.
    pub(super) fn select_column(&mut self, column: ColumnReference) -> usize {
        if let Some(position) = self.positions.get(&column) {
            return *position;
        }
        let position = self.select_items.len();
        self.positions.insert(column.clone(), position);
        self.select_items.push(SelectItem {
            expression: SqlExpr::Column(column),
        });
        position
    }

    pub(super) fn select_expression(&mut self, expression: SqlExpr) -> usize {
        match expression {
            SqlExpr::Column(column) => self.select_column(column),
            other => {
                self.select_items.push(SelectItem { expression: other });
                self.select_items.len() - 1
            }
        }
    }
}

/// Inline non-text literals; text-like values are bound.
pub(super) fn literal_expr(value: Value, mapping: Option<crate::domain_model::ValueMapping>) -> SqlExpr {
    match value {
        Value::Text(_) | Value::Timestamp(_) | Value::Uuid(_) => SqlExpr::Parameter(ParameterBinding {
            source: ParameterSource::Literal(value),
            mapping,
        }),
        other => SqlExpr::Literal(other),
    }
}
