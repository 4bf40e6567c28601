use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use super::errors::LoweringError;
use super::walker::QueryConverter;
use crate::domain_model::{
    AssociationJoin, AssociationMapping, AttributeMapping, CollectionKind, EntityMapping,
    FetchTiming,
};
use crate::navigable::NavigablePath;
use crate::query_model::JoinKind;
use crate::results::{BasicAssembler, EntityResult, Fetch};

impl QueryConverter<'_> {
    /// Build the result descriptor for the entity joined at `path`, selecting
    /// every column it needs and descending into fetched associations.
    pub(super) fn entity_result(
        &mut self,
        path: &NavigablePath,
        label: &str,
    ) -> Result<EntityResult, LoweringError> {
        let joined = self.joined_path(path)?.clone();
        let entity = Arc::clone(&joined.entity);
        let table = entity.table.clone();

        let id = self.column(path, &table, &entity.identifier)?;
        let identifier = BasicAssembler::new(self.select_column(id), Some(entity.identifier.mapping));

        let root = Arc::clone(self.model.entity(&entity.root_entity)?);
        let discriminator = match &root.discriminator {
            Some(disc) => {
                let column = self.column(path, &table, &disc.column)?;
                Some(BasicAssembler::new(self.select_column(column), Some(disc.column.mapping)))
            }
            None => None,
        };
        let version = match &entity.version {
            Some(version) => {
                let column = self.column(path, &table, version)?;
                Some(BasicAssembler::new(self.select_column(column), Some(version.mapping)))
            }
            None => None,
        };

        // Polymorphic queries read the attributes of every subtype too. A name
        // maps to the same storage on every type in the hierarchy, so the
        // first declaration stands for all of them.
        let types: Vec<Arc<EntityMapping>> = self
            .model
            .self_and_descendants(&entity.name)
            .into_iter()
            .cloned()
            .collect();
        let mut seen = HashSet::new();
        let mut fetches = Vec::new();
        for concrete in &types {
            for attribute in &concrete.attributes {
                if !seen.insert(attribute.name().to_string()) {
                    continue;
                }
                let fetch = match attribute {
                    AttributeMapping::Basic(basic) => {
                        let column = self.column(path, &table, &basic.column)?;
                        Fetch::Basic {
                            attribute: basic.name.clone(),
                            assembler: BasicAssembler::new(
                                self.select_column(column),
                                Some(basic.column.mapping),
                            ),
                        }
                    }
                    AttributeMapping::Embedded(embedded) => {
                        let mut components = Vec::new();
                        for component in &embedded.attributes {
                            let column = self.column(path, &table, &component.column)?;
                            components.push((
                                component.name.clone(),
                                BasicAssembler::new(
                                    self.select_column(column),
                                    Some(component.column.mapping),
                                ),
                            ));
                        }
                        Fetch::Embedded {
                            attribute: embedded.name.clone(),
                            components,
                        }
                    }
                    AttributeMapping::Association(association) => {
                        self.association_fetch(path, &table, association)?
                    }
                };
                fetches.push(fetch);
            }
        }

        Ok(EntityResult {
            label: label.to_string(),
            navigable_path: path.clone(),
            entity,
            identifier,
            discriminator,
            version,
            fetches,
        })
    }

    fn association_fetch(
        &mut self,
        owner_path: &NavigablePath,
        owner_table: &str,
        association: &AssociationMapping,
    ) -> Result<Fetch, LoweringError> {
        let path = owner_path.append(association.name.as_str());
        let fetched = if self.resolver.is_excluded(&path) {
            false
        } else if self.joined.get(&path).is_some_and(|j| j.fetch) {
            self.consumed_fetches.insert(path.clone());
            true
        } else if self.should_auto_fetch(owner_path, association, &path) {
            if !self.joined.contains_key(&path) {
                debug!("Auto-fetching eager association {}", path);
                self.create_association_join(owner_path, association, JoinKind::Left, true)?;
            }
            true
        } else {
            false
        };

        let attribute = association.name.clone();
        if fetched {
            let element = self.entity_result(&path, &association.name)?;
            return match &association.collection {
                Some(collection) => {
                    self.collection_fetched = true;
                    if collection.kind == CollectionKind::Bag {
                        self.fetched_bags.insert(path.full_path().to_string());
                    }
                    let index = match &collection.index_column {
                        Some(index_column) => {
                            let joined = self.joined_path(&path)?.clone();
                            let table = match (&association.join, &joined.link_table) {
                                (AssociationJoin::JoinTable { .. }, Some(link)) => link.table_name.clone(),
                                _ => joined.entity.table.clone(),
                            };
                            let column = self.column(&path, &table, index_column)?;
                            Some(BasicAssembler::new(
                                self.select_column(column),
                                Some(index_column.mapping),
                            ))
                        }
                        None => None,
                    };
                    Ok(Fetch::CollectionJoined {
                        attribute,
                        association: association.clone(),
                        element: Box::new(element),
                        index,
                    })
                }
                None => Ok(Fetch::EntityJoined {
                    attribute,
                    result: Box::new(element),
                }),
            };
        }

        if association.is_collection() {
            return Ok(Fetch::CollectionDelayed {
                attribute,
                association: association.clone(),
            });
        }
        let target = Arc::clone(self.model.entity(&association.target)?);
        match &association.join {
            AssociationJoin::ForeignKeyOnOwner { column } => {
                let fk = self.column(owner_path, owner_table, column)?;
                Ok(Fetch::EntityDelayed {
                    attribute,
                    target,
                    foreign_key: BasicAssembler::new(self.select_column(fk), Some(column.mapping)),
                })
            }
            // To-one associations always carry the key on the owner table
            _ => Err(LoweringError::unsupported(
                &path,
                "to-one association without a foreign key on the owner",
            )),
        }
    }

    /// Eager associations are joined unless that would exceed the depth limit,
    /// revisit a role already on the path, or walk back along the inverse.
    fn should_auto_fetch(
        &self,
        owner_path: &NavigablePath,
        association: &AssociationMapping,
        path: &NavigablePath,
    ) -> bool {
        if self.mutation || association.fetch != FetchTiming::Eager {
            return false;
        }
        if path.depth() > self.max_fetch_depth {
            return false;
        }
        let mut current = Some(owner_path.clone());
        while let Some(node) = current {
            if let Some(incoming) = self.joined.get(&node).and_then(|j| j.association.as_ref()) {
                if incoming.role == association.role || self.is_inverse(incoming, association) {
                    return false;
                }
            }
            current = node.parent();
        }
        true
    }
}
