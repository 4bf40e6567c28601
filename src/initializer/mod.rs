//! Row-by-row hydration.
//!
//! An [`InitializerForest`] mirrors the domain results of one statement: one
//! root per select-list item, with child initializers for every joined
//! association. For each row the forest walks its roots in order; entity
//! nodes resolve their key, consult the [`IdentityRegistry`] and then either
//! attach the instance already registered or register and populate a new one.

mod errors;

pub use errors::{HydrationError, HydrationErrorKind};

use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;

use crate::domain_model::{AssociationMapping, CollectionKind, DomainModel, EntityMapping};
use crate::identity::{
    AttributeValue, CollectionHandle, CollectionKey, EntityHandle, EntityInstance, EntityKey, ExecutionId,
    IdentityRegistry, InstanceState, PersistentCollection, MAX_LIST_INDEX,
};
use crate::navigable::{to_loggable_string, NavigablePath, NavigableRole};
use crate::results::{AssemblyError, BasicAssembler, DomainResult, EntityResult, Fetch};
use crate::value::Value;

/// What one select-list item yields for one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultValue {
    /// `None` when an outer join produced no entity.
    Entity(Option<EntityHandle>),
    Scalar(Value),
}

/// Everything an initializer touches while processing a row.
pub struct RowContext<'a> {
    pub model: &'a DomainModel,
    pub registry: &'a mut IdentityRegistry,
    pub execution: ExecutionId,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub resolves_key: bool,
    pub has_children: bool,
    pub represents_entity: bool,
}

/// Per-row progress of one initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Uninitialized,
    ResolvingKey,
    RegistryLookup,
    AttachExisting,
    HydrateNew,
    /// No entity at this path for the current row.
    Missing,
    Finalized,
}

#[derive(Debug)]
enum AttributeInitializer {
    Basic {
        name: String,
        assembler: BasicAssembler,
    },
    Embedded {
        name: String,
        components: Vec<(String, BasicAssembler)>,
    },
    Joined {
        name: String,
        child: Box<Initializer>,
    },
    Delayed {
        name: String,
        target: Arc<EntityMapping>,
        foreign_key: BasicAssembler,
    },
    CollectionJoined {
        name: String,
        role: NavigableRole,
        kind: CollectionKind,
        index: Option<BasicAssembler>,
        element: Box<Initializer>,
    },
    CollectionDelayed {
        name: String,
        role: NavigableRole,
        kind: CollectionKind,
    },
}

impl AttributeInitializer {
    fn from_fetch(fetch: &Fetch) -> Self {
        match fetch {
            Fetch::Basic {
                attribute,
                assembler,
            } => AttributeInitializer::Basic {
                name: attribute.clone(),
                assembler: *assembler,
            },
            Fetch::Embedded {
                attribute,
                components,
            } => AttributeInitializer::Embedded {
                name: attribute.clone(),
                components: components.clone(),
            },
            Fetch::EntityJoined { attribute, result } => AttributeInitializer::Joined {
                name: attribute.clone(),
                child: Box::new(Initializer::entity(result, false)),
            },
            Fetch::EntityDelayed {
                attribute,
                target,
                foreign_key,
            } => AttributeInitializer::Delayed {
                name: attribute.clone(),
                target: Arc::clone(target),
                foreign_key: *foreign_key,
            },
            Fetch::CollectionJoined {
                attribute,
                association,
                element,
                index,
            } => AttributeInitializer::CollectionJoined {
                name: attribute.clone(),
                role: association.role.clone(),
                kind: collection_kind(association),
                index: *index,
                element: Box::new(Initializer::entity(element, false)),
            },
            Fetch::CollectionDelayed {
                attribute,
                association,
            } => AttributeInitializer::CollectionDelayed {
                name: attribute.clone(),
                role: association.role.clone(),
                kind: collection_kind(association),
            },
        }
    }

    fn has_children(&self) -> bool {
        matches!(
            self,
            AttributeInitializer::Joined { .. } | AttributeInitializer::CollectionJoined { .. }
        )
    }
}

fn collection_kind(association: &AssociationMapping) -> CollectionKind {
    association
        .collection
        .as_ref()
        .map(|c| c.kind)
        .unwrap_or(CollectionKind::Bag)
}

#[derive(Debug)]
enum InitializerNode {
    Scalar {
        assembler: BasicAssembler,
    },
    Entity {
        entity: Arc<EntityMapping>,
        identifier: BasicAssembler,
        discriminator: Option<BasicAssembler>,
        version: Option<BasicAssembler>,
        attributes: Vec<AttributeInitializer>,
    },
}

/// One node of the forest. Scalars only read a value; entity nodes run the
/// key/lookup/attach-or-hydrate state machine for every row.
#[derive(Debug)]
pub struct Initializer {
    navigable_path: NavigablePath,
    capabilities: Capabilities,
    node: InitializerNode,
    state: RowState,
    /// Identifier read for the current row.
    current_key: Option<Value>,
}

impl Initializer {
    fn scalar(label: &str, assembler: BasicAssembler) -> Self {
        Initializer {
            navigable_path: NavigablePath::root(label),
            capabilities: Capabilities {
                resolves_key: false,
                has_children: false,
                represents_entity: false,
            },
            node: InitializerNode::Scalar { assembler },
            state: RowState::Uninitialized,
            current_key: None,
        }
    }

    fn entity(result: &EntityResult, represents_entity: bool) -> Self {
        let attributes: Vec<_> = result.fetches.iter().map(AttributeInitializer::from_fetch).collect();
        Initializer {
            navigable_path: result.navigable_path.clone(),
            capabilities: Capabilities {
                resolves_key: true,
                has_children: attributes.iter().any(AttributeInitializer::has_children),
                represents_entity,
            },
            node: InitializerNode::Entity {
                entity: Arc::clone(&result.entity),
                identifier: result.identifier,
                discriminator: result.discriminator,
                version: result.version,
                attributes,
            },
            state: RowState::Uninitialized,
            current_key: None,
        }
    }

    pub fn navigable_path(&self) -> &NavigablePath {
        &self.navigable_path
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    /// `Order.lineItems.product#42`, or `#<null>` before the key is read.
    pub fn to_loggable_string(&self) -> String {
        to_loggable_string(Some(&self.navigable_path), self.current_key.as_ref())
    }

    fn transition(&mut self, state: RowState) {
        trace!("{} {:?} -> {:?}", self.to_loggable_string(), self.state, state);
        self.state = state;
    }

    fn error(&self, row: usize, kind: HydrationErrorKind) -> HydrationError {
        HydrationError {
            path: self.to_loggable_string(),
            row,
            kind,
        }
    }

    fn read(&self, assembler: &BasicAssembler, row: &[Value], ctx: &RowContext<'_>) -> Result<Value, HydrationError> {
        assembler.assemble(row).map_err(|e| {
            self.error(
                ctx.row,
                match e {
                    AssemblyError::PositionOutOfRange { position, width } => {
                        HydrationErrorKind::RowShape { position, width }
                    }
                    AssemblyError::Conversion(err) => HydrationErrorKind::Conversion(err),
                },
            )
        })
    }

    fn process(&mut self, row: &[Value], ctx: &mut RowContext<'_>) -> Result<ResultValue, HydrationError> {
        if let InitializerNode::Scalar { assembler } = &self.node {
            let value = self.read(assembler, row, ctx)?;
            return Ok(ResultValue::Scalar(value));
        }
        Ok(ResultValue::Entity(self.resolve_entity(row, ctx)?))
    }

    fn resolve_entity(
        &mut self,
        row: &[Value],
        ctx: &mut RowContext<'_>,
    ) -> Result<Option<EntityHandle>, HydrationError> {
        self.current_key = None;
        self.transition(RowState::ResolvingKey);

        let (entity, id, concrete) = {
            let InitializerNode::Entity {
                entity,
                identifier,
                discriminator,
                ..
            } = &self.node
            else {
                return Ok(None);
            };
            let id = identifier.assemble(row).map_err(|e| {
                self.error(
                    ctx.row,
                    match e {
                        AssemblyError::PositionOutOfRange { position, width } => {
                            HydrationErrorKind::RowShape { position, width }
                        }
                        AssemblyError::Conversion(err) => HydrationErrorKind::UnexpectedIdentifierType(err),
                    },
                )
            })?;
            if id.is_null() {
                (Arc::clone(entity), id, None)
            } else {
                self.current_key = Some(id.clone());
                let concrete = match discriminator {
                    Some(assembler) => {
                        let value = self.read(assembler, row, ctx)?;
                        self.concrete_type(entity, &value, ctx)?
                    }
                    None => Arc::clone(entity),
                };
                (Arc::clone(entity), id, Some(concrete))
            }
        };

        let Some(concrete) = concrete else {
            self.transition(RowState::Missing);
            return Ok(None);
        };
        self.transition(RowState::RegistryLookup);

        let key = EntityKey::new(entity.root_entity.as_str(), id);
        let (handle, hydrate) = match ctx.registry.find_entity(&key) {
            Some(handle) => {
                let existing = ctx
                    .registry
                    .entity(handle)
                    .ok_or_else(|| self.error(ctx.row, HydrationErrorKind::StaleHandle))?;
                let compatible = ctx.model.is_same_or_subtype(&concrete.name, existing.entity_name())
                    || (!existing.is_initialized()
                        && ctx.model.is_same_or_subtype(existing.entity_name(), &concrete.name));
                if !compatible {
                    return Err(self.error(
                        ctx.row,
                        HydrationErrorKind::IncompatibleInstance {
                            existing: existing.entity_name().to_string(),
                            requested: concrete.name.clone(),
                        },
                    ));
                }
                let hydrate = match existing.state() {
                    InstanceState::Uninitialized => true,
                    InstanceState::Initializing { execution } => execution != ctx.execution,
                    InstanceState::Initialized => false,
                };
                if hydrate {
                    if let Some(instance) = ctx.registry.entity_mut(handle) {
                        instance.begin_hydration(Arc::clone(&concrete), ctx.execution);
                    }
                }
                (handle, hydrate)
            }
            None => {
                let execution = ctx.execution;
                let (handle, _) = ctx.registry.get_or_create_entity(&key, || {
                    EntityInstance::new(
                        key.clone(),
                        Arc::clone(&concrete),
                        InstanceState::Initializing { execution },
                    )
                });
                (handle, true)
            }
        };

        if hydrate {
            self.transition(RowState::HydrateNew);
            self.hydrate(handle, &key, row, ctx)?;
        } else {
            self.transition(RowState::AttachExisting);
            self.attach(&key, row, ctx)?;
        }
        self.transition(RowState::Finalized);
        Ok(Some(handle))
    }

    fn concrete_type(
        &self,
        declared: &Arc<EntityMapping>,
        discriminator: &Value,
        ctx: &RowContext<'_>,
    ) -> Result<Arc<EntityMapping>, HydrationError> {
        if discriminator.is_null() {
            return Ok(Arc::clone(declared));
        }
        let found = ctx
            .model
            .entity_for_discriminator(&declared.root_entity, discriminator)
            .ok_or_else(|| {
                self.error(
                    ctx.row,
                    HydrationErrorKind::UnknownDiscriminator {
                        entity: declared.name.clone(),
                        value: discriminator.to_string(),
                    },
                )
            })?;
        if !ctx.model.is_same_or_subtype(&found.name, &declared.name) {
            return Err(self.error(
                ctx.row,
                HydrationErrorKind::IncompatibleInstance {
                    existing: found.name.clone(),
                    requested: declared.name.clone(),
                },
            ));
        }
        Ok(Arc::clone(found))
    }

    /// Register-then-populate: the instance is already in the registry, so
    /// children that reach the same key attach to it.
    fn hydrate(
        &mut self,
        handle: EntityHandle,
        key: &EntityKey,
        row: &[Value],
        ctx: &mut RowContext<'_>,
    ) -> Result<(), HydrationError> {
        let InitializerNode::Entity {
            version,
            attributes,
            ..
        } = &mut self.node
        else {
            return Ok(());
        };
        let path = &self.navigable_path;
        let row_index = ctx.row;
        let fail = |kind| HydrationError {
            path: to_loggable_string(Some(path), Some(&key.id)),
            row: row_index,
            kind,
        };

        let version = match version {
            Some(assembler) => Some(assembler.assemble(row).map_err(|e| fail(assembly_kind(e)))?),
            None => None,
        };
        let mut values = Vec::with_capacity(attributes.len());
        for attribute in attributes.iter_mut() {
            let value = match attribute {
                AttributeInitializer::Basic { name, assembler } => (
                    name.clone(),
                    AttributeValue::Basic(assembler.assemble(row).map_err(|e| fail(assembly_kind(e)))?),
                ),
                AttributeInitializer::Embedded { name, components } => {
                    let mut parts = BTreeMap::new();
                    for (component, assembler) in components.iter() {
                        let value = assembler.assemble(row).map_err(|e| fail(assembly_kind(e)))?;
                        parts.insert(component.clone(), value);
                    }
                    (name.clone(), AttributeValue::Component(parts))
                }
                AttributeInitializer::Joined { name, child } => {
                    (name.clone(), AttributeValue::Entity(child.resolve_entity(row, ctx)?))
                }
                AttributeInitializer::Delayed {
                    name,
                    target,
                    foreign_key,
                } => {
                    let fk = foreign_key.assemble(row).map_err(|e| fail(assembly_kind(e)))?;
                    let reference = if fk.is_null() {
                        None
                    } else {
                        let target_key = EntityKey::new(target.root_entity.as_str(), fk);
                        let (proxy, _) = ctx.registry.get_or_create_entity(&target_key, || {
                            EntityInstance::proxy(target_key.clone(), Arc::clone(target))
                        });
                        Some(proxy)
                    };
                    (name.clone(), AttributeValue::Entity(reference))
                }
                AttributeInitializer::CollectionJoined {
                    name,
                    role,
                    kind,
                    index,
                    element,
                } => {
                    let collection = joined_collection(role, *kind, index, element, key, row, ctx)?;
                    (name.clone(), AttributeValue::Collection(collection))
                }
                AttributeInitializer::CollectionDelayed { name, role, kind } => {
                    let collection_key = CollectionKey::new(role.clone(), key.id.clone());
                    let (collection, _) = ctx.registry.get_or_create_collection(&collection_key, || {
                        PersistentCollection::new(collection_key.clone(), *kind, InstanceState::Uninitialized)
                    });
                    (name.clone(), AttributeValue::Collection(collection))
                }
            };
            values.push(value);
        }

        let instance = ctx
            .registry
            .entity_mut(handle)
            .ok_or_else(|| fail(HydrationErrorKind::StaleHandle))?;
        instance.set_version(version);
        for (name, value) in values {
            // Subtype attributes the concrete type lacks are skipped
            instance.set_attribute(&name, value);
        }
        Ok(())
    }

    /// The instance is known; only joined children still need this row.
    fn attach(
        &mut self,
        key: &EntityKey,
        row: &[Value],
        ctx: &mut RowContext<'_>,
    ) -> Result<(), HydrationError> {
        let InitializerNode::Entity { attributes, .. } = &mut self.node else {
            return Ok(());
        };
        for attribute in attributes.iter_mut() {
            match attribute {
                AttributeInitializer::Joined { child, .. } => {
                    child.resolve_entity(row, ctx)?;
                }
                AttributeInitializer::CollectionJoined {
                    role,
                    kind,
                    index,
                    element,
                    ..
                } => {
                    joined_collection(role, *kind, index, element, key, row, ctx)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn assembly_kind(error: AssemblyError) -> HydrationErrorKind {
    match error {
        AssemblyError::PositionOutOfRange { position, width } => {
            HydrationErrorKind::RowShape { position, width }
        }
        AssemblyError::Conversion(err) => HydrationErrorKind::Conversion(err),
    }
}

/// Resolve the collection for `owner`, and add this row's element when the
/// collection is being filled by the current execution.
fn joined_collection(
    role: &NavigableRole,
    kind: CollectionKind,
    index: &Option<BasicAssembler>,
    element: &mut Initializer,
    owner: &EntityKey,
    row: &[Value],
    ctx: &mut RowContext<'_>,
) -> Result<CollectionHandle, HydrationError> {
    let collection_key = CollectionKey::new(role.clone(), owner.id.clone());
    let execution = ctx.execution;
    let (handle, _) = ctx.registry.get_or_create_collection(&collection_key, || {
        PersistentCollection::new(
            collection_key.clone(),
            kind,
            InstanceState::Initializing { execution },
        )
    });
    let row_index = ctx.row;
    let fail = |kind| HydrationError {
        path: collection_key.to_string(),
        row: row_index,
        kind,
    };
    let collection = ctx
        .registry
        .collection(handle)
        .ok_or_else(|| fail(HydrationErrorKind::StaleHandle))?;
    let filling = match collection.state() {
        InstanceState::Initialized => false,
        InstanceState::Initializing { execution: running } if running == execution => true,
        _ => {
            if let Some(collection) = ctx.registry.collection_mut(handle) {
                collection.begin_initialization(execution);
            }
            true
        }
    };

    let position = match index {
        Some(assembler) => match assembler.assemble(row).map_err(|e| fail(assembly_kind(e)))? {
            Value::Int(i) if !(0..=MAX_LIST_INDEX).contains(&i) => {
                return Err(fail(HydrationErrorKind::ListIndex {
                    index: i,
                    max: MAX_LIST_INDEX,
                }));
            }
            Value::Int(i) => Some(i),
            _ => None,
        },
        None => None,
    };
    let member = element.resolve_entity(row, ctx)?;
    if let (true, Some(member)) = (filling, member) {
        if let Some(collection) = ctx.registry.collection_mut(handle) {
            collection.add_element(member, position);
        }
    }
    Ok(handle)
}

/// Initializers for every select-list item of one statement execution.
#[derive(Debug)]
pub struct InitializerForest {
    roots: Vec<Initializer>,
}

impl InitializerForest {
    pub fn new(results: &[DomainResult]) -> Self {
        let roots = results
            .iter()
            .map(|result| match result {
                DomainResult::Entity(entity) => Initializer::entity(entity, true),
                DomainResult::Scalar(scalar) => Initializer::scalar(&scalar.label, scalar.assembler),
            })
            .collect();
        InitializerForest { roots }
    }

    pub fn roots(&self) -> &[Initializer] {
        &self.roots
    }

    /// Hydrate one row, returning one value per root.
    pub fn process_row(&mut self, row: &[Value], ctx: &mut RowContext<'_>) -> Result<Vec<ResultValue>, HydrationError> {
        let mut values = Vec::with_capacity(self.roots.len());
        for root in &mut self.roots {
            values.push(root.process(row, ctx)?);
        }
        Ok(values)
    }
}
