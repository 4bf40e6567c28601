use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::config::{
    AssociationDefinition, AssociationKind, AttributeDefinition, BasicAttributeDefinition,
    CollectionKind, DomainModelConfig, EntityDefinition, FetchTiming,
};
use super::errors::DomainModelError;
use super::value_mapping::{self, ValueMapping};
use crate::navigable::NavigableRole;
use crate::value::Value;

lazy_static! {
    static ref SQL_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid regex");
    static ref NAME_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex");
}

/// How hydrated instances of an entity are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RepresentationMode {
    /// Positional attribute slots in mapping order.
    #[default]
    Struct,
    /// Attribute-name keyed map.
    Map,
}

impl FromStr for RepresentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "struct" | "pojo" => Ok(RepresentationMode::Struct),
            "map" | "dynamic-map" => Ok(RepresentationMode::Map),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for RepresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentationMode::Struct => write!(f, "struct"),
            RepresentationMode::Map => write!(f, "map"),
        }
    }
}

/// A physical column together with its value mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnMapping {
    pub column: String,
    pub mapping: ValueMapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorMapping {
    pub column: ColumnMapping,
    /// Value identifying this exact entity type.
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicAttribute {
    pub name: String,
    pub column: ColumnMapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedAttribute {
    pub name: String,
    pub attributes: Vec<BasicAttribute>,
}

impl EmbeddedAttribute {
    pub fn attribute(&self, name: &str) -> Option<&BasicAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// How the association's tables are linked.
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationJoin {
    /// `owner.column = target.id` (many-to-one, one-to-one).
    ForeignKeyOnOwner { column: ColumnMapping },
    /// `target.column = owner.id` (one-to-many).
    ForeignKeyOnTarget { column: ColumnMapping },
    /// `owner.id = link.owner_column AND link.target_column = target.id`.
    JoinTable {
        table: String,
        owner_column: ColumnMapping,
        target_column: ColumnMapping,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSemantics {
    pub kind: CollectionKind,
    pub index_column: Option<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationMapping {
    pub name: String,
    pub role: NavigableRole,
    pub kind: AssociationKind,
    pub target: String,
    pub join: AssociationJoin,
    pub collection: Option<CollectionSemantics>,
    pub mapped_by: Option<String>,
    pub fetch: FetchTiming,
}

impl AssociationMapping {
    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMapping {
    Basic(BasicAttribute),
    Embedded(EmbeddedAttribute),
    Association(AssociationMapping),
}

impl AttributeMapping {
    pub fn name(&self) -> &str {
        match self {
            AttributeMapping::Basic(b) => &b.name,
            AttributeMapping::Embedded(e) => &e.name,
            AttributeMapping::Association(a) => &a.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityMapping {
    pub name: String,
    /// Root of the inheritance hierarchy; identity keys use this name.
    pub root_entity: String,
    pub super_entity: Option<String>,
    pub sub_entities: Vec<String>,
    /// Qualified table name.
    pub table: String,
    pub identifier_name: String,
    pub identifier: ColumnMapping,
    pub version: Option<ColumnMapping>,
    pub discriminator: Option<DiscriminatorMapping>,
    pub representation: RepresentationMode,
    /// Inherited attributes first, then this type's own; the index is the
    /// attribute's slot in a struct-represented instance.
    pub attributes: Vec<AttributeMapping>,
    pub role: NavigableRole,
}

impl EntityMapping {
    pub fn attribute(&self, name: &str) -> Option<(usize, &AttributeMapping)> {
        self.attributes
            .iter()
            .enumerate()
            .find(|(_, a)| a.name() == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationMapping> {
        match self.attribute(name) {
            Some((_, AttributeMapping::Association(assoc))) => Some(assoc),
            _ => None,
        }
    }

    pub fn is_hierarchy_root(&self) -> bool {
        self.super_entity.is_none()
    }
}

/// Validated mapping metadata for a set of entities.
#[derive(Debug, Clone)]
pub struct DomainModel {
    name: String,
    entities: HashMap<String, Arc<EntityMapping>>,
    order: Vec<String>,
}

impl DomainModel {
    pub fn build(config: &DomainModelConfig) -> Result<Self, DomainModelError> {
        ModelBuilder::new(config)?.finish()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self, name: &str) -> Result<&Arc<EntityMapping>, DomainModelError> {
        self.entities
            .get(name)
            .ok_or_else(|| DomainModelError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// True when `entity` is `ancestor` or inherits from it.
    pub fn is_same_or_subtype(&self, entity: &str, ancestor: &str) -> bool {
        let mut current = Some(entity.to_string());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self
                .entities
                .get(&name)
                .and_then(|e| e.super_entity.clone());
        }
        false
    }

    /// `entity` and all of its descendants, parents before children.
    pub fn self_and_descendants(&self, entity: &str) -> Vec<&Arc<EntityMapping>> {
        let mut out = Vec::new();
        let mut stack = vec![entity.to_string()];
        while let Some(name) = stack.pop() {
            if let Some(mapping) = self.entities.get(&name) {
                out.push(mapping);
                for sub in mapping.sub_entities.iter().rev() {
                    stack.push(sub.clone());
                }
            }
        }
        out
    }

    /// Entity type whose discriminator value equals `value` within the
    /// hierarchy rooted at `root_entity`.
    pub fn entity_for_discriminator(&self, root_entity: &str, value: &Value) -> Option<&Arc<EntityMapping>> {
        self.self_and_descendants(root_entity)
            .into_iter()
            .find(|e| e.discriminator.as_ref().is_some_and(|d| &d.value == value))
    }
}

struct ModelBuilder<'a> {
    config: &'a DomainModelConfig,
    definitions: HashMap<&'a str, &'a EntityDefinition>,
    built: HashMap<String, EntityMapping>,
    order: Vec<String>,
}

impl<'a> ModelBuilder<'a> {
    fn new(config: &'a DomainModelConfig) -> Result<Self, DomainModelError> {
        let mut definitions = HashMap::new();
        for def in &config.entities {
            check_name(&def.name, "entity name")?;
            if definitions.insert(def.name.as_str(), def).is_some() {
                return Err(DomainModelError::DuplicateEntity {
                    entity: def.name.clone(),
                });
            }
        }
        Ok(ModelBuilder {
            config,
            definitions,
            built: HashMap::new(),
            order: Vec::new(),
        })
    }

    fn finish(mut self) -> Result<DomainModel, DomainModelError> {
        for def in &self.config.entities {
            let mut visiting = HashSet::new();
            self.build_entity(&def.name, &mut visiting)?;
        }

        // Associations reference other entities' identifiers, so they are
        // resolved once every entity exists.
        for def in &self.config.entities {
            self.attach_associations(def)?;
        }
        self.link_subtypes();
        self.validate_hierarchies()?;
        self.validate_shared_attributes()?;
        self.validate_mapped_by()?;

        let entities = self
            .built
            .into_iter()
            .map(|(name, mapping)| (name, Arc::new(mapping)))
            .collect();
        Ok(DomainModel {
            name: self.config.name.clone(),
            entities,
            order: self.order,
        })
    }

    fn build_entity(
        &mut self,
        name: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<(), DomainModelError> {
        if self.built.contains_key(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(DomainModelError::InheritanceCycle {
                entity: name.to_string(),
            });
        }
        let def = *self
            .definitions
            .get(name)
            .ok_or_else(|| DomainModelError::UnknownEntity {
                entity: name.to_string(),
            })?;

        let representation = match &def.representation {
            None => RepresentationMode::default(),
            Some(raw) => raw.parse::<RepresentationMode>().map_err(|mode| {
                DomainModelError::UnknownRepresentationMode {
                    entity: def.name.clone(),
                    mode,
                }
            })?,
        };

        let mut mapping = match &def.extends {
            Some(parent_name) => {
                self.build_entity(parent_name, visiting)?;
                if def.table.is_some() || def.id.is_some() {
                    return Err(DomainModelError::invalid_mapping(
                        &def.name,
                        "subtypes share the hierarchy root's table and identifier",
                    ));
                }
                let parent = &self.built[parent_name.as_str()];
                let root = &self.built[parent.root_entity.as_str()];
                let discriminator = match (&root.discriminator, &def.discriminator_value) {
                    (Some(root_disc), Some(value)) => Some(DiscriminatorMapping {
                        column: root_disc.column.clone(),
                        value: discriminator_value(&def.name, &root_disc.column, value)?,
                    }),
                    _ => {
                        return Err(DomainModelError::invalid_mapping(
                            &def.name,
                            "subtypes need a discriminator_value and a discriminator on the hierarchy root",
                        ))
                    }
                };
                EntityMapping {
                    name: def.name.clone(),
                    root_entity: parent.root_entity.clone(),
                    super_entity: Some(parent_name.clone()),
                    sub_entities: Vec::new(),
                    table: parent.table.clone(),
                    identifier_name: parent.identifier_name.clone(),
                    identifier: parent.identifier.clone(),
                    version: parent.version.clone(),
                    discriminator,
                    representation,
                    attributes: parent.attributes.clone(),
                    role: NavigableRole::root(def.name.as_str()),
                }
            }
            None => {
                let table = def.table.as_ref().ok_or_else(|| {
                    DomainModelError::invalid_mapping(&def.name, "missing table")
                })?;
                let id = def.id.as_ref().ok_or_else(|| {
                    DomainModelError::invalid_mapping(&def.name, "missing id")
                })?;
                check_sql(table, &format!("table of `{}`", def.name))?;
                check_sql(&id.column, &format!("id column of `{}`", def.name))?;
                check_name(&id.name, &format!("id name of `{}`", def.name))?;
                if def.discriminator_value.is_some() {
                    return Err(DomainModelError::invalid_mapping(
                        &def.name,
                        "discriminator_value is only valid on subtypes",
                    ));
                }
                let table = match &self.config.database {
                    Some(db) if !table.contains('.') => format!("{}.{}", db, table),
                    _ => table.clone(),
                };
                let version = match &def.version {
                    Some(v) => {
                        check_sql(&v.column, &format!("version column of `{}`", def.name))?;
                        Some(ColumnMapping {
                            column: v.column.clone(),
                            mapping: value_mapping::for_type(v.sql_type, true),
                        })
                    }
                    None => None,
                };
                let discriminator = match &def.discriminator {
                    Some(d) => {
                        check_sql(&d.column, &format!("discriminator of `{}`", def.name))?;
                        let column = ColumnMapping {
                            column: d.column.clone(),
                            mapping: value_mapping::for_type(d.sql_type, false),
                        };
                        let value = discriminator_value(&def.name, &column, &d.value)?;
                        Some(DiscriminatorMapping { column, value })
                    }
                    None => None,
                };
                EntityMapping {
                    name: def.name.clone(),
                    root_entity: def.name.clone(),
                    super_entity: None,
                    sub_entities: Vec::new(),
                    table,
                    identifier_name: id.name.clone(),
                    identifier: ColumnMapping {
                        column: id.column.clone(),
                        mapping: value_mapping::for_type(id.sql_type, false),
                    },
                    version,
                    discriminator,
                    representation,
                    attributes: Vec::new(),
                    role: NavigableRole::root(def.name.as_str()),
                }
            }
        };

        for attr in &def.attributes {
            let built = match attr {
                AttributeDefinition::Basic(basic) => {
                    AttributeMapping::Basic(basic_attribute(&def.name, basic)?)
                }
                AttributeDefinition::Embedded { name, embedded } => {
                    check_name(name, &format!("attribute of `{}`", def.name))?;
                    let attributes = embedded
                        .iter()
                        .map(|b| basic_attribute(&def.name, b))
                        .collect::<Result<Vec<_>, _>>()?;
                    AttributeMapping::Embedded(EmbeddedAttribute {
                        name: name.clone(),
                        attributes,
                    })
                }
            };
            push_attribute(&mut mapping, built)?;
        }

        visiting.remove(name);
        self.order.push(def.name.clone());
        self.built.insert(def.name.clone(), mapping);
        Ok(())
    }

    fn attach_associations(&mut self, def: &EntityDefinition) -> Result<(), DomainModelError> {
        // Inherited associations are re-attached on every subtype so slot
        // order follows the hierarchy.
        let mut chain = vec![def];
        let mut current = def;
        while let Some(parent) = &current.extends {
            current = self.definitions[parent.as_str()];
            chain.push(current);
        }
        chain.reverse();

        let mut resolved = Vec::new();
        for link in chain {
            for assoc in &link.associations {
                resolved.push(self.association(&def.name, link, assoc)?);
            }
        }
        let mapping = self
            .built
            .get_mut(def.name.as_str())
            .ok_or_else(|| DomainModelError::UnknownEntity {
                entity: def.name.clone(),
            })?;
        for assoc in resolved {
            push_attribute(mapping, AttributeMapping::Association(assoc))?;
        }
        Ok(())
    }

    fn association(
        &self,
        owner_name: &str,
        declaring: &EntityDefinition,
        def: &AssociationDefinition,
    ) -> Result<AssociationMapping, DomainModelError> {
        check_name(&def.name, &format!("association of `{}`", declaring.name))?;
        let owner = &self.built[owner_name];
        let target = self
            .built
            .get(def.target.as_str())
            .ok_or_else(|| DomainModelError::UnknownEntity {
                entity: def.target.clone(),
            })?;

        let join_column = |role: &str| -> Result<String, DomainModelError> {
            let column = def.join_column.clone().ok_or_else(|| {
                DomainModelError::invalid_mapping(
                    &declaring.name,
                    format!("association `{}` needs a join_column ({})", def.name, role),
                )
            })?;
            check_sql(&column, &format!("join column of `{}.{}`", declaring.name, def.name))?;
            Ok(column)
        };

        let join = match def.kind {
            AssociationKind::ManyToOne | AssociationKind::OneToOne => {
                AssociationJoin::ForeignKeyOnOwner {
                    column: ColumnMapping {
                        column: join_column("on the owner table")?,
                        mapping: target.identifier.mapping.into_nullable(),
                    },
                }
            }
            AssociationKind::OneToMany => AssociationJoin::ForeignKeyOnTarget {
                column: ColumnMapping {
                    column: join_column("on the target table")?,
                    mapping: owner.identifier.mapping.into_nullable(),
                },
            },
            AssociationKind::ManyToMany => {
                let jt = def.join_table.as_ref().ok_or_else(|| {
                    DomainModelError::invalid_mapping(
                        &declaring.name,
                        format!("many_to_many association `{}` needs a join_table", def.name),
                    )
                })?;
                check_sql(&jt.table, "join table")?;
                check_sql(&jt.join_column, "join table column")?;
                check_sql(&jt.inverse_join_column, "join table column")?;
                let table = match &self.config.database {
                    Some(db) if !jt.table.contains('.') => format!("{}.{}", db, jt.table),
                    _ => jt.table.clone(),
                };
                AssociationJoin::JoinTable {
                    table,
                    owner_column: ColumnMapping {
                        column: jt.join_column.clone(),
                        mapping: owner.identifier.mapping,
                    },
                    target_column: ColumnMapping {
                        column: jt.inverse_join_column.clone(),
                        mapping: target.identifier.mapping,
                    },
                }
            }
        };

        let collection = if def.kind.is_to_many() {
            let kind = def.collection.unwrap_or(CollectionKind::Bag);
            let index_column = match (kind, &def.index_column) {
                (CollectionKind::List, Some(col)) => {
                    check_sql(col, "index column")?;
                    Some(ColumnMapping {
                        column: col.clone(),
                        mapping: value_mapping::INT64,
                    })
                }
                (CollectionKind::List, None) => {
                    return Err(DomainModelError::invalid_mapping(
                        &declaring.name,
                        format!("list collection `{}` needs an index_column", def.name),
                    ))
                }
                _ => None,
            };
            Some(CollectionSemantics { kind, index_column })
        } else {
            if def.collection.is_some() {
                return Err(DomainModelError::invalid_mapping(
                    &declaring.name,
                    format!("to-one association `{}` cannot declare collection semantics", def.name),
                ));
            }
            None
        };

        Ok(AssociationMapping {
            name: def.name.clone(),
            role: NavigableRole::attribute(&declaring.name, &def.name),
            kind: def.kind,
            target: def.target.clone(),
            join,
            collection,
            mapped_by: def.mapped_by.clone(),
            fetch: def.fetch,
        })
    }

    fn link_subtypes(&mut self) {
        let links: Vec<(String, String)> = self
            .order
            .iter()
            .filter_map(|name| {
                self.built[name.as_str()]
                    .super_entity
                    .clone()
                    .map(|parent| (parent, name.clone()))
            })
            .collect();
        for (parent, child) in links {
            if let Some(mapping) = self.built.get_mut(parent.as_str()) {
                mapping.sub_entities.push(child);
            }
        }
    }

    fn validate_hierarchies(&self) -> Result<(), DomainModelError> {
        let mut seen_values: HashMap<(String, Value), String> = HashMap::new();
        for name in &self.order {
            let mapping = &self.built[name.as_str()];
            if mapping.is_hierarchy_root() && !mapping.sub_entities.is_empty() && mapping.discriminator.is_none() {
                return Err(DomainModelError::invalid_mapping(
                    name,
                    "an entity with subtypes needs a discriminator",
                ));
            }
            if let Some(disc) = &mapping.discriminator {
                let key = (mapping.root_entity.clone(), disc.value.clone());
                if let Some(other) = seen_values.insert(key, name.clone()) {
                    return Err(DomainModelError::invalid_mapping(
                        name,
                        format!("discriminator value '{}' already used by `{}`", disc.value, other),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Types in one hierarchy share a table and are selected together, so an
    /// attribute name must map to the same storage on every type declaring it.
    fn validate_shared_attributes(&self) -> Result<(), DomainModelError> {
        let mut declared: HashMap<(&str, &str), (&str, &AttributeMapping)> = HashMap::new();
        for name in &self.order {
            let mapping = &self.built[name.as_str()];
            for attr in &mapping.attributes {
                let key = (mapping.root_entity.as_str(), attr.name());
                match declared.get(&key) {
                    Some((other, existing)) if !same_storage(existing, attr) => {
                        return Err(DomainModelError::invalid_mapping(
                            name,
                            format!(
                                "attribute `{}` is mapped differently on `{}`",
                                attr.name(),
                                other
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        declared.insert(key, (name.as_str(), attr));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_mapped_by(&self) -> Result<(), DomainModelError> {
        for name in &self.order {
            for attr in &self.built[name.as_str()].attributes {
                let AttributeMapping::Association(assoc) = attr else {
                    continue;
                };
                let Some(mapped_by) = &assoc.mapped_by else {
                    continue;
                };
                let target = &self.built[assoc.target.as_str()];
                let points_back = target.association(mapped_by).is_some_and(|inverse| {
                    self.is_same_or_subtype(name, &inverse.target)
                        || self.is_same_or_subtype(&inverse.target, name)
                });
                if !points_back {
                    return Err(DomainModelError::invalid_mapping(
                        name,
                        format!(
                            "mapped_by `{}` of `{}` is not an association of `{}` pointing back",
                            mapped_by, assoc.name, assoc.target
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn is_same_or_subtype(&self, entity: &str, ancestor: &str) -> bool {
        let mut current = Some(entity.to_string());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.built.get(&name).and_then(|e| e.super_entity.clone());
        }
        false
    }
}

fn basic_attribute(
    entity: &str,
    def: &BasicAttributeDefinition,
) -> Result<BasicAttribute, DomainModelError> {
    check_name(&def.name, &format!("attribute of `{}`", entity))?;
    check_sql(&def.column, &format!("column of `{}.{}`", entity, def.name))?;
    Ok(BasicAttribute {
        name: def.name.clone(),
        column: ColumnMapping {
            column: def.column.clone(),
            mapping: value_mapping::for_type(def.sql_type, def.nullable),
        },
    })
}

fn discriminator_value(
    entity: &str,
    column: &ColumnMapping,
    raw: &str,
) -> Result<Value, DomainModelError> {
    column
        .mapping
        .extract(&Value::Text(raw.to_string()))
        .map_err(|e| DomainModelError::invalid_mapping(entity, format!("discriminator value: {}", e)))
}

fn same_storage(a: &AttributeMapping, b: &AttributeMapping) -> bool {
    match (a, b) {
        (AttributeMapping::Basic(a), AttributeMapping::Basic(b)) => a.column == b.column,
        (AttributeMapping::Embedded(a), AttributeMapping::Embedded(b)) => a == b,
        (AttributeMapping::Association(a), AttributeMapping::Association(b)) => {
            a.kind == b.kind
                && a.target == b.target
                && a.join == b.join
                && a.collection == b.collection
        }
        _ => false,
    }
}

fn push_attribute(
    mapping: &mut EntityMapping,
    attribute: AttributeMapping,
) -> Result<(), DomainModelError> {
    let name = attribute.name();
    if name == mapping.identifier_name || mapping.attribute(name).is_some() {
        return Err(DomainModelError::DuplicateAttribute {
            entity: mapping.name.clone(),
            attribute: name.to_string(),
        });
    }
    mapping.attributes.push(attribute);
    Ok(())
}

fn check_sql(name: &str, context: &str) -> Result<(), DomainModelError> {
    if SQL_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DomainModelError::InvalidIdentifier {
            name: name.to_string(),
            context: context.to_string(),
        })
    }
}

fn check_name(name: &str, context: &str) -> Result<(), DomainModelError> {
    if NAME_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DomainModelError::InvalidIdentifier {
            name: name.to_string(),
            context: context.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::testing::shop_model;

    fn build(yaml: &str) -> Result<DomainModel, DomainModelError> {
        DomainModelConfig::from_yaml_str(yaml)?.build()
    }

    #[test]
    fn test_shop_model_builds() {
        let model = shop_model();
        let order = model.entity("Order").unwrap();
        assert_eq!(order.table, "orders");
        assert_eq!(order.identifier.column, "id");
        let customer = order.association("customer").unwrap();
        assert_eq!(customer.role.full_path(), "Order.customer");
        assert!(matches!(
            customer.join,
            AssociationJoin::ForeignKeyOnOwner { .. }
        ));
        let items = order.association("lineItems").unwrap();
        assert!(items.is_collection());
    }

    #[test]
    fn test_subtypes_inherit_attributes_and_table() {
        let model = shop_model();
        let dog = model.entity("Dog").unwrap();
        assert_eq!(dog.table, "animals");
        assert_eq!(dog.root_entity, "Animal");
        assert!(dog.attribute("name").is_some());
        assert!(dog.attribute("barkVolume").is_some());
        assert!(model.is_same_or_subtype("Dog", "Animal"));
        assert!(!model.is_same_or_subtype("Animal", "Dog"));
        let found = model
            .entity_for_discriminator("Animal", &Value::Text("cat".into()))
            .unwrap();
        assert_eq!(found.name, "Cat");
    }

    #[test]
    fn test_unknown_representation_fails_fast() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
    representation: proxy
"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainModelError::UnknownRepresentationMode {
                entity: "A".into(),
                mode: "proxy".into()
            }
        );
    }

    #[test]
    fn test_map_representation() {
        let model = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
    representation: MAP
"#,
        )
        .unwrap();
        assert_eq!(
            model.entity("A").unwrap().representation,
            RepresentationMode::Map
        );
    }

    #[test]
    fn test_unknown_target_entity() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
    associations:
      - { name: b, kind: many_to_one, target: B, join_column: b_id }
"#,
        )
        .unwrap_err();
        assert_eq!(err, DomainModelError::UnknownEntity { entity: "B".into() });
    }

    #[test]
    fn test_invalid_column_identifier_rejected() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: "id; drop table a", type: int64 }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DomainModelError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_list_without_index_column_rejected() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
    associations:
      - { name: bs, kind: one_to_many, target: B, join_column: a_id, collection: list }
  - name: B
    table: b
    id: { column: id, type: int64 }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DomainModelError::InvalidMapping { .. }));
    }

    #[test]
    fn test_inheritance_cycle_detected() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    extends: B
    discriminator_value: a
  - name: B
    extends: A
    discriminator_value: b
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DomainModelError::InheritanceCycle { .. }));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let err = build(
            r#"
name: m
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
    attributes:
      - { name: x, column: x1, type: int64 }
      - { name: x, column: x2, type: int64 }
"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainModelError::DuplicateAttribute {
                entity: "A".into(),
                attribute: "x".into()
            }
        );
    }

    #[test]
    fn test_sibling_subtypes_mapping_one_attribute_to_different_columns() {
        let err = build(
            r#"
name: m
entities:
  - name: Animal
    table: animals
    id: { column: id, type: int64 }
    discriminator: { column: kind, value: animal }
  - name: Dog
    extends: Animal
    discriminator_value: dog
    attributes:
      - { name: color, column: dog_color, type: string }
  - name: Cat
    extends: Animal
    discriminator_value: cat
    attributes:
      - { name: color, column: cat_color, type: string }
"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainModelError::invalid_mapping("Cat", "attribute `color` is mapped differently on `Dog`")
        );
    }

    #[test]
    fn test_sibling_subtypes_may_share_a_column() {
        let model = build(
            r#"
name: m
entities:
  - name: Animal
    table: animals
    id: { column: id, type: int64 }
    discriminator: { column: kind, value: animal }
  - name: Dog
    extends: Animal
    discriminator_value: dog
    attributes:
      - { name: color, column: color, type: string }
  - name: Cat
    extends: Animal
    discriminator_value: cat
    attributes:
      - { name: color, column: color, type: string }
"#,
        )
        .unwrap();
        assert!(model.entity("Cat").unwrap().attribute("color").is_some());
    }

    #[test]
    fn test_database_qualifies_tables() {
        let model = build(
            r#"
name: m
database: sales
entities:
  - name: A
    table: a
    id: { column: id, type: int64 }
"#,
        )
        .unwrap();
        assert_eq!(model.entity("A").unwrap().table, "sales.a");
    }
}
