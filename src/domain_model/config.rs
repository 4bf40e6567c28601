use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::DomainModelError;
use super::model::DomainModel;
use super::value_mapping::SqlType;

/// Domain models are defined in YAML with the following structure:
///
/// ```yaml
/// name: shop
/// database: sales               # optional, qualifies every table
/// entities:
///   - name: Order
///     table: orders
///     id: { column: id, type: int64 }
///     version: { column: version, type: int64 }
///     attributes:
///       - { name: total, column: total, type: float64 }
///       - name: shipTo
///         embedded:
///           - { name: city, column: ship_city, type: string }
///     associations:
///       - { name: customer, kind: many_to_one, target: Customer, join_column: customer_id }
///       - name: lineItems
///         kind: one_to_many
///         target: LineItem
///         join_column: order_id
///         mapped_by: order
///         collection: list
///         index_column: position
///   - name: Animal
///     table: animals
///     id: { column: id, type: int64 }
///     discriminator: { column: kind, value: animal }
///   - name: Dog
///     extends: Animal
///     discriminator_value: dog
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainModelConfig {
    pub name: String,
    #[serde(default)]
    pub database: Option<String>,
    pub entities: Vec<EntityDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Required for hierarchy roots; subtypes share the root's table.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub id: Option<IdentifierDefinition>,
    #[serde(default)]
    pub version: Option<ColumnDefinition>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorDefinition>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub discriminator_value: Option<String>,
    /// `struct` (default) or `map`; anything else is rejected when the model
    /// is built.
    #[serde(default)]
    pub representation: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub associations: Vec<AssociationDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierDefinition {
    #[serde(default = "default_id_name")]
    pub name: String,
    pub column: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub column: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscriminatorDefinition {
    pub column: String,
    #[serde(rename = "type", default = "default_discriminator_type")]
    pub sql_type: SqlType,
    /// Discriminator value of the hierarchy root itself.
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeDefinition {
    Embedded {
        name: String,
        embedded: Vec<BasicAttributeDefinition>,
    },
    Basic(BasicAttributeDefinition),
}

impl AttributeDefinition {
    pub fn name(&self) -> &str {
        match self {
            AttributeDefinition::Embedded { name, .. } => name,
            AttributeDefinition::Basic(basic) => &basic.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAttributeDefinition {
    pub name: String,
    pub column: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(self, AssociationKind::OneToMany | AssociationKind::ManyToMany)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Bag,
    Set,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTiming {
    #[default]
    Lazy,
    Eager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinTableDefinition {
    pub table: String,
    /// Column referencing the owner's identifier.
    pub join_column: String,
    /// Column referencing the target's identifier.
    pub inverse_join_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDefinition {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    /// Owner table for to-one kinds, target table for `one_to_many`.
    #[serde(default)]
    pub join_column: Option<String>,
    #[serde(default)]
    pub join_table: Option<JoinTableDefinition>,
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub collection: Option<CollectionKind>,
    #[serde(default)]
    pub index_column: Option<String>,
    #[serde(default)]
    pub fetch: FetchTiming,
}

fn default_id_name() -> String {
    "id".to_string()
}

fn default_discriminator_type() -> SqlType {
    SqlType::String
}

fn default_true() -> bool {
    true
}

impl DomainModelConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainModelError> {
        serde_yaml::from_str(yaml).map_err(|e| DomainModelError::ParseError {
            error: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, DomainModelError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| DomainModelError::ReadError {
            error: format!("{}: {}", path.as_ref().display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate and build the runtime model.
    pub fn build(&self) -> Result<DomainModel, DomainModelError> {
        DomainModel::build(self)
    }
}
