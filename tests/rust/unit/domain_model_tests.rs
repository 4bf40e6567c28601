use std::io::Write;

use relgraph::domain_model::{
    AssociationJoin, CollectionKind, DomainModelConfig, DomainModelError, RepresentationMode,
};
use relgraph::value::Value;
use tempfile::NamedTempFile;

fn fixture_path() -> String {
    format!("{}/tests/fixtures/shop.yaml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_shop_fixture_loads() {
    let config = DomainModelConfig::from_yaml_file(fixture_path()).unwrap();
    let model = config.build().unwrap();
    assert_eq!(model.name(), "shop");

    let order = model.entity("Order").unwrap();
    assert_eq!(order.table, "orders");
    assert!(order.version.is_some());
    let items = order.association("lineItems").unwrap();
    assert!(items.is_collection());

    let product = model.entity("Product").unwrap();
    assert_eq!(product.representation, RepresentationMode::Map);
}

#[test]
fn test_hierarchy_shares_root_and_table() {
    let model = DomainModelConfig::from_yaml_file(fixture_path())
        .unwrap()
        .build()
        .unwrap();
    let dog = model.entity("Dog").unwrap();
    assert_eq!(dog.root_entity, "Animal");
    assert_eq!(dog.table, "animals");
    assert!(model.is_same_or_subtype("Dog", "Animal"));
    assert!(!model.is_same_or_subtype("Animal", "Dog"));

    let names: Vec<&str> = model
        .self_and_descendants("Animal")
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names[0], "Animal");
    assert_eq!(names.len(), 3);

    let cat = model
        .entity_for_discriminator("Animal", &Value::Text("cat".into()))
        .unwrap();
    assert_eq!(cat.name, "Cat");
    assert!(model
        .entity_for_discriminator("Animal", &Value::Text("parrot".into()))
        .is_none());
}

#[test]
fn test_many_to_many_uses_join_table() {
    let model = DomainModelConfig::from_yaml_file(fixture_path())
        .unwrap()
        .build()
        .unwrap();
    let tags = model.entity("Order").unwrap().association("tags").unwrap();
    assert!(matches!(tags.join, AssociationJoin::JoinTable { .. }));
}

#[test]
fn test_model_file_from_temp_dir() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
name: tiny
entities:
  - name: Thing
    table: things
    id: {{ column: id, type: string }}
"#
    )
    .unwrap();
    let model = DomainModelConfig::from_yaml_file(file.path())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(model.entity_names().collect::<Vec<_>>(), vec!["Thing"]);
}

#[test]
fn test_unknown_entity_lookup() {
    let model = DomainModelConfig::from_yaml_file(fixture_path())
        .unwrap()
        .build()
        .unwrap();
    let err = model.entity("Invoice").unwrap_err();
    assert_eq!(
        err,
        DomainModelError::UnknownEntity {
            entity: "Invoice".to_string()
        }
    );
}

#[test]
fn test_bad_yaml_is_a_parse_error() {
    let err = DomainModelConfig::from_yaml_str("name: [unclosed").unwrap_err();
    assert!(matches!(err, DomainModelError::ParseError { .. }));
}

#[test]
fn test_collection_kind_from_yaml() {
    let config = DomainModelConfig::from_yaml_file(fixture_path()).unwrap();
    let order = config
        .entities
        .iter()
        .find(|e| e.name == "Order")
        .unwrap();
    let kinds: Vec<CollectionKind> = order
        .associations
        .iter()
        .filter_map(|a| a.collection)
        .collect();
    assert!(kinds.contains(&CollectionKind::List));
    assert!(kinds.contains(&CollectionKind::Set));
}
