//! Shared fixture model for unit tests.

use super::{DomainModel, DomainModelConfig};

pub const SHOP_MODEL_YAML: &str = include_str!("../../tests/fixtures/shop.yaml");

pub fn shop_model() -> DomainModel {
    DomainModelConfig::from_yaml_str(SHOP_MODEL_YAML)
        .and_then(|config| config.build())
        .expect("shop fixture model should build")
}
