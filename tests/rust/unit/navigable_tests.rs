use relgraph::navigable::{
    collapse, to_loggable_string, NavigablePath, NavigableRole, NULL_KEY, UNREFERENCED,
};
use relgraph::value::Value;

#[test]
fn test_path_rebuilds_from_parent_and_local_name() {
    let path = NavigablePath::root("Order")
        .append("lineItems")
        .append("product");
    let mut rebuilt = vec![path.local_name().to_string()];
    let mut current = path.parent();
    while let Some(parent) = current {
        rebuilt.push(parent.local_name().to_string());
        current = parent.parent();
    }
    rebuilt.reverse();
    assert_eq!(rebuilt.join("."), path.full_path());
}

#[test]
fn test_parent_or_equal() {
    let order = NavigablePath::root("Order");
    let customer = order.append("customer");
    assert!(order.is_parent_or_equal(&customer));
    assert!(customer.is_parent_or_equal(&customer));
    assert!(!customer.is_parent_or_equal(&order));
}

#[test]
fn test_roles_and_paths_log_the_same_way() {
    let role = NavigableRole::attribute("Order", "customer");
    let path = NavigablePath::root("Order").append("customer");
    let key = Value::Int(3);
    assert_eq!(
        to_loggable_string(Some(&role), Some(&key)),
        to_loggable_string(Some(&path), Some(&key))
    );
}

#[test]
fn test_key_placeholder_and_unreferenced_tokens() {
    let path = NavigablePath::root("Animal");
    assert_eq!(
        to_loggable_string(Some(&path), None),
        format!("Animal#{}", NULL_KEY)
    );
    assert_eq!(
        to_loggable_string::<NavigablePath>(None, None),
        UNREFERENCED
    );
}

#[test]
fn test_text_keys_are_rendered_raw() {
    let path = NavigablePath::root("Tag");
    assert_eq!(
        to_loggable_string(Some(&path), Some(&Value::Text("rust".into()))),
        "Tag#rust"
    );
}

#[test]
fn test_collapse_keeps_type_and_attributes() {
    assert_eq!(collapse("org.shop.model.Order.customer"), "o.s.m.Order.customer");
    assert_eq!(collapse("Order"), "Order");
}
