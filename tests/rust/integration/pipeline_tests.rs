//! Query text to SQL, without a store.

use relgraph::converter::LoweringError;
use relgraph::session::PreparedKind;
use relgraph::sql_ast::ParameterSource;
use relgraph::PipelineError;
use test_case::test_case;

use super::support::{int, shop_engine, Canned, MemoryStore};
use relgraph::executor::QueryParameters;

#[test]
fn test_rendering_is_deterministic_across_engines() {
    let query = "select o, c.name from Order o join o.customer c \
                 where o.total between :low and :high and c.address.city = 'Oslo' \
                 order by o.placedAt desc limit 10";
    let first = shop_engine().prepare(query).unwrap();
    let second = shop_engine().prepare(query).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.bindings, second.bindings);

    let sources: Vec<String> = first.bindings.iter().map(|b| b.source.to_string()).collect();
    assert_eq!(sources, vec![":low", ":high", "literal 'Oslo'"]);
    assert_eq!(first.sql.matches('?').count(), first.bindings.len());
    assert!(first.sql.ends_with("ORDER BY orders_1.placed_at DESC LIMIT 10"), "{}", first.sql);
}

#[test]
fn test_path_used_in_several_clauses_is_joined_once() {
    let prepared = shop_engine()
        .prepare(
            "select o, o.customer.name from Order o \
             where o.customer.name = :name order by o.customer.name",
        )
        .unwrap();
    assert_eq!(prepared.sql.matches("JOIN customers").count(), 1, "{}", prepared.sql);
}

#[test]
fn test_explain_lists_binds_in_placeholder_order() {
    let prepared = shop_engine()
        .prepare("select t from Tag t where t.id = ?1 or t.label = :label")
        .unwrap();
    let explain = prepared.explain();
    let lines: Vec<&str> = explain.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], prepared.sql);
    assert!(lines[1].starts_with("  1: ?1"), "{}", lines[1]);
    assert!(lines[2].starts_with("  2: :label"), "{}", lines[2]);
    assert_eq!(prepared.bindings[0].source, ParameterSource::Positional(1));
}

#[test_case("select o from Order o where o.colour = 1" ; "unknown attribute")]
#[test_case("select o from Order o where x.total = 1" ; "unknown alias")]
#[test_case("select c from Customer c join fetch c.orders o join fetch o.customer" ; "cyclic fetch")]
#[test_case("select o from Order o where o.tags.label = 'x'" ; "collection dereference")]
fn test_semantic_errors_fail_the_build(query: &str) {
    let err = shop_engine().prepare(query).unwrap_err();
    assert!(matches!(err, PipelineError::Lowering(_)), "{:?}", err);
}

#[test]
fn test_cyclic_fetch_names_the_path() {
    let err = shop_engine()
        .prepare("select c from Customer c join fetch c.orders o join fetch o.customer")
        .unwrap_err();
    let PipelineError::Lowering(LoweringError::CyclicFetch { path }) = err else {
        panic!("expected a cyclic fetch error, got {:?}", err);
    };
    assert_eq!(path, "Customer.orders.customer");
}

#[test]
fn test_malformed_query_is_a_parse_error() {
    let err = shop_engine().prepare("select o form Order o").unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)), "{:?}", err);
}

#[test]
fn test_mutations_prepare_without_results() {
    let engine = shop_engine();
    let prepared = engine
        .prepare("update Order o set o.total = o.total * 2 where o.id = :id")
        .unwrap();
    assert!(matches!(prepared.kind, PreparedKind::Mutation));
    assert_eq!(prepared.sql, "UPDATE orders SET total = total * 2 WHERE id = ?");
    assert!(prepared.columns().is_empty());
}

#[tokio::test]
async fn test_insert_binds_text_and_inlines_numbers() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![Canned::Affected(2)]);
    let mut session = engine.session(&store);
    let affected = session
        .execute_update(
            "insert into Tag (id, label) values (1, 'a'), (2, :second)",
            &QueryParameters::new().with_named("second", "b"),
        )
        .await
        .unwrap();
    assert_eq!(affected, 2);
    let (sql, values) = &store.received()[0];
    assert_eq!(sql, "INSERT INTO tags (id, label) VALUES (1, ?), (2, ?)");
    assert_eq!(values, &vec![relgraph::Value::from("a"), relgraph::Value::from("b")]);
}

#[tokio::test]
async fn test_missing_parameter_is_reported_before_execution() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![Canned::Rows(vec![vec![int(1)]])]);
    let mut session = engine.session(&store);
    let err = session
        .list("select t from Tag t where t.id = :id", &QueryParameters::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains(":id"), "{}", err);
    assert!(store.received().is_empty());
}
