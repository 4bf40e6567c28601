//! Malformed and edge-case object queries.
//!
//! Every malformed query must come back as an error value with a usable
//! offset, never a panic.

use relgraph::query_model::ObjectStatement;
use relgraph::query_parser::parse_statement;
use test_case::test_case;

#[test]
fn test_malformed_queries_return_errors() {
    let malformed = [
        "",
        "select",
        "from",
        "select o from",
        "select o from Order",
        "select o from Order o where",
        "select o from Order o where o.total = ",
        "select o from Order o where (o.total = 1",
        "select o from Order o join",
        "select o from Order o order by",
        "select o from Order o garbage garbage",
        "update Order o set",
        "delete Order o",
    ];

    for query in malformed {
        let result = parse_statement(query);
        assert!(result.is_err(), "expected an error for {:?}", query);
        let err = result.unwrap_err();
        assert!(err.offset <= query.len(), "offset past end for {:?}", query);
    }
}

#[test]
fn test_error_message_names_position() {
    let err = parse_statement("FROM Order o garbage here").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("offset"));
    assert!(rendered.contains("garbage"));
}

#[test_case("select o from Order o" ; "lower case keywords")]
#[test_case("SELECT o FROM Order o" ; "upper case keywords")]
#[test_case("  from Order o  " ; "implicit selection with padding")]
#[test_case("select distinct c from Customer c" ; "distinct")]
#[test_case("select o from Order o left outer join fetch o.lineItems li" ; "left outer fetch join")]
#[test_case("select o from Order o where o.total between :low and :high" ; "between named parameters")]
#[test_case("select o from Order o where o.id in (1, 2, ?1)" ; "in list")]
#[test_case("select c from Customer c where c.name like 'A%' and not c.address.city is null" ; "like and not")]
#[test_case("select count(*) from Order o group by o.customer having count(*) > 1" ; "grouping")]
#[test_case("select o from Order o order by o.placedAt desc, o.id limit 5 offset 10" ; "ordering and paging")]
fn test_valid_select_queries(query: &str) {
    let statement = parse_statement(query).unwrap();
    assert!(matches!(statement, ObjectStatement::Select(_)));
}

#[test]
fn test_mutations_are_not_selects() {
    for query in [
        "update Order o set o.total = 0 where o.id = 1",
        "delete from Order o where o.id = :id",
        "insert into Tag (id, label) values (1, 'x')",
    ] {
        let statement = parse_statement(query).unwrap();
        assert!(!statement.is_select(), "{} parsed as a select", query);
    }
}

#[test]
fn test_deeply_nested_parentheses_do_not_overflow() {
    let depth = 16;
    let query = format!(
        "select o from Order o where {}o.id = 1{}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    assert!(parse_statement(&query).is_ok());
}
