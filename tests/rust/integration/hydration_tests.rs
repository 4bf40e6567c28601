use relgraph::executor::QueryParameters;
use relgraph::identity::InstanceState;
use relgraph::initializer::ResultValue;
use relgraph::{PipelineError, Value};

use super::support::{int, shop_engine, text, Canned, MemoryStore};

fn order_with_customer(order: i64, total: f64, customer: i64, name: &str) -> Vec<Value> {
    // orders: id, version, total, placed_at; customers: cust_id, full_name, street, city
    vec![
        int(order),
        int(1),
        Value::Float(total),
        Value::Null,
        int(customer),
        text(name),
        text("Main St"),
        text("Oslo"),
    ]
}

#[tokio::test]
async fn test_orders_sharing_a_customer_share_one_instance() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![Canned::Rows(vec![
        order_with_customer(1, 10.0, 9, "Ann"),
        order_with_customer(2, 20.0, 9, "Ann"),
    ])]);
    let mut session = engine.session(&store);

    let results = session
        .list(
            "select o from Order o join fetch o.customer c order by o.id",
            &QueryParameters::new(),
        )
        .await
        .unwrap();

    let orders = results.entities(0);
    assert_eq!(orders.len(), 2);
    let first = session.entity(orders[0]).unwrap();
    let second = session.entity(orders[1]).unwrap();
    assert_ne!(first.key(), second.key());
    let customer = first.entity_reference("customer").unwrap();
    assert_eq!(second.entity_reference("customer"), Some(customer));
    assert_eq!(session.find("Customer", 9), Some(customer));
    assert_eq!(session.registry().entity_count(), 3);

    let (sql, values) = &store.received()[0];
    assert_eq!(
        sql,
        "SELECT orders_1.id, orders_1.version, orders_1.total, orders_1.placed_at, \
         customers_1.cust_id, customers_1.full_name, customers_1.street, customers_1.city \
         FROM orders AS orders_1 \
         INNER JOIN customers AS customers_1 ON orders_1.customer_id = customers_1.cust_id \
         ORDER BY orders_1.id ASC"
    );
    assert!(values.is_empty());
}

#[tokio::test]
async fn test_self_referencing_fetch_terminates() {
    let engine = shop_engine();
    // e: id, name; m: id, name, manager_id
    let store = MemoryStore::new(vec![Canned::Rows(vec![
        vec![int(1), text("Ada"), int(2), text("Bob"), int(1)],
        vec![int(2), text("Bob"), int(1), text("Ada"), int(2)],
    ])]);
    let mut session = engine.session(&store);

    let results = session
        .list(
            "select e from Employee e left join fetch e.manager m",
            &QueryParameters::new(),
        )
        .await
        .unwrap();

    let employees = results.entities(0);
    let ada = employees[0];
    let bob = employees[1];
    assert_eq!(session.entity(ada).unwrap().entity_reference("manager"), Some(bob));
    assert_eq!(session.entity(bob).unwrap().entity_reference("manager"), Some(ada));
    assert_eq!(session.registry().entity_count(), 2);

    let json = results.to_json(session.registry());
    assert_eq!(json[0]["e"]["name"], "Ada");
    assert_eq!(json[0]["e"]["manager"]["name"], "Bob");
    assert_eq!(json[0]["e"]["manager"]["manager"]["$ref"], "Employee#1");
    assert_eq!(json[0]["e"]["reports"]["$uninitialized"], true);
}

#[tokio::test]
async fn test_proxy_is_hydrated_by_a_later_query() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![
        // orders: id, version, total, placed_at, customer_id
        Canned::Rows(vec![vec![int(1), int(0), Value::Float(3.5), Value::Null, int(9)]]),
        // customers: cust_id, full_name, street, city
        Canned::Rows(vec![vec![int(9), text("Ann"), Value::Null, text("Oslo")]]),
    ]);
    let mut session = engine.session(&store);

    let orders = session
        .list("select o from Order o", &QueryParameters::new())
        .await
        .unwrap();
    let order = orders.entities(0)[0];
    let proxy = session.entity(order).unwrap().entity_reference("customer").unwrap();
    assert_eq!(session.entity(proxy).unwrap().state(), InstanceState::Uninitialized);

    let json = orders.to_json(session.registry());
    assert_eq!(json[0]["o"]["customer"]["$uninitialized"], true);
    assert_eq!(json[0]["o"]["customer"]["$id"], 9);

    let customers = session
        .list("select c from Customer c", &QueryParameters::new())
        .await
        .unwrap();
    assert_eq!(customers.entities(0), vec![proxy]);
    let customer = session.entity(proxy).unwrap();
    assert!(customer.is_initialized());
    assert_eq!(customer.basic("name"), Some(&text("Ann")));
}

#[tokio::test]
async fn test_collection_fetch_returns_each_root_once() {
    let engine = shop_engine();
    // orders: id, version, total, placed_at, customer_id; tags: id, label
    let row = |tag: i64, label: &str| {
        vec![int(1), int(0), Value::Float(1.0), Value::Null, Value::Null, int(tag), text(label)]
    };
    let store = MemoryStore::new(vec![
        Canned::Rows(vec![vec![int(5), text("rush")]]),
        Canned::Rows(vec![row(5, "rush"), row(6, "gift")]),
    ]);
    let mut session = engine.session(&store);

    let tags = session
        .list("select t from Tag t", &QueryParameters::new())
        .await
        .unwrap();
    let rush = tags.entities(0)[0];

    let orders = session
        .list("select o from Order o join fetch o.tags t", &QueryParameters::new())
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    let order = session.entity(orders.entities(0)[0]).unwrap();
    let collection = session
        .registry()
        .collection(order.collection_handle("tags").unwrap())
        .unwrap();
    assert!(collection.is_initialized());
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.elements()[0], rush);

    let json = orders.to_json(session.registry());
    assert_eq!(json[0]["o"]["tags"][1]["label"], "gift");
    assert_eq!(json[0]["o"]["lineItems"]["$uninitialized"], true);
}

#[tokio::test]
async fn test_scalar_and_entity_columns_together() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![Canned::Rows(vec![
        vec![int(1), text("Ada"), int(3)],
        vec![int(2), text("Bob"), int(0)],
    ])]);
    let mut session = engine.session(&store);

    let results = session
        .list(
            "select e, e.id as ident from Employee e where e.name like :prefix",
            &QueryParameters::new().with_named("prefix", "A%"),
        )
        .await
        .unwrap();

    assert_eq!(results.columns, vec!["e".to_string(), "ident".to_string()]);
    assert_eq!(results.rows[1][1], ResultValue::Scalar(int(2)));
    let (_, values) = &store.received()[0];
    assert_eq!(values, &vec![text("A%")]);
}

#[tokio::test]
async fn test_failed_execution_is_rolled_back() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![Canned::Fail("connection reset by peer")]);
    let mut session = engine.session(&store);

    let err = session
        .list(
            "select o from Order o where o.total > :min",
            &QueryParameters::new().with_named("min", 5),
        )
        .await
        .unwrap_err();

    let PipelineError::Execution(err) = err else {
        panic!("expected an execution error, got {:?}", err);
    };
    let message = err.to_string();
    assert!(message.contains("WHERE orders_1.total > ?"), "{}", message);
    assert!(message.contains("connection reset by peer"), "{}", message);
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn test_clear_ends_identity_scope() {
    let engine = shop_engine();
    let store = MemoryStore::new(vec![
        Canned::Rows(vec![vec![int(5), text("rush")]]),
        Canned::Rows(vec![vec![int(5), text("rush")]]),
    ]);
    let mut session = engine.session(&store);

    session
        .list("select t from Tag t", &QueryParameters::new())
        .await
        .unwrap();
    assert_eq!(session.registry().entity_count(), 1);
    session.clear();
    assert!(session.registry().is_empty());
    assert_eq!(session.find("Tag", 5), None);

    session
        .list("select t from Tag t", &QueryParameters::new())
        .await
        .unwrap();
    assert!(session.find("Tag", 5).is_some());
    session.close();
}
