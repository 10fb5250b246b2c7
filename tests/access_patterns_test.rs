use dualstore::coordinator::{Coordinator, CoordinatorSettings};
use dualstore::graph::GraphTraversal;
use dualstore::model::{Entity, EntityKind, FieldValue};
use dualstore::system::DualStore;
use dualstore::tabular::{Row, TabularQueries};
use std::collections::BTreeSet;
use tempfile::TempDir;

const DAY: i64 = 86_400_000;
const BASE: i64 = 1_700_000_000_000;

fn user(key: &str, username: &str) -> Entity {
    Entity::new(EntityKind::User, key)
        .with_field("username", username)
        .with_field("email", format!("{}@example.com", username))
        .with_field("first_name", username)
        .with_field("last_name", "Tester")
        .with_field("registration_date", FieldValue::Timestamp(BASE - 100 * DAY))
        .with_field("is_active", true)
}

fn product(key: &str, name: &str, category: &str, created_day: i64) -> Entity {
    Entity::new(EntityKind::Product, key)
        .with_field("name", name)
        .with_field("price", 49.99)
        .with_field("category", category)
        .with_field("brand", "Acme")
        .with_field("sku", format!("ACM-{}", key))
        .with_field("stock_quantity", 100i64)
        .with_field("created_date", FieldValue::Timestamp(BASE + created_day * DAY))
        .with_field("is_active", true)
}

fn order(key: &str, user: &str, day: i64) -> Entity {
    Entity::new(EntityKind::Order, key)
        .with_field("user_id", user)
        .with_field("order_date", FieldValue::Timestamp(BASE + day * DAY))
        .with_field("status", "delivered")
        .with_field("total_amount", 120.0)
}

fn review(key: &str, user: &str, product: &str, rating: i64, day: i64) -> Entity {
    Entity::new(EntityKind::Review, key)
        .with_field("product_id", product)
        .with_field("user_id", user)
        .with_field("rating", rating)
        .with_field("title", "Review")
        .with_field("review_date", FieldValue::Timestamp(BASE + day * DAY))
        .with_field("is_verified_purchase", true)
}

fn catalog() -> Vec<Entity> {
    vec![
        user("u1", "alice"),
        user("u2", "bob"),
        user("u3", "carol"),
        product("p1", "Laptop", "Electronics", 1),
        product("p2", "Headphones", "Electronics", 2),
        product("p3", "Novel", "Books", 3),
        product("p4", "Desk Lamp", "Home", 4),
        order("o1", "u1", 1),
        order("o2", "u1", 3),
        order("o3", "u1", 2),
        order("o4", "u2", 1),
        review("r1", "u1", "p1", 5, 1),
        review("r2", "u2", "p1", 4, 2),
        review("r3", "u3", "p1", 2, 3),
        review("r4", "u2", "p2", 5, 1),
        review("r5", "u3", "p3", 5, 2),
        review("r6", "u2", "p3", 4, 3),
        review("r7", "u3", "p4", 4, 1),
    ]
}

async fn load(entities: Vec<Entity>) -> (TempDir, DualStore, Coordinator) {
    let dir = TempDir::new().unwrap();
    let stores = DualStore::open(dir.path(), false).unwrap();
    stores.setup_graph_schema().await.unwrap();
    let coordinator = stores.coordinator(CoordinatorSettings::default());
    for entity in entities {
        coordinator.write(entity).await.unwrap();
    }
    (dir, stores, coordinator)
}

fn keys(entities: &[Entity]) -> Vec<&str> {
    entities.iter().map(|e| e.key.as_str()).collect()
}

fn column<'a>(rows: &'a [Row], name: &str) -> Vec<&'a str> {
    rows.iter()
        .filter_map(|row| row.get(name).and_then(FieldValue::as_text))
        .collect()
}

#[tokio::test]
async fn test_user_orders_agree_newest_first() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);
    let queries = TabularQueries::new(&stores.tabular, &stores.binding);

    let from_graph = traversal.user_orders("u1", 10).unwrap();
    let from_table = queries.user_orders("u1", 10).unwrap();
    assert_eq!(keys(&from_graph), vec!["o2", "o3", "o1"]);
    assert_eq!(column(&from_table, "order_id"), vec!["o2", "o3", "o1"]);

    assert_eq!(keys(&traversal.user_orders("u1", 2).unwrap()), vec!["o2", "o3"]);
    assert_eq!(queries.user_orders("u1", 2).unwrap().len(), 2);

    assert!(traversal.user_orders("nobody", 10).unwrap().is_empty());
    assert!(queries.user_orders("nobody", 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_product_reviews_agree() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);
    let queries = TabularQueries::new(&stores.tabular, &stores.binding);

    let from_graph = traversal.product_reviews("p1", 10).unwrap();
    let from_table = queries.product_reviews("p1", 10).unwrap();
    assert_eq!(keys(&from_graph), vec!["r3", "r2", "r1"]);
    assert_eq!(column(&from_table, "review_id"), vec!["r3", "r2", "r1"]);
    assert_eq!(column(&from_table, "user_id"), vec!["u3", "u2", "u1"]);

    let reviewers: BTreeSet<String> = traversal
        .reviewers_of_product("p1")
        .unwrap()
        .into_iter()
        .map(|u| u.key.as_str().to_string())
        .collect();
    assert_eq!(reviewers, BTreeSet::from(["u1".into(), "u2".into(), "u3".into()]));

    let user_reviews = queries.user_reviews("u2", 10).unwrap();
    assert_eq!(column(&user_reviews, "review_id"), vec!["r6", "r2", "r4"]);
}

#[tokio::test]
async fn test_products_by_category_scan() {
    let (_dir, stores, _) = load(catalog()).await;
    let queries = TabularQueries::new(&stores.tabular, &stores.binding);

    let electronics = queries.products_by_category("Electronics", 10).unwrap();
    assert_eq!(column(&electronics, "product_id"), vec!["p2", "p1"]);
    assert_eq!(column(&electronics, "name"), vec!["Headphones", "Laptop"]);
    assert!(queries.products_by_category("Garden", 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_recommendations_rank_by_liking_co_reviewers() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    let recommended = traversal.recommendations("u1", 10).unwrap();
    assert_eq!(recommended.len(), 3);
    assert_eq!(recommended[0].0.key.as_str(), "p3");
    assert_eq!(recommended[0].1, 2);

    let rest: BTreeSet<&str> = recommended[1..].iter().map(|(p, _)| p.key.as_str()).collect();
    assert_eq!(rest, BTreeSet::from(["p2", "p4"]));
    assert!(recommended[1..].iter().all(|(_, score)| *score == 1));
    assert!(recommended.iter().all(|(p, _)| p.key.as_str() != "p1"));

    assert_eq!(traversal.recommendations("u1", 1).unwrap().len(), 1);
}

#[tokio::test]
async fn test_high_rated_in_category() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    let electronics = traversal.high_rated_in_category("Electronics", 5, 10).unwrap();
    let found: BTreeSet<&str> = electronics.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(found, BTreeSet::from(["p1", "p2"]));

    assert_eq!(keys(&traversal.high_rated_in_category("Books", 5, 10).unwrap()), vec!["p3"]);
    assert!(traversal.high_rated_in_category("Home", 5, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_co_review_network_counts_shared_products() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    let network = traversal.co_review_network("u2").unwrap();
    assert_eq!(network.len(), 2);
    assert_eq!(network[0].0.key.as_str(), "u3");
    assert_eq!(network[0].1, 2);
    assert_eq!(network[1].0.key.as_str(), "u1");
    assert_eq!(network[1].1, 1);
}

#[tokio::test]
async fn test_popularity_and_username_lookup() {
    let (_dir, stores, _) = load(catalog()).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    let popular = traversal.product_popularity(1).unwrap();
    assert_eq!(popular.len(), 1);
    assert_eq!(popular[0].0.key.as_str(), "p1");
    assert_eq!(popular[0].1, 3);

    let bob = traversal.find_user_by_username("bob").unwrap().unwrap();
    assert_eq!(bob.key.as_str(), "u2");
    assert!(traversal.find_user_by_username("mallory").unwrap().is_none());
}

#[tokio::test]
async fn test_edges_appear_regardless_of_write_order() {
    // Reviews and orders land before the users and products they reference
    let mut entities = catalog();
    entities.reverse();
    let (_dir, stores, _) = load(entities).await;
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    assert_eq!(keys(&traversal.user_orders("u1", 10).unwrap()), vec!["o2", "o3", "o1"]);
    assert_eq!(keys(&traversal.product_reviews("p1", 10).unwrap()), vec!["r3", "r2", "r1"]);
    assert_eq!(graph.edge_count(), 4 + 7 * 2);
}

#[tokio::test]
async fn test_updated_order_moves_between_partitions() {
    let (_dir, stores, coordinator) = load(catalog()).await;
    coordinator.write(order("o4", "u3", 5)).await.unwrap();

    let queries = TabularQueries::new(&stores.tabular, &stores.binding);
    assert!(queries.user_orders("u2", 10).unwrap().is_empty());
    assert_eq!(column(&queries.user_orders("u3", 10).unwrap(), "order_id"), vec!["o4"]);

    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);
    assert!(traversal.user_orders("u2", 10).unwrap().is_empty());
    assert_eq!(keys(&traversal.user_orders("u3", 10).unwrap()), vec!["o4"]);
}
