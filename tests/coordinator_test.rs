use async_trait::async_trait;
use dualstore::adapter::{AdapterResult, FaultPlan, FaultyAdapter, StoreAdapter, StoreSide};
use dualstore::coordinator::{Coordinator, CoordinatorSettings, RetryPolicy, WriteError};
use dualstore::intent::{IntentStatus, PriorState};
use dualstore::model::{Entity, EntityKey, EntityKind, EntityRef, FieldValue};
use dualstore::system::DualStore;
use dualstore::verifier::{Verifier, VerifierSettings};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    stores: DualStore,
    coordinator: Coordinator,
    tabular_faults: Arc<FaultPlan>,
}

fn fast_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(5),
        },
        ..CoordinatorSettings::default()
    }
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let stores = DualStore::open(dir.path(), false).unwrap();
    stores.setup_graph_schema().await.unwrap();

    let tabular = FaultyAdapter::new(stores.tabular_adapter());
    let tabular_faults = tabular.plan();
    let coordinator =
        stores.coordinator_with(stores.graph_adapter(), Arc::new(tabular), fast_settings());
    Harness {
        _dir: dir,
        stores,
        coordinator,
        tabular_faults,
    }
}

fn user(key: &str, username: &str) -> Entity {
    Entity::new(EntityKind::User, key)
        .with_field("username", username)
        .with_field("email", format!("{}@example.com", username))
        .with_field("first_name", "Alice")
        .with_field("last_name", "Smith")
        .with_field("registration_date", FieldValue::Timestamp(1_600_000_000_000))
        .with_field("is_active", true)
}

fn product(key: &str) -> Entity {
    Entity::new(EntityKind::Product, key)
        .with_field("name", "Laptop")
        .with_field("price", 999.99)
        .with_field("category", "Electronics")
        .with_field("brand", "Dell")
        .with_field("sku", "ABC-1234")
        .with_field("stock_quantity", 12i64)
        .with_field("created_date", FieldValue::Timestamp(1_650_000_000_000))
        .with_field("is_active", true)
}

fn review(key: &str, user: &str, product: &str, rating: i64) -> Entity {
    Entity::new(EntityKind::Review, key)
        .with_field("product_id", product)
        .with_field("user_id", user)
        .with_field("rating", rating)
        .with_field("title", "Great product!")
        .with_field("review_date", FieldValue::Timestamp(1_700_000_000_000))
        .with_field("is_verified_purchase", true)
}

#[tokio::test]
async fn test_committed_write_is_readable_from_both_stores() {
    let h = harness().await;
    let alice = user("u1", "alice");

    let result = h.coordinator.write(alice.clone()).await.unwrap();
    assert_eq!(result.status, IntentStatus::Committed);

    let key = EntityKey::new("u1");
    for side in [StoreSide::Graph, StoreSide::Tabular] {
        let stored = h.coordinator.adapter(side).get(EntityKind::User, &key).await.unwrap();
        assert_eq!(stored, Some(alice.clone()), "{} store", side);
    }
    assert_eq!(
        h.coordinator.read(EntityKind::User, &key).await.unwrap(),
        Some(alice)
    );
}

#[tokio::test]
async fn test_minimal_user_commits() {
    let h = harness().await;
    let alice = Entity::new(EntityKind::User, "u1").with_field("username", "alice");

    let result = h.coordinator.write(alice.clone()).await.unwrap();
    assert_eq!(result.status, IntentStatus::Committed);
    assert_eq!(
        h.coordinator.read(EntityKind::User, &alice.key).await.unwrap(),
        Some(alice)
    );
}

#[tokio::test]
async fn test_identical_rewrite_leaves_one_record() {
    let h = harness().await;
    let entities = [
        user("u1", "alice"),
        product("p1"),
        review("r1", "u1", "p1", 5),
    ];
    for entity in &entities {
        h.coordinator.write(entity.clone()).await.unwrap();
    }
    let (vertices, edges) = {
        let graph = h.stores.graph.read().await;
        (graph.vertex_count(), graph.edge_count())
    };
    assert_eq!((vertices, edges), (3, 2));

    for entity in &entities {
        h.coordinator.write(entity.clone()).await.unwrap();
    }
    let graph = h.stores.graph.read().await;
    assert_eq!(graph.vertex_count(), vertices);
    assert_eq!(graph.edge_count(), edges);

    for table in ["users", "products", "reviews", "reviews_by_product", "user_reviews"] {
        assert_eq!(h.stores.tabular.count_rows(table).unwrap(), 1, "{}", table);
    }

    let intents = h
        .stores
        .intents
        .intents_for(&EntityRef::new(EntityKind::Review, "r1"))
        .unwrap();
    assert_eq!(intents.len(), 2);
    assert!(intents.iter().all(|i| i.status == IntentStatus::Committed));
    assert_eq!(intents[1].prior, PriorState::Present(entities[2].clone()));
}

#[tokio::test]
async fn test_rejected_update_restores_prior_value() {
    let h = harness().await;
    let original = user("u2", "bob");
    h.coordinator.write(original.clone()).await.unwrap();

    h.tabular_faults.fail_puts_permanently();
    let renamed = original.clone().with_field("username", "robert");
    let err = h.coordinator.write(renamed).await.unwrap_err();
    assert_eq!(err.outcome(), Some(IntentStatus::RolledBack));

    let intent = h.coordinator.intent(err.intent_id().unwrap()).unwrap().unwrap();
    assert_eq!(intent.status, IntentStatus::RolledBack);
    assert!(intent.retain_until.is_some());

    h.tabular_faults.heal();
    assert_eq!(
        h.coordinator.read(EntityKind::User, &original.key).await.unwrap(),
        Some(original.clone())
    );
    assert_eq!(
        h.coordinator
            .adapter(StoreSide::Graph)
            .get(EntityKind::User, &original.key)
            .await
            .unwrap(),
        Some(original)
    );
}

#[tokio::test]
async fn test_unreachable_secondary_marks_divergent() {
    let h = harness().await;
    h.tabular_faults.go_offline();

    let err = h.coordinator.write(user("u3", "carol")).await.unwrap_err();
    match &err {
        WriteError::Divergent { reason, .. } => assert!(reason.contains("unreachable")),
        other => panic!("expected divergence, got {:?}", other),
    }
    let intent = h.coordinator.intent(err.intent_id().unwrap()).unwrap().unwrap();
    assert_eq!(intent.status, IntentStatus::Divergent);
    assert_eq!(intent.attempt_count, 4);
    assert!(intent.retain_until.is_none());
}

#[tokio::test]
async fn test_distinct_keys_write_concurrently() {
    let h = harness().await;
    let mut handles = Vec::new();
    for i in 0..20 {
        let coordinator = h.coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .write(user(&format!("u{}", i), &format!("user{:03}", i)))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, IntentStatus::Committed);
    }
    assert_eq!(h.stores.tabular.count_rows("users").unwrap(), 20);
    assert_eq!(h.stores.graph.read().await.vertex_count(), 20);
}

#[tokio::test]
async fn test_same_key_writes_serialize() {
    let h = harness().await;
    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = h.coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .write(user("shared", &format!("name{:03}", i)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entity = EntityRef::new(EntityKind::User, "shared");
    let intents = h.stores.intents.intents_for(&entity).unwrap();
    assert_eq!(intents.len(), 8);
    assert!(intents.iter().all(|i| i.status == IntentStatus::Committed));

    // Each write saw the previous one's committed value
    for pair in intents.windows(2) {
        assert_eq!(pair[1].prior, PriorState::Present(pair[0].payload.clone()));
    }

    let last = &intents[7].payload;
    for side in [StoreSide::Graph, StoreSide::Tabular] {
        let stored = h
            .coordinator
            .adapter(side)
            .get(EntityKind::User, &entity.key)
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), Some(last));
    }
}

/// Delays every put, so a short deadline expires mid-write
struct SlowAdapter {
    inner: Arc<dyn StoreAdapter>,
    delay: Duration,
}

#[async_trait]
impl StoreAdapter for SlowAdapter {
    fn side(&self) -> StoreSide {
        self.inner.side()
    }

    async fn put(&self, entity: &Entity) -> AdapterResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(entity).await
    }

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<Option<Entity>> {
        self.inner.get(kind, key).await
    }

    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> AdapterResult<()> {
        self.inner.delete(kind, key).await
    }
}

#[tokio::test]
async fn test_timeout_leaves_intent_in_flight() {
    let dir = TempDir::new().unwrap();
    let stores = DualStore::open(dir.path(), false).unwrap();
    stores.setup_graph_schema().await.unwrap();
    let slow_tabular = SlowAdapter {
        inner: stores.tabular_adapter(),
        delay: Duration::from_millis(300),
    };
    let coordinator =
        stores.coordinator_with(stores.graph_adapter(), Arc::new(slow_tabular), fast_settings());

    let err = coordinator
        .write_with_timeout(user("u9", "dave"), Duration::from_millis(50))
        .await
        .unwrap_err();
    match err {
        WriteError::TimedOut { intent_id, status } => {
            assert_eq!(status, Some(IntentStatus::Partial));
            let intent = coordinator.intent(&intent_id).unwrap().unwrap();
            assert_eq!(intent.status, IntentStatus::Partial);
            assert_eq!(coordinator.recover().unwrap(), 1);

            // The stalled intent is finished by the verifier
            let verifier = Verifier::new(coordinator.clone(), VerifierSettings::default());
            let report = verifier.scan_with_grace(Duration::ZERO).await.unwrap();
            assert_eq!(report.repaired, 1);
            let intent = coordinator.intent(&intent_id).unwrap().unwrap();
            assert_eq!(intent.status, IntentStatus::Committed);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(coordinator.recover().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_payload_never_commits() {
    let h = harness().await;
    let bad = user("u4", "erin").with_field("is_active", "yes");

    let err = h.coordinator.write(bad).await.unwrap_err();
    assert_eq!(err.outcome(), Some(IntentStatus::Divergent));
    assert_eq!(h.stores.tabular.count_rows("users").unwrap(), 0);
    assert_eq!(h.stores.graph.read().await.vertex_count(), 0);
}
