use anyhow::{Context, Result};
use dualstore::adapter::FaultyAdapter;
use dualstore::graph::GraphTraversal;
use dualstore::model::{Entity, EntityKind, Record, User};
use dualstore::tabular::TabularQueries;
use dualstore::{AppConfig, Coordinator, DataGenerator, Dataset, DualStore, Verifier, WriteError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .init();

    println!("Dualstore v{}", dualstore::version());
    println!("==========================================");
    println!();

    // Demo 1: Setup
    println!("=== Demo 1: Store Setup ===");
    let stores = DualStore::open_with(&config)?;
    let declared = stores.setup_graph_schema().await?;
    println!("✓ Graph schema ready ({} new declarations)", declared);
    println!("✓ Tables: {}", stores.tabular.table_names().join(", "));

    let coordinator = stores.coordinator(config.coordinator_settings());
    let unresolved = coordinator.recover()?;
    if unresolved > 0 {
        println!("! {} intents from a previous run await the verifier", unresolved);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let verifier =
        Verifier::new(coordinator.clone(), config.verifier_settings()).spawn(shutdown_rx);

    // Demo 2: Generate and load
    println!("\n=== Demo 2: Generate and Load ===");
    let generator_config = &config.generator;
    let mut generator = match generator_config.seed {
        Some(seed) => DataGenerator::seeded(seed),
        None => DataGenerator::new(),
    };
    let dataset = generator.generate_dataset(
        generator_config.num_users,
        generator_config.num_products,
        generator_config.max_orders_per_user,
        generator_config.max_reviews_per_product,
    );
    println!(
        "✓ Generated {} users, {} products, {} orders, {} reviews",
        dataset.users.len(),
        dataset.products.len(),
        dataset.orders.len(),
        dataset.reviews.len()
    );
    let entities = dataset.entities()?;
    let started = Instant::now();
    let (committed, failed) = load(&coordinator, entities, generator_config.batch_size).await;
    println!(
        "✓ Loaded {} entities through the coordinator in {:?} ({} failed)",
        committed,
        started.elapsed(),
        failed
    );

    // Demo 3: Access patterns
    println!("\n=== Demo 3: Access Patterns ===");
    compare_access_patterns(&stores, &dataset).await?;

    // Demo 4: Failure modes
    println!("\n=== Demo 4: Failure Modes ===");
    failure_modes(&stores, &config, &dataset).await?;

    shutdown_tx.send(true).ok();
    verifier.await.context("verifier task")?;
    stores.flush()?;
    println!("\nDone.");
    Ok(())
}

/// Write `entities` in batches of concurrent coordinator writes
async fn load(coordinator: &Coordinator, entities: Vec<Entity>, batch_size: usize) -> (usize, usize) {
    let mut committed = 0;
    let mut failed = 0;
    let mut entities = entities.into_iter().peekable();

    while entities.peek().is_some() {
        let mut batch = JoinSet::new();
        for entity in entities.by_ref().take(batch_size) {
            let coordinator = coordinator.clone();
            batch.spawn(async move { coordinator.write(entity).await });
        }
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Ok(_)) => committed += 1,
                Ok(Err(e)) => {
                    warn!("Write failed: {}", e);
                    failed += 1;
                }
                Err(e) => {
                    warn!("Write task failed: {}", e);
                    failed += 1;
                }
            }
        }
    }
    (committed, failed)
}

async fn compare_access_patterns(stores: &DualStore, dataset: &Dataset) -> Result<()> {
    let Some(user) = busiest_user(dataset) else {
        println!("No users generated; skipping");
        return Ok(());
    };
    let user_key = user.user_id.as_str();
    let graph = stores.graph.read().await;
    let traversal = GraphTraversal::new(&graph, &stores.binding);
    let queries = TabularQueries::new(&stores.tabular, &stores.binding);

    let started = Instant::now();
    let graph_orders = traversal.user_orders(user_key, 10)?;
    let graph_elapsed = started.elapsed();
    let started = Instant::now();
    let table_orders = queries.user_orders(user_key, 10)?;
    let table_elapsed = started.elapsed();
    println!("User orders for {} ({})", user.username, user_key);
    println!("  graph traversal: {} orders in {:?}", graph_orders.len(), graph_elapsed);
    println!("  partition scan:  {} orders in {:?}", table_orders.len(), table_elapsed);

    if let Some(product) = dataset.products.first() {
        let product_key = product.product_id.as_str();
        let started = Instant::now();
        let graph_reviews = traversal.product_reviews(product_key, 10)?;
        let graph_elapsed = started.elapsed();
        let started = Instant::now();
        let table_reviews = queries.product_reviews(product_key, 10)?;
        let table_elapsed = started.elapsed();
        println!("Reviews of {} ({})", product.name, product_key);
        println!("  graph traversal: {} reviews in {:?}", graph_reviews.len(), graph_elapsed);
        println!("  partition scan:  {} reviews in {:?}", table_reviews.len(), table_elapsed);

        let started = Instant::now();
        let by_category = queries.products_by_category(&product.category, 10)?;
        println!(
            "Products in {}: {} via partition scan in {:?}",
            product.category,
            by_category.len(),
            started.elapsed()
        );
    }

    let started = Instant::now();
    let recommendations = traversal.recommendations(user_key, 5)?;
    println!(
        "Recommendations for {}: {} products in {:?} (graph only)",
        user.username,
        recommendations.len(),
        started.elapsed()
    );
    for (product, score) in &recommendations {
        let name = product.get("name").map(|v| v.to_string()).unwrap_or_default();
        println!("  {} (liked by {} co-reviewers)", name, score);
    }

    let network = traversal.co_review_network(user_key)?;
    println!("Co-review network of {}: {} users", user.username, network.len());

    let popular = traversal.product_popularity(3)?;
    for (product, reviews) in popular {
        let name = product.get("name").map(|v| v.to_string()).unwrap_or_default();
        println!("  popular: {} ({} reviews)", name, reviews);
    }
    Ok(())
}

fn busiest_user(dataset: &Dataset) -> Option<&User> {
    dataset.users.iter().max_by_key(|user| {
        dataset
            .orders
            .iter()
            .filter(|order| order.user_id == user.user_id)
            .count()
    })
}

async fn failure_modes(stores: &DualStore, config: &AppConfig, dataset: &Dataset) -> Result<()> {
    let graph = FaultyAdapter::new(stores.graph_adapter());
    let tabular = FaultyAdapter::new(stores.tabular_adapter());
    let tabular_faults = tabular.plan();
    let mut settings = config.coordinator_settings();
    settings.write_timeout = Duration::from_secs(30);
    let coordinator = stores.coordinator_with(Arc::new(graph), Arc::new(tabular), settings);

    let mut generator = DataGenerator::new();
    let mut fresh_user = || -> Result<Entity> {
        let user = generator
            .generate_users(1)
            .pop()
            .context("generator produced no user")?;
        Ok(user.to_entity()?)
    };

    // Secondary rejects the write: the primary is restored
    tabular_faults.fail_puts_permanently();
    match coordinator.write(fresh_user()?).await {
        Err(e @ WriteError::RolledBack { .. }) => println!("✓ Rejected write rolled back: {}", e),
        other => println!("✗ Expected a rollback, got {:?}", other),
    }
    tabular_faults.heal();

    // Secondary unreachable: divergence, then verifier convergence
    tabular_faults.go_offline();
    let entity = fresh_user()?;
    let divergent = match coordinator.write(entity.clone()).await {
        Err(e @ WriteError::Divergent { .. }) => {
            println!("✓ Unreachable store left the write divergent: {}", e);
            true
        }
        other => {
            println!("✗ Expected divergence, got {:?}", other);
            false
        }
    };
    tabular_faults.heal();

    if divergent {
        let verifier = Verifier::new(coordinator.clone(), config.verifier_settings());
        let report = verifier.scan_with_grace(Duration::ZERO).await?;
        info!(%report, "Verifier pass after heal");
        println!("✓ Verifier pass: {}", report);
        let read = coordinator.read(EntityKind::User, &entity.key).await?;
        println!(
            "✓ Entity readable from the tabular store after repair: {}",
            read.as_ref() == Some(&entity)
        );
    }

    if let Some(user) = dataset.users.first() {
        let again = coordinator.write(user.to_entity()?).await?;
        println!("✓ Re-writing an identical payload commits again ({})", again.intent_id);
    }
    Ok(())
}
