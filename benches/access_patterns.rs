use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dualstore::coordinator::CoordinatorSettings;
use dualstore::graph::GraphTraversal;
use dualstore::model::{Entity, Record};
use dualstore::tabular::TabularQueries;
use dualstore::{DataGenerator, Dataset, DualStore};
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn loaded(rt: &Runtime, users: usize) -> (TempDir, DualStore, Dataset) {
    let dir = TempDir::new().unwrap();
    let stores = DualStore::open(dir.path(), false).unwrap();
    let dataset = DataGenerator::seeded(7).generate_dataset(users, users * 2, 5, 5);
    rt.block_on(async {
        stores.setup_graph_schema().await.unwrap();
        let coordinator = stores.coordinator(CoordinatorSettings::default());
        for entity in dataset.entities().unwrap() {
            coordinator.write(entity).await.unwrap();
        }
    });
    (dir, stores, dataset)
}

/// Graph traversal vs partition scan for a user's orders
fn bench_user_orders(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("user_orders");

    for size in [50, 200].iter() {
        let (_dir, stores, dataset) = loaded(&rt, *size);
        let user = dataset.users[0].user_id.as_str().to_string();
        let graph = rt.block_on(stores.graph.read());
        let traversal = GraphTraversal::new(&graph, &stores.binding);
        let queries = TabularQueries::new(&stores.tabular, &stores.binding);

        group.bench_with_input(BenchmarkId::new("graph", size), size, |b, _| {
            b.iter(|| criterion::black_box(traversal.user_orders(&user, 10).unwrap().len()));
        });
        group.bench_with_input(BenchmarkId::new("tabular", size), size, |b, _| {
            b.iter(|| criterion::black_box(queries.user_orders(&user, 10).unwrap().len()));
        });
    }
    group.finish();
}

/// Graph traversal vs partition scan for a product's reviews
fn bench_product_reviews(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("product_reviews");

    for size in [50, 200].iter() {
        let (_dir, stores, dataset) = loaded(&rt, *size);
        let product = dataset.products[0].product_id.as_str().to_string();
        let graph = rt.block_on(stores.graph.read());
        let traversal = GraphTraversal::new(&graph, &stores.binding);
        let queries = TabularQueries::new(&stores.tabular, &stores.binding);

        group.bench_with_input(BenchmarkId::new("graph", size), size, |b, _| {
            b.iter(|| criterion::black_box(traversal.product_reviews(&product, 10).unwrap().len()));
        });
        group.bench_with_input(BenchmarkId::new("tabular", size), size, |b, _| {
            b.iter(|| criterion::black_box(queries.product_reviews(&product, 10).unwrap().len()));
        });
    }
    group.finish();
}

/// Multi-hop recommendation query (graph only)
fn bench_recommendations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_dir, stores, dataset) = loaded(&rt, 200);
    let user = dataset.users[0].user_id.as_str().to_string();
    let graph = rt.block_on(stores.graph.read());
    let traversal = GraphTraversal::new(&graph, &stores.binding);

    c.bench_function("recommendations", |b| {
        b.iter(|| criterion::black_box(traversal.recommendations(&user, 5).unwrap().len()));
    });
}

/// End-to-end coordinated write latency
fn bench_coordinated_write(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let stores = DualStore::open(dir.path(), false).unwrap();
    rt.block_on(stores.setup_graph_schema()).unwrap();
    let coordinator = stores.coordinator(CoordinatorSettings::default());
    let users: Vec<Entity> = DataGenerator::seeded(11)
        .generate_users(64)
        .iter()
        .map(|u| u.to_entity().unwrap())
        .collect();

    let mut next = 0;
    c.bench_function("coordinated_write", |b| {
        b.iter(|| {
            let entity = users[next % users.len()].clone();
            next += 1;
            rt.block_on(coordinator.write(entity)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_user_orders,
    bench_product_reviews,
    bench_recommendations,
    bench_coordinated_write
);
criterion_main!(benches);
