//! Dualstore CLI: command-line interface for the dual-store coordinator
//!
//! Opens the stores under the configured data directory directly; there is
//! no server process.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use dualstore::graph::GraphTraversal;
use dualstore::model::{Entity, EntityKey, EntityKind, FieldMap, FieldValue};
use dualstore::tabular::TabularQueries;
use dualstore::{
    AppConfig, Coordinator, DataGenerator, DualStore, IntentStatus, StoreSide, Verifier,
    WriteIntent,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "dualstore-cli", version, about = "Dual-store write coordinator CLI")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "DUALSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the graph schema and tables
    Setup,
    /// Generate synthetic data and write it through the coordinator
    Load {
        /// Users to generate (defaults to the configured size)
        #[arg(long)]
        users: Option<usize>,

        /// Products to generate (defaults to the configured size)
        #[arg(long)]
        products: Option<usize>,

        /// Seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Read one entity (tabular first, graph fallback)
    Read {
        /// user, product, order or review
        kind: EntityKind,
        key: String,

        /// Read from one store only
        #[arg(long)]
        store: Option<StoreSide>,
    },
    /// Run one verifier pass
    Verify {
        /// Only look at intents idle for at least this long
        #[arg(long, default_value_t = 0)]
        grace_ms: u64,
    },
    /// List write intents
    Intents {
        /// Only intents in this status
        #[arg(long)]
        status: Option<IntentStatus>,
    },
    /// A user's orders, newest first
    Orders {
        user_id: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Answer from the graph instead of the user_orders table
        #[arg(long)]
        graph: bool,
    },
    /// Products liked by users who reviewed the same products
    Recommend {
        user_id: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .with_writer(std::io::stderr)
        .init();

    let stores = DualStore::open_with(&config)?;
    let format = cli.format;

    match cli.command {
        Commands::Setup => run_setup(&stores, format).await,
        Commands::Load {
            users,
            products,
            seed,
        } => run_load(&stores, &config, users, products, seed, format).await,
        Commands::Read { kind, key, store } => {
            let coordinator = stores.coordinator(config.coordinator_settings());
            run_read(&coordinator, kind, key, store, format).await
        }
        Commands::Verify { grace_ms } => {
            let coordinator = stores.coordinator(config.coordinator_settings());
            let verifier = Verifier::new(coordinator, config.verifier_settings());
            let report = verifier
                .scan_with_grace(Duration::from_millis(grace_ms))
                .await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => println!("{}", report),
            }
            Ok(())
        }
        Commands::Intents { status } => {
            let intents = match status {
                Some(status) => stores.intents.list_by_status(status)?,
                None => stores.intents.list()?,
            };
            print_intents(&intents, format)
        }
        Commands::Orders {
            user_id,
            limit,
            graph,
        } => run_orders(&stores, &user_id, limit, graph, format).await,
        Commands::Recommend { user_id, limit } => {
            let store = stores.graph.read().await;
            let traversal = GraphTraversal::new(&store, &stores.binding);
            let recommendations = traversal.recommendations(&user_id, limit)?;
            match format {
                OutputFormat::Json => {
                    let values: Vec<Value> = recommendations
                        .iter()
                        .map(|(product, score)| json!({"product": entity_json(product), "score": score}))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&values)?);
                }
                OutputFormat::Table => {
                    let mut table = Table::new();
                    table.set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["product_id", "name", "category", "score"]);
                    for (product, score) in &recommendations {
                        table.add_row(vec![
                            product.key.to_string(),
                            field_text(&product.fields, "name"),
                            field_text(&product.fields, "category"),
                            score.to_string(),
                        ]);
                    }
                    println!("{}", table);
                    println!("{} recommendation(s)", recommendations.len());
                }
            }
            Ok(())
        }
    }
}

async fn run_setup(stores: &DualStore, format: OutputFormat) -> Result<()> {
    let declared = stores.setup_graph_schema().await?;
    stores.flush()?;
    let tables = stores.tabular.table_names();
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "graph_declarations": declared,
                    "tables": tables,
                }))?
            );
        }
        OutputFormat::Table => {
            println!("Graph schema: {} new declarations", declared);
            println!("Tables:       {}", tables.join(", "));
        }
    }
    Ok(())
}

async fn run_load(
    stores: &DualStore,
    config: &AppConfig,
    users: Option<usize>,
    products: Option<usize>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    stores.setup_graph_schema().await?;
    let coordinator = stores.coordinator(config.coordinator_settings());
    let sizes = &config.generator;

    let mut generator = match seed.or(sizes.seed) {
        Some(seed) => DataGenerator::seeded(seed),
        None => DataGenerator::new(),
    };
    let dataset = generator.generate_dataset(
        users.unwrap_or(sizes.num_users),
        products.unwrap_or(sizes.num_products),
        sizes.max_orders_per_user,
        sizes.max_reviews_per_product,
    );

    let mut committed = 0usize;
    let mut failures = Vec::new();
    let entities = dataset.entities()?;
    for chunk in entities.chunks(sizes.batch_size) {
        let mut batch = JoinSet::new();
        for entity in chunk.iter().cloned() {
            let coordinator: Coordinator = coordinator.clone();
            batch.spawn(async move { coordinator.write(entity).await });
        }
        while let Some(joined) = batch.join_next().await {
            match joined? {
                Ok(_) => committed += 1,
                Err(e) => failures.push(e.to_string()),
            }
        }
    }
    stores.flush()?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "users": dataset.users.len(),
                    "products": dataset.products.len(),
                    "orders": dataset.orders.len(),
                    "reviews": dataset.reviews.len(),
                    "committed": committed,
                    "failed": failures,
                }))?
            );
        }
        OutputFormat::Table => {
            println!(
                "Generated {} users, {} products, {} orders, {} reviews",
                dataset.users.len(),
                dataset.products.len(),
                dataset.orders.len(),
                dataset.reviews.len()
            );
            println!("Committed {} of {} writes", committed, entities.len());
            for failure in &failures {
                println!("  failed: {}", failure);
            }
        }
    }
    Ok(())
}

async fn run_read(
    coordinator: &Coordinator,
    kind: EntityKind,
    key: String,
    store: Option<StoreSide>,
    format: OutputFormat,
) -> Result<()> {
    let key = EntityKey::new(key);
    let entity = match store {
        Some(side) => coordinator.adapter(side).get(kind, &key).await?,
        None => coordinator.read(kind, &key).await?,
    };
    let Some(entity) = entity else {
        println!("(not found)");
        return Ok(());
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entity_json(&entity))?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["field", "value"]);
            table.add_row(vec!["kind".to_string(), entity.kind.to_string()]);
            table.add_row(vec!["key".to_string(), entity.key.to_string()]);
            for (name, value) in &entity.fields {
                table.add_row(vec![name.clone(), value.to_string()]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

async fn run_orders(
    stores: &DualStore,
    user_id: &str,
    limit: usize,
    from_graph: bool,
    format: OutputFormat,
) -> Result<()> {
    let rows: Vec<FieldMap> = if from_graph {
        let store = stores.graph.read().await;
        GraphTraversal::new(&store, &stores.binding)
            .user_orders(user_id, limit)?
            .into_iter()
            .map(|order| {
                let mut fields = order.fields;
                fields.insert("order_id".into(), FieldValue::Text(order.key.to_string()));
                fields
            })
            .collect()
    } else {
        TabularQueries::new(&stores.tabular, &stores.binding).user_orders(user_id, limit)?
    };
    print_rows(&rows, &["order_id", "order_date", "status", "total_amount"], format)
}

fn print_rows(rows: &[FieldMap], columns: &[&str], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let values: Vec<Value> = rows.iter().map(fields_json).collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("(no results)");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(columns.to_vec());
            for row in rows {
                table.add_row(columns.iter().map(|c| field_text(row, c)).collect::<Vec<_>>());
            }
            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }
    Ok(())
}

fn print_intents(intents: &[WriteIntent], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let values: Vec<Value> = intents
                .iter()
                .map(|i| {
                    json!({
                        "intent_id": i.id.as_str(),
                        "entity": i.entity_ref().to_string(),
                        "status": i.status.as_str(),
                        "attempts": i.attempt_count,
                        "created_at": i.created_at,
                        "last_attempt_at": i.last_attempt_at,
                        "retain_until": i.retain_until,
                        "last_error": i.last_error,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        OutputFormat::Table => {
            if intents.is_empty() {
                println!("(no intents)");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["intent", "entity", "status", "attempts", "last_error"]);
            for intent in intents {
                table.add_row(vec![
                    intent.id.to_string(),
                    intent.entity_ref().to_string(),
                    intent.status.to_string(),
                    intent.attempt_count.to_string(),
                    intent.last_error.clone().unwrap_or_default(),
                ]);
            }
            println!("{}", table);
            println!("{} intent(s)", intents.len());
        }
    }
    Ok(())
}

fn field_text(fields: &FieldMap, name: &str) -> String {
    fields.get(name).map(|v| v.to_string()).unwrap_or_default()
}

fn value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => json!(s),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Float(f) => json!(f),
        FieldValue::Boolean(b) => json!(b),
        FieldValue::Timestamp(_) => json!(value.to_string()),
    }
}

fn fields_json(fields: &FieldMap) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value_json(value)))
            .collect(),
    )
}

fn entity_json(entity: &Entity) -> Value {
    json!({
        "kind": entity.kind.as_str(),
        "key": entity.key.as_str(),
        "fields": fields_json(&entity.fields),
    })
}
