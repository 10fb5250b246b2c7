//! Opens both stores, the intent log and the adapters from an [`AppConfig`]

use crate::adapter::{GraphAdapter, StoreAdapter, TabularAdapter};
use crate::binding::{BindingError, StoreBinding};
use crate::config::AppConfig;
use crate::coordinator::{Coordinator, CoordinatorSettings};
use crate::graph::{GraphDatabase, GraphError};
use crate::intent::{IntentError, IntentStore};
use crate::tabular::{TableError, TabularStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store binding: {0}")]
    Binding(#[from] BindingError),

    #[error("Graph store error: {0}")]
    Graph(#[from] GraphError),

    #[error("Tabular store error: {0}")]
    Table(#[from] TableError),

    #[error("Intent log error: {0}")]
    Intent(#[from] IntentError),
}

pub type SystemResult<T> = Result<T, SystemError>;

/// Both stores with their schema in place
pub struct DualStore {
    pub binding: Arc<StoreBinding>,
    pub graph: Arc<GraphDatabase>,
    pub tabular: Arc<TabularStore>,
    pub intents: Arc<IntentStore>,
    data_dir: PathBuf,
}

impl DualStore {
    pub fn open_with(config: &AppConfig) -> SystemResult<Self> {
        Self::open(&config.data_dir, config.wal_sync)
    }

    /// Open (or create) both stores under `data_dir` and declare the
    /// e-commerce schema in each. Safe to call on an existing directory.
    pub fn open(data_dir: impl AsRef<Path>, wal_sync: bool) -> SystemResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let graph_path = data_dir.join("graph");
        let tabular_path = data_dir.join("tabular");
        std::fs::create_dir_all(&graph_path)?;
        std::fs::create_dir_all(&tabular_path)?;

        let binding = StoreBinding::ecommerce();
        binding.validate()?;

        let graph = GraphDatabase::open(&graph_path, wal_sync)?;
        let tabular = TabularStore::open(&tabular_path)?;
        let tables = tabular.setup(&binding)?;
        let intents = IntentStore::open(&tabular)?;

        info!(tables, "Dual store opened at {:?}", data_dir);
        Ok(Self {
            binding: Arc::new(binding),
            graph: Arc::new(graph),
            tabular: Arc::new(tabular),
            intents: Arc::new(intents),
            data_dir,
        })
    }

    /// Declare the graph schema. Returns how many declarations were new.
    pub async fn setup_graph_schema(&self) -> SystemResult<usize> {
        Ok(self.graph.setup_schema(&self.binding).await?)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn graph_adapter(&self) -> Arc<dyn StoreAdapter> {
        Arc::new(GraphAdapter::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.binding),
        ))
    }

    pub fn tabular_adapter(&self) -> Arc<dyn StoreAdapter> {
        Arc::new(TabularAdapter::new(
            Arc::clone(&self.tabular),
            Arc::clone(&self.binding),
        ))
    }

    pub fn coordinator(&self, settings: CoordinatorSettings) -> Coordinator {
        self.coordinator_with(self.graph_adapter(), self.tabular_adapter(), settings)
    }

    /// Coordinator over caller-supplied adapters, e.g. fault-injecting wrappers
    pub fn coordinator_with(
        &self,
        graph: Arc<dyn StoreAdapter>,
        tabular: Arc<dyn StoreAdapter>,
        settings: CoordinatorSettings,
    ) -> Coordinator {
        Coordinator::new(graph, tabular, Arc::clone(&self.intents), settings)
    }

    pub fn flush(&self) -> SystemResult<()> {
        self.graph.flush()?;
        self.tabular.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        {
            let stores = DualStore::open(temp_dir.path(), false).unwrap();
            assert!(stores.setup_graph_schema().await.unwrap() > 0);
            stores.flush().unwrap();
        }

        let stores = DualStore::open(temp_dir.path(), false).unwrap();
        assert_eq!(stores.setup_graph_schema().await.unwrap(), 0);
        assert_eq!(stores.tabular.table_names().len(), 8);
    }
}
