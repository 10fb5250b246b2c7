//! RocksDB-backed wide-column storage
//!
//! One column family per table. The `default` column family holds the table
//! catalog, so table definitions survive a reopen. Entity writes maintain the
//! base row and every projection row in a single `WriteBatch`.

use super::projection::projection_rows;
use super::row::{
    base_key, decode_row, encode_row, entity_to_row, partition_prefix, row_to_entity, Row,
};
use super::schema::{tables_for, TableDef};
use super::{TableError, TableResult};
use crate::binding::{EntityBinding, StoreBinding};
use crate::model::Entity;
use rocksdb::{
    BoundColumnFamily, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options,
    WriteBatch, DEFAULT_COLUMN_FAMILY_NAME,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Multi-threaded RocksDB handle, shared with the intent log
pub type Db = DBWithThreadMode<MultiThreaded>;

const CATALOG_PREFIX: &str = "table:";

pub struct TabularStore {
    db: Arc<Db>,
    tables: RwLock<HashMap<String, TableDef>>,
    /// Serializes read-modify-write of entity rows
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl TabularStore {
    /// Open or create the store at `path`, reopening every existing table
    pub fn open(path: impl AsRef<Path>) -> TableResult<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening tabular store at: {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(16 * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        let existing = Db::list_cf(&opts, &path)
            .unwrap_or_else(|_| vec![DEFAULT_COLUMN_FAMILY_NAME.to_string()]);
        let db = Db::open_cf(&opts, &path, existing)?;

        let store = Self {
            db: Arc::new(db),
            tables: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            path,
        };
        let loaded = store.load_catalog()?;
        info!(tables = loaded, "Tabular store opened");
        Ok(store)
    }

    fn load_catalog(&self) -> TableResult<usize> {
        let mut tables = HashMap::new();
        let iter = self.db.iterator(IteratorMode::From(
            CATALOG_PREFIX.as_bytes(),
            Direction::Forward,
        ));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(CATALOG_PREFIX.as_bytes()) {
                break;
            }
            let def: TableDef = bincode::deserialize(&value)?;
            tables.insert(def.name.clone(), def);
        }
        let count = tables.len();
        *self.tables.write().unwrap_or_else(|p| p.into_inner()) = tables;
        Ok(count)
    }

    /// Shared handle for components that keep their own column family
    pub fn db(&self) -> Arc<Db> {
        Arc::clone(&self.db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a column family unless it exists. Returns `true` if created.
    pub fn ensure_column_family(&self, name: &str) -> TableResult<bool> {
        if self.db.cf_handle(name).is_some() {
            return Ok(false);
        }
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        self.db.create_cf(name, &opts)?;
        debug!("Created column family {}", name);
        Ok(true)
    }

    /// Register a table ("create if not exists"). A different definition
    /// under an existing name is a schema conflict.
    pub fn create_table(&self, def: TableDef) -> TableResult<bool> {
        if let Some(existing) = self.read_tables().get(&def.name) {
            if existing == &def {
                return Ok(false);
            }
            return Err(TableError::SchemaConflict(def.name.clone()));
        }

        self.ensure_column_family(&def.name)?;
        let catalog_key = format!("{}{}", CATALOG_PREFIX, def.name);
        self.db.put(catalog_key.as_bytes(), bincode::serialize(&def)?)?;
        info!("Created table {}", def.name);
        self.tables
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(def.name.clone(), def);
        Ok(true)
    }

    /// Create every table of `binding`; returns how many were new
    pub fn setup(&self, binding: &StoreBinding) -> TableResult<usize> {
        let mut created = 0;
        for def in tables_for(binding)? {
            if self.create_table(def)? {
                created += 1;
            }
        }
        Ok(created)
    }

    pub fn table(&self, name: &str) -> TableResult<TableDef> {
        self.read_tables()
            .get(name)
            .cloned()
            .ok_or_else(|| TableError::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_tables().keys().cloned().collect();
        names.sort();
        names
    }

    fn read_tables(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TableDef>> {
        self.tables.read().unwrap_or_else(|p| p.into_inner())
    }

    fn cf(&self, table: &str) -> TableResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(table)
            .ok_or_else(|| TableError::UnknownTable(table.to_string()))
    }

    /// Upsert an entity's base row and projection rows atomically, dropping
    /// projection rows whose key changed
    pub fn put_entity(&self, binding: &EntityBinding, entity: &Entity) -> TableResult<()> {
        let base = self.table(&binding.table)?;
        let row = entity_to_row(binding, entity)?;
        base.check_row(&row)?;

        let projections = projection_rows(binding, entity)?;
        for projection in &projections {
            self.table(&projection.table)?.check_row(&projection.row)?;
        }

        let key = base_key(entity.key.as_str())?;
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let cf = self.cf(&binding.table)?;

        let mut batch = WriteBatch::default();
        if let Some(old) = self.db.get_cf(&cf, &key)? {
            let previous = row_to_entity(binding, &decode_row(&old)?)?;
            for stale in projection_rows(binding, &previous)? {
                let kept = projections
                    .iter()
                    .any(|p| p.table == stale.table && p.key == stale.key);
                if !kept {
                    batch.delete_cf(&self.cf(&stale.table)?, &stale.key);
                }
            }
        }

        batch.put_cf(&cf, &key, encode_row(&row)?);
        for projection in &projections {
            batch.put_cf(
                &self.cf(&projection.table)?,
                &projection.key,
                encode_row(&projection.row)?,
            );
        }
        self.db.write(batch)?;

        debug!(table = %binding.table, key = %entity.key, "Stored entity rows");
        Ok(())
    }

    pub fn get_entity(&self, binding: &EntityBinding, key: &str) -> TableResult<Option<Entity>> {
        self.table(&binding.table)?;
        let cf = self.cf(&binding.table)?;
        match self.db.get_cf(&cf, base_key(key)?)? {
            Some(bytes) => Ok(Some(row_to_entity(binding, &decode_row(&bytes)?)?)),
            None => Ok(None),
        }
    }

    /// Remove an entity's base row and projection rows atomically.
    /// Returns `false` if there was nothing to remove.
    pub fn delete_entity(&self, binding: &EntityBinding, key: &str) -> TableResult<bool> {
        self.table(&binding.table)?;
        let key = base_key(key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let cf = self.cf(&binding.table)?;

        let Some(old) = self.db.get_cf(&cf, &key)? else {
            return Ok(false);
        };
        let previous = row_to_entity(binding, &decode_row(&old)?)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, &key);
        for stale in projection_rows(binding, &previous)? {
            batch.delete_cf(&self.cf(&stale.table)?, &stale.key);
        }
        self.db.write(batch)?;

        debug!(table = %binding.table, "Deleted entity rows");
        Ok(true)
    }

    /// Rows of one partition in clustering order, at most `limit`
    pub fn scan_partition(&self, table: &str, partition: &str, limit: usize) -> TableResult<Vec<Row>> {
        self.table(table)?;
        let cf = self.cf(table)?;
        let prefix = partition_prefix(partition)?;

        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            if rows.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            rows.push(decode_row(&value)?);
        }
        Ok(rows)
    }

    pub fn count_rows(&self, table: &str) -> TableResult<usize> {
        self.table(table)?;
        let cf = self.cf(table)?;
        let mut count = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn flush(&self) -> TableResult<()> {
        self.db.flush()?;
        debug!("Flushed tabular store to disk");
        Ok(())
    }
}
