//! Partition-key access patterns over the projection tables

use super::row::Row;
use super::storage::TabularStore;
use super::{TableError, TableResult};
use crate::binding::StoreBinding;
use crate::model::EntityKind;

pub struct TabularQueries<'a> {
    store: &'a TabularStore,
    binding: &'a StoreBinding,
}

impl<'a> TabularQueries<'a> {
    pub fn new(store: &'a TabularStore, binding: &'a StoreBinding) -> Self {
        Self { store, binding }
    }

    /// Projection table of `kind` partitioned by `partition_field`
    fn projection(&self, kind: EntityKind, partition_field: &str) -> TableResult<&'a str> {
        self.binding
            .for_kind(kind)
            .projections
            .iter()
            .find(|p| p.partition_field == partition_field)
            .map(|p| p.table.as_str())
            .ok_or_else(|| {
                TableError::UnknownTable(format!("{} projection by {}", kind, partition_field))
            })
    }

    /// A user's orders, newest first
    pub fn user_orders(&self, user_id: &str, limit: usize) -> TableResult<Vec<Row>> {
        let table = self.projection(EntityKind::Order, "user_id")?;
        self.store.scan_partition(table, user_id, limit)
    }

    /// Products in a category, newest first
    pub fn products_by_category(&self, category: &str, limit: usize) -> TableResult<Vec<Row>> {
        let table = self.projection(EntityKind::Product, "category")?;
        self.store.scan_partition(table, category, limit)
    }

    /// A product's reviews, newest first
    pub fn product_reviews(&self, product_id: &str, limit: usize) -> TableResult<Vec<Row>> {
        let table = self.projection(EntityKind::Review, "product_id")?;
        self.store.scan_partition(table, product_id, limit)
    }

    /// A user's reviews, newest first
    pub fn user_reviews(&self, user_id: &str, limit: usize) -> TableResult<Vec<Row>> {
        let table = self.projection(EntityKind::Review, "user_id")?;
        self.store.scan_partition(table, user_id, limit)
    }
}
