//! Table definitions derived from the store binding

use super::row::Row;
use super::{TableError, TableResult};
use crate::binding::{EntityBinding, ProjectionBinding, StoreBinding};
use crate::model::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of one table
///
/// Rows are addressed by `partition_column`, then (for projection tables)
/// by `clustering_column` descending and `id_column` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub partition_column: String,
    /// Timestamp column clustered newest first
    pub clustering_column: Option<String>,
    /// Tie-breaking entity key column of projection rows
    pub id_column: Option<String>,
    pub columns: BTreeMap<String, FieldType>,
}

impl TableDef {
    /// Base table of an entity kind, keyed by entity key
    pub fn base(binding: &EntityBinding) -> Self {
        let mut columns = BTreeMap::new();
        columns.insert(binding.key_column.clone(), FieldType::Text);
        for field in &binding.fields {
            columns.insert(field.column.clone(), field.field_type);
        }
        Self {
            name: binding.table.clone(),
            partition_column: binding.key_column.clone(),
            clustering_column: None,
            id_column: None,
            columns,
        }
    }

    /// Denormalized query table of an entity kind
    pub fn projection(binding: &EntityBinding, projection: &ProjectionBinding) -> TableResult<Self> {
        let column_of = |field: &str| {
            binding
                .field(field)
                .map(|f| (f.column.clone(), f.field_type))
                .ok_or_else(|| TableError::UnknownColumn {
                    table: projection.table.clone(),
                    column: field.to_string(),
                })
        };

        let (partition_column, partition_type) = column_of(&projection.partition_field)?;
        let (clustering_column, clustering_type) = column_of(&projection.clustering_field)?;

        let mut columns = BTreeMap::new();
        columns.insert(partition_column.clone(), partition_type);
        columns.insert(clustering_column.clone(), clustering_type);
        columns.insert(binding.key_column.clone(), FieldType::Text);
        for field in &projection.fields {
            let (column, field_type) = column_of(field)?;
            columns.insert(column, field_type);
        }

        Ok(Self {
            name: projection.table.clone(),
            partition_column,
            clustering_column: Some(clustering_column),
            id_column: Some(binding.key_column.clone()),
            columns,
        })
    }

    /// Check every column of `row` is declared with a matching type, and the
    /// key columns are present
    pub fn check_row(&self, row: &Row) -> TableResult<()> {
        for (column, value) in row {
            let expected = self.columns.get(column).ok_or_else(|| TableError::UnknownColumn {
                table: self.name.clone(),
                column: column.clone(),
            })?;
            if *expected != value.field_type() {
                return Err(TableError::TypeMismatch {
                    table: self.name.clone(),
                    column: column.clone(),
                    expected: expected.name(),
                    found: value.type_name(),
                });
            }
        }

        let key_columns = std::iter::once(&self.partition_column)
            .chain(self.clustering_column.iter())
            .chain(self.id_column.iter());
        for column in key_columns {
            if !row.contains_key(column) {
                return Err(TableError::MissingColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Every table the binding needs: base tables then projections
pub fn tables_for(binding: &StoreBinding) -> TableResult<Vec<TableDef>> {
    let mut tables = Vec::new();
    for entity in binding.entities() {
        tables.push(TableDef::base(entity));
        for projection in &entity.projections {
            tables.push(TableDef::projection(entity, projection)?);
        }
    }
    Ok(tables)
}
