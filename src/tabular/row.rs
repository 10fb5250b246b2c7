//! Row encoding and row keys
//!
//! A row is a column -> value map stored as bincode. Row keys are byte
//! strings built so that RocksDB's lexicographic order is the table's
//! clustering order:
//!
//! - base table:       `{key}`
//! - projection table: `{partition}\0{clustering}\0{id}`
//!
//! where `{clustering}` is a descending-ordered hex encoding of the
//! timestamp, so a forward scan of one partition yields newest rows first.

use super::{TableError, TableResult};
use crate::binding::EntityBinding;
use crate::model::{Entity, FieldMap, FieldValue};

/// Column name -> value
pub type Row = FieldMap;

const SEPARATOR: u8 = 0;

pub fn encode_row(row: &Row) -> TableResult<Vec<u8>> {
    Ok(bincode::serialize(row)?)
}

pub fn decode_row(bytes: &[u8]) -> TableResult<Row> {
    Ok(bincode::deserialize(bytes)?)
}

/// Text form of a key column value
pub fn key_text(value: &FieldValue) -> TableResult<String> {
    let text = match value {
        FieldValue::Text(s) => s.clone(),
        other => other.to_string(),
    };
    check_key_part(&text)?;
    Ok(text)
}

fn check_key_part(part: &str) -> TableResult<()> {
    if part.as_bytes().contains(&SEPARATOR) {
        return Err(TableError::InvalidKey(format!(
            "key part {:?} contains a NUL byte",
            part
        )));
    }
    Ok(())
}

/// Hex encoding of a timestamp that sorts newest first
pub fn descending_timestamp(ms: i64) -> String {
    let ordered = (ms as u64) ^ (1u64 << 63);
    format!("{:016x}", !ordered)
}

pub fn base_key(key: &str) -> TableResult<Vec<u8>> {
    check_key_part(key)?;
    Ok(key.as_bytes().to_vec())
}

/// Prefix shared by every row of one projection partition
pub fn partition_prefix(partition: &str) -> TableResult<Vec<u8>> {
    check_key_part(partition)?;
    let mut prefix = partition.as_bytes().to_vec();
    prefix.push(SEPARATOR);
    Ok(prefix)
}

pub fn projection_key(partition: &str, clustering_ms: i64, id: &str) -> TableResult<Vec<u8>> {
    check_key_part(id)?;
    let mut key = partition_prefix(partition)?;
    key.extend_from_slice(descending_timestamp(clustering_ms).as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

/// Base-table row for an entity, with fields renamed to their columns
pub fn entity_to_row(binding: &EntityBinding, entity: &Entity) -> TableResult<Row> {
    let mut row = Row::new();
    row.insert(
        binding.key_column.clone(),
        FieldValue::Text(entity.key.as_str().to_string()),
    );
    for (name, value) in &entity.fields {
        let field = binding.field(name).ok_or_else(|| TableError::UnknownColumn {
            table: binding.table.clone(),
            column: name.clone(),
        })?;
        row.insert(field.column.clone(), value.clone());
    }
    if let Some(missing) = binding
        .fields
        .iter()
        .find(|f| f.required && !entity.fields.contains_key(&f.field))
    {
        return Err(TableError::MissingColumn {
            table: binding.table.clone(),
            column: missing.column.clone(),
        });
    }
    Ok(row)
}

/// Rebuild an entity from its base-table row
pub fn row_to_entity(binding: &EntityBinding, row: &Row) -> TableResult<Entity> {
    let key = row
        .get(&binding.key_column)
        .and_then(FieldValue::as_text)
        .ok_or_else(|| TableError::Corrupt(format!("{} row without {}", binding.table, binding.key_column)))?;

    let mut entity = Entity::new(binding.kind, key);
    for (column, value) in row {
        if column == &binding.key_column {
            continue;
        }
        let field = binding.field_by_column(column).ok_or_else(|| TableError::UnknownColumn {
            table: binding.table.clone(),
            column: column.clone(),
        })?;
        entity.fields.insert(field.field.clone(), value.clone());
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::StoreBinding;
    use crate::model::EntityKind;

    #[test]
    fn test_descending_timestamp_order() {
        let older = descending_timestamp(1_000);
        let newer = descending_timestamp(2_000);
        let negative = descending_timestamp(-5);
        assert!(newer < older);
        assert!(older < negative);
        assert_eq!(newer.len(), 16);
    }

    #[test]
    fn test_projection_keys_sort_newest_first() {
        let a = projection_key("u1", 1_000, "o1").unwrap();
        let b = projection_key("u1", 2_000, "o2").unwrap();
        let prefix = partition_prefix("u1").unwrap();
        assert!(b < a);
        assert!(a.starts_with(&prefix) && b.starts_with(&prefix));
        assert!(!projection_key("u10", 1, "o3").unwrap().starts_with(&prefix));
    }

    #[test]
    fn test_nul_in_key_rejected() {
        assert!(matches!(base_key("a\0b"), Err(TableError::InvalidKey(_))));
    }

    #[test]
    fn test_entity_row_round_trip() {
        let binding = StoreBinding::ecommerce();
        let order = Entity::new(EntityKind::Order, "o1")
            .with_field("user_id", "u1")
            .with_field("order_date", FieldValue::Timestamp(5))
            .with_field("status", "SHIPPED")
            .with_field("total_amount", 10.0);

        let row = entity_to_row(&binding.order, &order).unwrap();
        assert_eq!(row.get("order_id"), Some(&FieldValue::Text("o1".into())));

        let bytes = encode_row(&row).unwrap();
        let back = row_to_entity(&binding.order, &decode_row(&bytes).unwrap()).unwrap();
        assert_eq!(back, order);
    }
}
