//! Denormalized projection rows
//!
//! Each projection binding turns an entity into at most one row of its
//! projection table. An entity lacking the partition or clustering value
//! simply has no row there.

use super::row::{key_text, projection_key, Row};
use super::TableResult;
use crate::binding::{EntityBinding, ProjectionBinding};
use crate::model::Entity;

/// One row destined for a projection table
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRow {
    pub table: String,
    pub key: Vec<u8>,
    pub row: Row,
}

fn project(
    binding: &EntityBinding,
    projection: &ProjectionBinding,
    entity: &Entity,
) -> TableResult<Option<ProjectionRow>> {
    let Some(partition) = entity.get(&projection.partition_field) else {
        return Ok(None);
    };
    let Some(clustering) = entity
        .get(&projection.clustering_field)
        .and_then(|v| v.as_timestamp())
    else {
        return Ok(None);
    };

    let key = projection_key(&key_text(partition)?, clustering, entity.key.as_str())?;

    let mut row = Row::new();
    row.insert(
        binding.key_column.clone(),
        entity.key.as_str().into(),
    );
    let copied = [&projection.partition_field, &projection.clustering_field]
        .into_iter()
        .chain(projection.fields.iter());
    for field in copied {
        if let (Some(value), Some(bound)) = (entity.get(field), binding.field(field)) {
            row.insert(bound.column.clone(), value.clone());
        }
    }

    Ok(Some(ProjectionRow {
        table: projection.table.clone(),
        key,
        row,
    }))
}

/// Every projection row `entity` contributes
pub fn projection_rows(binding: &EntityBinding, entity: &Entity) -> TableResult<Vec<ProjectionRow>> {
    let mut rows = Vec::with_capacity(binding.projections.len());
    for projection in &binding.projections {
        if let Some(row) = project(binding, projection, entity)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::StoreBinding;
    use crate::model::{EntityKind, FieldValue};

    #[test]
    fn test_review_feeds_two_projections() {
        let binding = StoreBinding::ecommerce();
        let review = Entity::new(EntityKind::Review, "r1")
            .with_field("product_id", "p1")
            .with_field("user_id", "u1")
            .with_field("rating", 5i64)
            .with_field("title", "Great")
            .with_field("review_date", FieldValue::Timestamp(10))
            .with_field("is_verified_purchase", true);

        let rows = projection_rows(&binding.review, &review).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].table, "reviews_by_product");
        assert_eq!(rows[1].table, "user_reviews");

        let by_product = &rows[0].row;
        assert_eq!(by_product.get("review_id"), Some(&FieldValue::Text("r1".into())));
        assert_eq!(by_product.get("rating"), Some(&FieldValue::Integer(5)));
        assert!(by_product.get("comment").is_none());
        assert!(by_product.get("is_verified_purchase").is_none());
    }

    #[test]
    fn test_user_has_no_projections() {
        let binding = StoreBinding::ecommerce();
        let user = Entity::new(EntityKind::User, "u1").with_field("username", "alice");
        assert!(projection_rows(&binding.user, &user).unwrap().is_empty());
    }
}
