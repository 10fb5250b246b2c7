//! Store bindings: entity kind -> physical representation in each store
//!
//! A binding is read-only configuration loaded once at startup. It names the
//! vertex label and property keys used in the graph store, the table and
//! columns used in the tabular store, the denormalized projection tables,
//! and the relationship edges derived from reference fields.

use crate::model::{EntityKind, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Binding validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Binding for {kind} is invalid: {reason}")]
    Invalid { kind: EntityKind, reason: String },

    #[error("Table {0} is bound more than once")]
    DuplicateTable(String),

    #[error("Property {property} is declared with conflicting types {first:?} and {second:?}")]
    ConflictingProperty {
        property: String,
        first: FieldType,
        second: FieldType,
    },
}

/// One canonical field and its name in each store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Canonical field name
    pub field: String,
    /// Graph property key
    pub property: String,
    /// Tabular column name
    pub column: String,
    /// Canonical scalar type
    pub field_type: FieldType,
    /// Whether the field must be present
    pub required: bool,
}

impl FieldBinding {
    pub fn new(field: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            field: field.to_string(),
            property: field.to_string(),
            column: field.to_string(),
            field_type,
            required,
        }
    }
}

/// Relationship edge derived from a reference field
///
/// The edge runs from the referenced entity (of `from_kind`, keyed by the
/// value of `reference_field`) to the entity that holds the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeBinding {
    pub edge_label: String,
    pub from_kind: EntityKind,
    pub reference_field: String,
}

/// Denormalized query table maintained alongside the base table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionBinding {
    pub table: String,
    /// Field whose value is the partition key
    pub partition_field: String,
    /// Timestamp field clustered in descending order
    pub clustering_field: String,
    /// Fields copied into the projection row
    pub fields: Vec<String>,
}

/// Full binding for one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBinding {
    pub kind: EntityKind,
    pub vertex_label: String,
    /// Graph property carrying the entity key (unique-indexed)
    pub key_property: String,
    pub table: String,
    /// Tabular column carrying the entity key (partition key of the base table)
    pub key_column: String,
    pub fields: Vec<FieldBinding>,
    #[serde(default)]
    pub references: Vec<EdgeBinding>,
    #[serde(default)]
    pub projections: Vec<ProjectionBinding>,
}

impl EntityBinding {
    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn field_by_property(&self, property: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.property == property)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Name of the unique graph index on the key property
    pub fn key_index_name(&self) -> String {
        format!("{}By{}", self.vertex_label, self.key_property)
    }

    fn validate(&self) -> Result<(), BindingError> {
        let invalid = |reason: String| BindingError::Invalid {
            kind: self.kind,
            reason,
        };

        if self.vertex_label.is_empty() || self.table.is_empty() {
            return Err(invalid("empty vertex label or table name".to_string()));
        }

        let mut fields = HashSet::new();
        let mut properties = HashSet::from([self.key_property.as_str()]);
        let mut columns = HashSet::from([self.key_column.as_str()]);
        for f in &self.fields {
            if !fields.insert(f.field.as_str()) {
                return Err(invalid(format!("field {} bound twice", f.field)));
            }
            if !properties.insert(f.property.as_str()) {
                return Err(invalid(format!("property {} bound twice", f.property)));
            }
            if !columns.insert(f.column.as_str()) {
                return Err(invalid(format!("column {} bound twice", f.column)));
            }
        }

        for reference in &self.references {
            match self.field(&reference.reference_field) {
                Some(f) if f.field_type == FieldType::Text => {}
                _ => {
                    return Err(invalid(format!(
                        "reference field {} must be a bound text field",
                        reference.reference_field
                    )))
                }
            }
        }

        for projection in &self.projections {
            match self.field(&projection.clustering_field) {
                Some(f) if f.field_type == FieldType::Timestamp && f.required => {}
                _ => {
                    return Err(invalid(format!(
                        "projection {} must cluster on a required timestamp field",
                        projection.table
                    )))
                }
            }
            match self.field(&projection.partition_field) {
                Some(f) if f.required => {}
                _ => {
                    return Err(invalid(format!(
                        "projection {} must partition on a required field",
                        projection.table
                    )))
                }
            }
            if let Some(unknown) = projection.fields.iter().find(|name| self.field(name).is_none()) {
                return Err(invalid(format!(
                    "projection {} copies unknown field {}",
                    projection.table, unknown
                )));
            }
        }

        Ok(())
    }
}

/// Bindings for all four entity kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreBinding {
    pub user: EntityBinding,
    pub product: EntityBinding,
    pub order: EntityBinding,
    pub review: EntityBinding,
}

impl Default for StoreBinding {
    fn default() -> Self {
        Self::ecommerce()
    }
}

impl StoreBinding {
    /// The e-commerce layout: `user`/`product`/`order`/`review` vertices,
    /// `users`/`products`/`orders`/`reviews` base tables and the
    /// access-pattern projection tables.
    ///
    /// A user needs only its username; other kinds require the fields their
    /// projections partition and cluster on. Typed records check the rest.
    pub fn ecommerce() -> Self {
        use FieldType::*;

        let user = EntityBinding {
            kind: EntityKind::User,
            vertex_label: "user".to_string(),
            key_property: "user_id".to_string(),
            table: "users".to_string(),
            key_column: "user_id".to_string(),
            fields: vec![
                FieldBinding::new("username", Text, true),
                FieldBinding::new("email", Text, false),
                FieldBinding::new("first_name", Text, false),
                FieldBinding::new("last_name", Text, false),
                FieldBinding::new("date_of_birth", Text, false),
                FieldBinding::new("registration_date", Timestamp, false),
                FieldBinding::new("is_active", Boolean, false),
                FieldBinding::new("address", Text, false),
                FieldBinding::new("phone", Text, false),
            ],
            references: vec![],
            projections: vec![],
        };

        let product = EntityBinding {
            kind: EntityKind::Product,
            vertex_label: "product".to_string(),
            key_property: "product_id".to_string(),
            table: "products".to_string(),
            key_column: "product_id".to_string(),
            fields: vec![
                FieldBinding::new("name", Text, true),
                FieldBinding::new("description", Text, false),
                FieldBinding::new("price", Float, true),
                FieldBinding::new("category", Text, true),
                FieldBinding::new("brand", Text, true),
                FieldBinding::new("sku", Text, true),
                FieldBinding::new("stock_quantity", Integer, true),
                FieldBinding::new("created_date", Timestamp, true),
                FieldBinding::new("is_active", Boolean, true),
            ],
            references: vec![],
            projections: vec![ProjectionBinding {
                table: "products_by_category".to_string(),
                partition_field: "category".to_string(),
                clustering_field: "created_date".to_string(),
                fields: vec!["name".into(), "price".into(), "brand".into()],
            }],
        };

        let order = EntityBinding {
            kind: EntityKind::Order,
            vertex_label: "order".to_string(),
            key_property: "order_id".to_string(),
            table: "orders".to_string(),
            key_column: "order_id".to_string(),
            fields: vec![
                FieldBinding::new("user_id", Text, true),
                FieldBinding::new("order_date", Timestamp, true),
                FieldBinding::new("status", Text, true),
                FieldBinding::new("total_amount", Float, true),
                FieldBinding::new("shipping_address", Text, false),
                FieldBinding::new("payment_method", Text, false),
            ],
            references: vec![EdgeBinding {
                edge_label: "placed_order".to_string(),
                from_kind: EntityKind::User,
                reference_field: "user_id".to_string(),
            }],
            projections: vec![ProjectionBinding {
                table: "user_orders".to_string(),
                partition_field: "user_id".to_string(),
                clustering_field: "order_date".to_string(),
                fields: vec!["status".into(), "total_amount".into()],
            }],
        };

        let review = EntityBinding {
            kind: EntityKind::Review,
            vertex_label: "review".to_string(),
            key_property: "review_id".to_string(),
            table: "reviews".to_string(),
            key_column: "review_id".to_string(),
            fields: vec![
                FieldBinding::new("product_id", Text, true),
                FieldBinding::new("user_id", Text, true),
                FieldBinding::new("rating", Integer, true),
                FieldBinding::new("title", Text, true),
                FieldBinding::new("comment", Text, false),
                FieldBinding::new("review_date", Timestamp, true),
                FieldBinding::new("is_verified_purchase", Boolean, true),
            ],
            references: vec![
                EdgeBinding {
                    edge_label: "wrote_review".to_string(),
                    from_kind: EntityKind::User,
                    reference_field: "user_id".to_string(),
                },
                EdgeBinding {
                    edge_label: "has_review".to_string(),
                    from_kind: EntityKind::Product,
                    reference_field: "product_id".to_string(),
                },
            ],
            projections: vec![
                ProjectionBinding {
                    table: "reviews_by_product".to_string(),
                    partition_field: "product_id".to_string(),
                    clustering_field: "review_date".to_string(),
                    fields: vec![
                        "user_id".into(),
                        "rating".into(),
                        "title".into(),
                        "comment".into(),
                    ],
                },
                ProjectionBinding {
                    table: "user_reviews".to_string(),
                    partition_field: "user_id".to_string(),
                    clustering_field: "review_date".to_string(),
                    fields: vec!["product_id".into(), "rating".into(), "title".into()],
                },
            ],
        };

        Self {
            user,
            product,
            order,
            review,
        }
    }

    pub fn for_kind(&self, kind: EntityKind) -> &EntityBinding {
        match kind {
            EntityKind::User => &self.user,
            EntityKind::Product => &self.product,
            EntityKind::Order => &self.order,
            EntityKind::Review => &self.review,
        }
    }

    pub fn entities(&self) -> [&EntityBinding; 4] {
        [&self.user, &self.product, &self.order, &self.review]
    }

    /// Every graph property key with its canonical type
    pub fn property_keys(&self) -> Result<BTreeMap<String, FieldType>, BindingError> {
        let mut keys: BTreeMap<String, FieldType> = BTreeMap::new();
        for entity in self.entities() {
            let declared = std::iter::once((entity.key_property.as_str(), FieldType::Text)).chain(
                entity
                    .fields
                    .iter()
                    .map(|f| (f.property.as_str(), f.field_type)),
            );
            for (property, field_type) in declared {
                match keys.get(property) {
                    Some(existing) if *existing != field_type => {
                        return Err(BindingError::ConflictingProperty {
                            property: property.to_string(),
                            first: *existing,
                            second: field_type,
                        })
                    }
                    Some(_) => {}
                    None => {
                        keys.insert(property.to_string(), field_type);
                    }
                }
            }
        }
        Ok(keys)
    }

    /// All relationship edge labels
    pub fn edge_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .entities()
            .iter()
            .flat_map(|e| e.references.iter().map(|r| r.edge_label.as_str()))
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// References pointing at `kind`, paired with the binding that holds them
    pub fn incoming_references(&self, kind: EntityKind) -> Vec<(&EntityBinding, &EdgeBinding)> {
        self.entities()
            .into_iter()
            .flat_map(|holder| {
                holder
                    .references
                    .iter()
                    .filter(move |r| r.from_kind == kind)
                    .map(move |r| (holder, r))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), BindingError> {
        let mut tables = HashSet::new();
        for (kind, entity) in EntityKind::ALL.iter().zip(self.entities()) {
            if entity.kind != *kind {
                return Err(BindingError::Invalid {
                    kind: *kind,
                    reason: format!("slot holds a {} binding", entity.kind),
                });
            }
            entity.validate()?;
            let names = std::iter::once(&entity.table).chain(entity.projections.iter().map(|p| &p.table));
            for table in names {
                if !tables.insert(table.clone()) {
                    return Err(BindingError::DuplicateTable(table.clone()));
                }
            }
        }
        self.property_keys()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecommerce_binding_is_valid() {
        let binding = StoreBinding::ecommerce();
        binding.validate().unwrap();
        assert_eq!(binding.for_kind(EntityKind::Order).table, "orders");
        assert_eq!(binding.for_kind(EntityKind::Review).vertex_label, "review");
    }

    #[test]
    fn test_edge_labels() {
        let binding = StoreBinding::ecommerce();
        assert_eq!(
            binding.edge_labels(),
            vec!["has_review", "placed_order", "wrote_review"]
        );
    }

    #[test]
    fn test_incoming_references() {
        let binding = StoreBinding::ecommerce();
        let into_user = binding.incoming_references(EntityKind::User);
        assert_eq!(into_user.len(), 2);
        assert!(into_user.iter().any(|(holder, r)| holder.kind == EntityKind::Order
            && r.edge_label == "placed_order"));
        assert!(binding.incoming_references(EntityKind::Order).is_empty());
    }

    #[test]
    fn test_property_keys_merge_shared_names() {
        let binding = StoreBinding::ecommerce();
        let keys = binding.property_keys().unwrap();
        assert_eq!(keys.get("is_active"), Some(&FieldType::Boolean));
        assert_eq!(keys.get("user_id"), Some(&FieldType::Text));
        assert_eq!(keys.get("price"), Some(&FieldType::Float));
    }

    #[test]
    fn test_conflicting_property_type_rejected() {
        let mut binding = StoreBinding::ecommerce();
        binding.review.fields[2].property = "price".to_string();
        assert!(matches!(
            binding.validate(),
            Err(BindingError::ConflictingProperty { .. })
        ));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut binding = StoreBinding::ecommerce();
        binding.order.projections[0].table = "users".to_string();
        assert_eq!(
            binding.validate(),
            Err(BindingError::DuplicateTable("users".to_string()))
        );
    }
}
