//! Typed domain records for the e-commerce data set
//!
//! Each record converts to a canonical `Entity` (validating its constraints)
//! and back. The key field (`user_id`, `product_id`, ...) travels as the
//! entity key, never as a regular field.

use super::entity::{Entity, EntityKey, EntityKind, FieldMap, FieldValue};
use super::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Conversion between a typed record and the canonical entity
pub trait Record: Sized {
    const KIND: EntityKind;

    fn key(&self) -> &EntityKey;

    /// Check domain constraints
    fn validate(&self) -> ModelResult<()>;

    fn to_fields(&self) -> FieldMap;

    fn from_entity(entity: &Entity) -> ModelResult<Self>;

    /// Validate and convert into a canonical entity
    fn to_entity(&self) -> ModelResult<Entity> {
        self.validate()?;
        Ok(Entity {
            kind: Self::KIND,
            key: self.key().clone(),
            fields: self.to_fields(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: EntityKey,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub is_active: bool,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: EntityKey,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub brand: String,
    pub sku: String,
    pub stock_quantity: i64,
    pub created_date: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::Invalid {
                field: "status".to_string(),
                reason: format!("unknown order status '{}'", s),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: EntityKey,
    pub user_id: EntityKey,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub review_id: EntityKey,
    pub product_id: EntityKey,
    pub user_id: EntityKey,
    pub rating: i64,
    pub title: String,
    pub comment: Option<String>,
    pub review_date: DateTime<Utc>,
    pub is_verified_purchase: bool,
}

/// Round a money amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn invalid(field: &str, reason: impl Into<String>) -> ModelError {
    ModelError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> ModelResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(invalid(
            field,
            format!("length {} outside {}..={}", len, min, max),
        ));
    }
    Ok(())
}

fn check_kind(entity: &Entity, expected: EntityKind) -> ModelResult<()> {
    if entity.kind != expected {
        return Err(ModelError::KindMismatch {
            expected,
            found: entity.kind,
        });
    }
    Ok(())
}

fn field<'a>(entity: &'a Entity, name: &str) -> ModelResult<&'a FieldValue> {
    entity
        .get(name)
        .ok_or_else(|| ModelError::MissingField(name.to_string()))
}

fn type_error(name: &str, expected: &'static str, found: &FieldValue) -> ModelError {
    ModelError::FieldType {
        field: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

fn text(entity: &Entity, name: &str) -> ModelResult<String> {
    let value = field(entity, name)?;
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| type_error(name, "Text", value))
}

fn opt_text(entity: &Entity, name: &str) -> ModelResult<Option<String>> {
    match entity.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_text()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| type_error(name, "Text", value)),
    }
}

fn integer(entity: &Entity, name: &str) -> ModelResult<i64> {
    let value = field(entity, name)?;
    value.as_integer().ok_or_else(|| type_error(name, "Integer", value))
}

fn float(entity: &Entity, name: &str) -> ModelResult<f64> {
    let value = field(entity, name)?;
    value.as_float().ok_or_else(|| type_error(name, "Float", value))
}

fn boolean(entity: &Entity, name: &str) -> ModelResult<bool> {
    let value = field(entity, name)?;
    value.as_boolean().ok_or_else(|| type_error(name, "Boolean", value))
}

fn timestamp(entity: &Entity, name: &str) -> ModelResult<DateTime<Utc>> {
    let value = field(entity, name)?;
    value
        .as_datetime()
        .ok_or_else(|| type_error(name, "Timestamp", value))
}

fn key_field(entity: &Entity, name: &str) -> ModelResult<EntityKey> {
    let key = text(entity, name)?;
    if key.is_empty() {
        return Err(invalid(name, "empty reference"));
    }
    Ok(EntityKey::new(key))
}

fn insert_opt(fields: &mut FieldMap, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        fields.insert(name.to_string(), FieldValue::Text(v.clone()));
    }
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    fn key(&self) -> &EntityKey {
        &self.user_id
    }

    fn validate(&self) -> ModelResult<()> {
        check_len("username", &self.username, 3, 50)?;
        check_len("first_name", &self.first_name, 1, 50)?;
        check_len("last_name", &self.last_name, 1, 50)?;
        if !self.email.contains('@') {
            return Err(invalid("email", "missing '@'"));
        }
        if let Some(dob) = &self.date_of_birth {
            chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d")
                .map_err(|e| invalid("date_of_birth", e.to_string()))?;
        }
        Ok(())
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("username".into(), self.username.as_str().into());
        fields.insert("email".into(), self.email.as_str().into());
        fields.insert("first_name".into(), self.first_name.as_str().into());
        fields.insert("last_name".into(), self.last_name.as_str().into());
        insert_opt(&mut fields, "date_of_birth", &self.date_of_birth);
        fields.insert("registration_date".into(), self.registration_date.into());
        fields.insert("is_active".into(), self.is_active.into());
        insert_opt(&mut fields, "address", &self.address);
        insert_opt(&mut fields, "phone", &self.phone);
        fields
    }

    fn from_entity(entity: &Entity) -> ModelResult<Self> {
        check_kind(entity, Self::KIND)?;
        Ok(User {
            user_id: entity.key.clone(),
            username: text(entity, "username")?,
            email: text(entity, "email")?,
            first_name: text(entity, "first_name")?,
            last_name: text(entity, "last_name")?,
            date_of_birth: opt_text(entity, "date_of_birth")?,
            registration_date: timestamp(entity, "registration_date")?,
            is_active: boolean(entity, "is_active")?,
            address: opt_text(entity, "address")?,
            phone: opt_text(entity, "phone")?,
        })
    }
}

impl Record for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn key(&self) -> &EntityKey {
        &self.product_id
    }

    fn validate(&self) -> ModelResult<()> {
        check_len("name", &self.name, 1, 200)?;
        check_len("category", &self.category, 1, 100)?;
        check_len("brand", &self.brand, 1, 100)?;
        check_len("sku", &self.sku, 1, 50)?;
        if !(self.price > 0.0) {
            return Err(invalid("price", "must be positive"));
        }
        if self.stock_quantity < 0 {
            return Err(invalid("stock_quantity", "must not be negative"));
        }
        Ok(())
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("name".into(), self.name.as_str().into());
        insert_opt(&mut fields, "description", &self.description);
        fields.insert("price".into(), round_cents(self.price).into());
        fields.insert("category".into(), self.category.as_str().into());
        fields.insert("brand".into(), self.brand.as_str().into());
        fields.insert("sku".into(), self.sku.as_str().into());
        fields.insert("stock_quantity".into(), self.stock_quantity.into());
        fields.insert("created_date".into(), self.created_date.into());
        fields.insert("is_active".into(), self.is_active.into());
        fields
    }

    fn from_entity(entity: &Entity) -> ModelResult<Self> {
        check_kind(entity, Self::KIND)?;
        Ok(Product {
            product_id: entity.key.clone(),
            name: text(entity, "name")?,
            description: opt_text(entity, "description")?,
            price: float(entity, "price")?,
            category: text(entity, "category")?,
            brand: text(entity, "brand")?,
            sku: text(entity, "sku")?,
            stock_quantity: integer(entity, "stock_quantity")?,
            created_date: timestamp(entity, "created_date")?,
            is_active: boolean(entity, "is_active")?,
        })
    }
}

impl Record for Order {
    const KIND: EntityKind = EntityKind::Order;

    fn key(&self) -> &EntityKey {
        &self.order_id
    }

    fn validate(&self) -> ModelResult<()> {
        if self.user_id.is_empty() {
            return Err(invalid("user_id", "empty reference"));
        }
        if !(self.total_amount > 0.0) {
            return Err(invalid("total_amount", "must be positive"));
        }
        Ok(())
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("user_id".into(), self.user_id.as_str().into());
        fields.insert("order_date".into(), self.order_date.into());
        fields.insert("status".into(), self.status.as_str().into());
        fields.insert("total_amount".into(), round_cents(self.total_amount).into());
        insert_opt(&mut fields, "shipping_address", &self.shipping_address);
        insert_opt(&mut fields, "payment_method", &self.payment_method);
        fields
    }

    fn from_entity(entity: &Entity) -> ModelResult<Self> {
        check_kind(entity, Self::KIND)?;
        Ok(Order {
            order_id: entity.key.clone(),
            user_id: key_field(entity, "user_id")?,
            order_date: timestamp(entity, "order_date")?,
            status: text(entity, "status")?.parse()?,
            total_amount: float(entity, "total_amount")?,
            shipping_address: opt_text(entity, "shipping_address")?,
            payment_method: opt_text(entity, "payment_method")?,
        })
    }
}

impl Record for Review {
    const KIND: EntityKind = EntityKind::Review;

    fn key(&self) -> &EntityKey {
        &self.review_id
    }

    fn validate(&self) -> ModelResult<()> {
        if self.product_id.is_empty() {
            return Err(invalid("product_id", "empty reference"));
        }
        if self.user_id.is_empty() {
            return Err(invalid("user_id", "empty reference"));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(invalid("rating", "must be between 1 and 5"));
        }
        check_len("title", &self.title, 1, 200)?;
        Ok(())
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("product_id".into(), self.product_id.as_str().into());
        fields.insert("user_id".into(), self.user_id.as_str().into());
        fields.insert("rating".into(), self.rating.into());
        fields.insert("title".into(), self.title.as_str().into());
        insert_opt(&mut fields, "comment", &self.comment);
        fields.insert("review_date".into(), self.review_date.into());
        fields.insert("is_verified_purchase".into(), self.is_verified_purchase.into());
        fields
    }

    fn from_entity(entity: &Entity) -> ModelResult<Self> {
        check_kind(entity, Self::KIND)?;
        Ok(Review {
            review_id: entity.key.clone(),
            product_id: key_field(entity, "product_id")?,
            user_id: key_field(entity, "user_id")?,
            rating: integer(entity, "rating")?,
            title: text(entity, "title")?,
            comment: opt_text(entity, "comment")?,
            review_date: timestamp(entity, "review_date")?,
            is_verified_purchase: boolean(entity, "is_verified_purchase")?,
        })
    }
}
