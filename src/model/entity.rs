//! Canonical entity, key and scalar field types

use super::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The four coordinated domain entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Product,
    Order,
    Review,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Product,
        EntityKind::Order,
        EntityKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Product => "product",
            EntityKind::Order => "order",
            EntityKind::Review => "review",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "product" | "products" => Ok(EntityKind::Product),
            "order" | "orders" => Ok(EntityKind::Order),
            "review" | "reviews" => Ok(EntityKind::Review),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

/// Process-wide unique entity key (UUID-shaped)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        EntityKey(key.into())
    }

    /// Fresh random v4 key
    pub fn generate() -> Self {
        EntityKey(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        EntityKey(s)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey(s.to_string())
    }
}

/// Kind + key pair identifying one logical entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub key: EntityKey,
}

impl EntityRef {
    pub fn new(kind: EntityKind, key: impl Into<EntityKey>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// Scalar type of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::Timestamp => "Timestamp",
        }
    }
}

/// Scalar field value
///
/// Timestamps are UTC milliseconds, which is the precision both stores keep,
/// so values survive a round trip through either store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
}

impl FieldValue {
    pub fn timestamp(dt: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(dt.timestamp_millis())
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Timestamp(_) => FieldType::Timestamp,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.field_type().name()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, with integers widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            FieldValue::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_timestamp().and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ms) => match DateTime::<Utc>::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "Timestamp({})", ms),
            },
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(dt: DateTime<Utc>) -> Self {
        FieldValue::timestamp(dt)
    }
}

/// Field name -> value. Ordered so encodings and comparisons are stable.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One logical domain entity
///
/// The key is immutable once assigned. Optional attributes are absent from
/// `fields` rather than stored as nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub key: EntityKey,
    pub fields: FieldMap,
}

impl Entity {
    pub fn new(kind: EntityKind, key: impl Into<EntityKey>) -> Self {
        Self {
            kind,
            key: key.into(),
            fields: FieldMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("User".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert_eq!("reviews".parse::<EntityKind>().unwrap(), EntityKind::Review);
        assert!(matches!(
            "vertex".parse::<EntityKind>(),
            Err(ModelError::UnknownKind(_))
        ));
        assert_eq!(format!("{}", EntityKind::Order), "order");
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = EntityKey::generate();
        let b = EntityKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_timestamp_truncates_to_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(1_234_567);
        let value = FieldValue::timestamp(dt);
        assert_eq!(value.as_timestamp(), Some(dt.timestamp_millis()));
        assert_eq!(
            value.as_datetime().unwrap().timestamp_subsec_millis(),
            1
        );
    }

    #[test]
    fn test_entity_builder_and_equality() {
        let a = Entity::new(EntityKind::User, "u1").with_field("username", "alice");
        let mut b = Entity::new(EntityKind::User, "u1");
        b.set_field("username", "alice");
        assert_eq!(a, b);

        b.set_field("is_active", true);
        assert_ne!(a, b);
        assert_eq!(b.get("is_active").and_then(FieldValue::as_boolean), Some(true));
        assert_eq!(format!("{}", b.entity_ref()), "user/u1");
    }

    #[test]
    fn test_float_widening() {
        assert_eq!(FieldValue::Integer(3).as_float(), Some(3.0));
        assert_eq!(FieldValue::Text("x".into()).as_float(), None);
    }
}
