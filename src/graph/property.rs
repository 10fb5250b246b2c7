//! Property value types for graph vertices and edges
//!
//! The graph store knows four property data types, matching the property
//! keys declared through schema management: String, Integer, Double and
//! Boolean. Timestamps are kept as ISO-8601 strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Declared data type of a property key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Integer,
    Double,
    Boolean,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Integer => "Integer",
            PropertyType::Double => "Double",
            PropertyType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Double(d) => write!(f, "{}", d),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Double(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

/// Property map for storing vertex and edge properties
pub type PropertyMap = HashMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_types() {
        assert_eq!(PropertyValue::from("x").property_type(), PropertyType::String);
        assert_eq!(PropertyValue::from(4i64).property_type(), PropertyType::Integer);
        assert_eq!(PropertyValue::from(2.5).property_type(), PropertyType::Double);
        assert_eq!(PropertyValue::from(true).property_type(), PropertyType::Boolean);
    }

    #[test]
    fn test_property_map() {
        let mut props = PropertyMap::new();
        props.insert("username".to_string(), "alice".into());
        props.insert("rating".to_string(), 5i64.into());

        assert_eq!(props.get("username").unwrap().as_string(), Some("alice"));
        assert_eq!(props.get("rating").unwrap().as_integer(), Some(5));
        assert_eq!(props.get("rating").unwrap().as_double(), None);
    }
}
