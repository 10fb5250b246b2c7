//! Translation between canonical entities and graph vertices
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision,
//! floats as doubles. Reference fields become incoming [`Link`]s, and
//! references held by other kinds become [`BackRef`]s so that edges appear
//! no matter which endpoint is written first.

use super::property::{PropertyMap, PropertyValue};
use super::store::{BackRef, Link, Mutation};
use super::types::VertexKey;
use super::vertex::Vertex;
use super::{GraphError, GraphResult};
use crate::binding::{EntityBinding, StoreBinding};
use crate::model::{Entity, EntityKind, FieldType, FieldValue};
use chrono::{DateTime, SecondsFormat, Utc};

pub fn vertex_key(binding: &StoreBinding, kind: EntityKind, key: &str) -> VertexKey {
    let entity = binding.for_kind(kind);
    VertexKey::new(entity.vertex_label.as_str(), entity.key_property.as_str(), key)
}

pub fn format_timestamp(ms: i64) -> GraphResult<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| GraphError::Mapping(format!("timestamp {} is out of range", ms)))
}

pub fn parse_timestamp(text: &str) -> GraphResult<i64> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| GraphError::Mapping(format!("bad timestamp {:?}: {}", text, e)))
}

fn to_property(field: &str, expected: FieldType, value: &FieldValue) -> GraphResult<PropertyValue> {
    let property = match (expected, value) {
        (FieldType::Text, FieldValue::Text(s)) => PropertyValue::String(s.clone()),
        (FieldType::Integer, FieldValue::Integer(i)) => PropertyValue::Integer(*i),
        (FieldType::Float, FieldValue::Float(f)) => PropertyValue::Double(*f),
        (FieldType::Boolean, FieldValue::Boolean(b)) => PropertyValue::Boolean(*b),
        (FieldType::Timestamp, FieldValue::Timestamp(ms)) => {
            PropertyValue::String(format_timestamp(*ms)?)
        }
        _ => {
            return Err(GraphError::Mapping(format!(
                "field {} expects {} but got {}",
                field,
                expected.name(),
                value.type_name()
            )))
        }
    };
    Ok(property)
}

fn to_field(field: &str, expected: FieldType, value: &PropertyValue) -> GraphResult<FieldValue> {
    let field_value = match (expected, value) {
        (FieldType::Text, PropertyValue::String(s)) => FieldValue::Text(s.clone()),
        (FieldType::Integer, PropertyValue::Integer(i)) => FieldValue::Integer(*i),
        (FieldType::Float, PropertyValue::Double(d)) => FieldValue::Float(*d),
        (FieldType::Boolean, PropertyValue::Boolean(b)) => FieldValue::Boolean(*b),
        (FieldType::Timestamp, PropertyValue::String(s)) => FieldValue::Timestamp(parse_timestamp(s)?),
        _ => {
            return Err(GraphError::Mapping(format!(
                "property for field {} holds {} where {} was expected",
                field,
                value.property_type(),
                expected.name()
            )))
        }
    };
    Ok(field_value)
}

/// Vertex properties for an entity, checked against its binding
pub fn to_properties(binding: &EntityBinding, entity: &Entity) -> GraphResult<PropertyMap> {
    let mut properties = PropertyMap::new();
    for (name, value) in &entity.fields {
        let field = binding.field(name).ok_or_else(|| {
            GraphError::Mapping(format!("field {} is not bound for {}", name, entity.kind))
        })?;
        properties.insert(
            field.property.clone(),
            to_property(name, field.field_type, value)?,
        );
    }

    if let Some(missing) = binding
        .fields
        .iter()
        .find(|f| f.required && !entity.fields.contains_key(&f.field))
    {
        return Err(GraphError::Mapping(format!(
            "required field {} missing on {}",
            missing.field,
            entity.entity_ref()
        )));
    }

    Ok(properties)
}

/// The upsert mutation that stores `entity` with its relationship edges
pub fn upsert_mutation(binding: &StoreBinding, entity: &Entity) -> GraphResult<Mutation> {
    let entity_binding = binding.for_kind(entity.kind);
    let properties = to_properties(entity_binding, entity)?;

    let links = entity_binding
        .references
        .iter()
        .filter_map(|reference| {
            entity
                .get(&reference.reference_field)
                .and_then(FieldValue::as_text)
                .map(|target| Link {
                    label: reference.edge_label.as_str().into(),
                    from: vertex_key(binding, reference.from_kind, target),
                })
        })
        .collect();

    let backrefs = binding
        .incoming_references(entity.kind)
        .into_iter()
        .filter_map(|(holder, reference)| {
            holder.field(&reference.reference_field).map(|field| BackRef {
                label: reference.edge_label.as_str().into(),
                holder: holder.vertex_label.as_str().into(),
                reference_property: field.property.clone(),
            })
        })
        .collect();

    Ok(Mutation::UpsertVertex {
        key: vertex_key(binding, entity.kind, entity.key.as_str()),
        properties,
        links,
        backrefs,
    })
}

/// Rebuild the canonical entity stored in `vertex`
pub fn to_entity(binding: &StoreBinding, kind: EntityKind, vertex: &Vertex) -> GraphResult<Entity> {
    let entity_binding = binding.for_kind(kind);
    let key = vertex
        .get_property(&entity_binding.key_property)
        .and_then(PropertyValue::as_string)
        .ok_or_else(|| {
            GraphError::Mapping(format!(
                "vertex {:?} has no {} key",
                vertex.id, entity_binding.key_property
            ))
        })?;

    let mut entity = Entity::new(kind, key);
    for (property, value) in &vertex.properties {
        if property == &entity_binding.key_property {
            continue;
        }
        let field = entity_binding.field_by_property(property).ok_or_else(|| {
            GraphError::Mapping(format!("property {} is not bound for {}", property, kind))
        })?;
        entity
            .fields
            .insert(field.field.clone(), to_field(&field.field, field.field_type, value)?);
    }
    Ok(entity)
}
