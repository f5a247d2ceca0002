//! Record-to-DTO mapping
//!
//! A record field holding a node becomes its properties plus `id` and
//! `labels`; a relationship becomes its properties plus `id`; anything else is
//! passed through in its plain shape. The result is then handed to a
//! [`DtoConstructor`], or returned as a `serde_json::Value` when none is given.
//!
//! ```
//! use ouroboros_neo4j::mapper::{map, map_with, DtoConstructor};
//! use ouroboros_neo4j::{GraphNode, MemoryRecord};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Person {
//!     id: i64,
//!     name: String,
//! }
//!
//! let mut props = serde_json::Map::new();
//! props.insert("name".to_string(), json!("Ada"));
//! let record = MemoryRecord::new().with("p", GraphNode::new(7, ["Person"], props));
//!
//! assert_eq!(
//!     map(&record, "p").unwrap(),
//!     json!({"name": "Ada", "id": 7, "labels": ["Person"]})
//! );
//!
//! let person: Person = map_with(&record, "p", &DtoConstructor::deserialize()).unwrap();
//! assert_eq!((person.id, person.name.as_str()), (7, "Ada"));
//! ```

use crate::error::{Neo4jError, Result};
use crate::value::{FieldValue, Record};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Factory turning plain extracted data into a typed value
pub struct DtoConstructor<T> {
    build: Box<dyn Fn(JsonValue) -> Result<T> + Send + Sync>,
}

impl<T> DtoConstructor<T> {
    /// Wrap a custom factory
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(JsonValue) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
        }
    }

    /// Build a value from plain data
    pub fn construct(&self, plain: JsonValue) -> Result<T> {
        (self.build)(plain)
    }
}

impl DtoConstructor<JsonValue> {
    /// Return the plain data unchanged
    pub fn identity() -> Self {
        Self::new(Ok)
    }
}

impl<T: DeserializeOwned + 'static> DtoConstructor<T> {
    /// Build `T` through its `Deserialize` implementation
    pub fn deserialize() -> Self {
        Self::new(|plain| {
            serde_json::from_value(plain).map_err(|e| {
                Neo4jError::MappingError(format!(
                    "Failed to construct {}: {}",
                    std::any::type_name::<T>(),
                    e
                ))
            })
        })
    }
}

impl<T> fmt::Debug for DtoConstructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtoConstructor")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

/// Map one field to its plain DTO shape
pub fn map<R: Record + ?Sized>(record: &R, key: &str) -> Result<JsonValue> {
    map_with(record, key, &DtoConstructor::identity())
}

/// Map one field through `dto`
pub fn map_with<R, T>(record: &R, key: &str, dto: &DtoConstructor<T>) -> Result<T>
where
    R: Record + ?Sized,
{
    let entry = record.get(key)?;
    let plain = match &entry {
        FieldValue::Node(node) => node.extract(),
        FieldValue::Relationship(rel) => rel.extract(),
        other => other.to_raw(),
    };
    dto.construct(plain)
}

/// Map a list field to plain DTO shapes
pub fn map_array<R: Record + ?Sized>(record: &R, key: &str) -> Result<Vec<JsonValue>> {
    map_array_with(record, key, &DtoConstructor::identity())
}

/// Map a list field element by element through `dto`
///
/// The first element decides how the whole list is treated: when it is a
/// node every element is extracted as a node, when it is a relationship every
/// element is extracted as a relationship, otherwise every element is passed
/// through in its plain shape. Lists are assumed homogeneous; elements are
/// not inspected individually. An empty list takes the plain path and yields
/// an empty vector. A field that is not a list is a [`Neo4jError::MappingError`].
pub fn map_array_with<R, T>(record: &R, key: &str, dto: &DtoConstructor<T>) -> Result<Vec<T>>
where
    R: Record + ?Sized,
{
    let items = match record.get(key)? {
        FieldValue::List(items) => items,
        other => {
            return Err(Neo4jError::MappingError(format!(
                "Field '{}' holds a {} value, expected a list",
                key,
                other.kind()
            )))
        }
    };

    let extract: fn(&FieldValue) -> JsonValue = match items.first() {
        Some(FieldValue::Node(_)) => extract_as_node,
        Some(FieldValue::Relationship(_)) => extract_as_relationship,
        _ => FieldValue::to_raw,
    };

    items
        .iter()
        .map(|item| dto.construct(extract(item)))
        .collect()
}

/// Node rule applied without checking the element
///
/// Elements lacking labels or identity get `null` in their place.
fn extract_as_node(item: &FieldValue) -> JsonValue {
    match item {
        FieldValue::Node(node) => node.extract(),
        other => {
            let (mut plain, id) = properties_and_id(other);
            plain.insert("id".to_string(), id);
            plain.insert("labels".to_string(), JsonValue::Null);
            JsonValue::Object(plain)
        }
    }
}

/// Relationship rule applied without checking the element
fn extract_as_relationship(item: &FieldValue) -> JsonValue {
    match item {
        FieldValue::Relationship(rel) => rel.extract(),
        other => {
            let (mut plain, id) = properties_and_id(other);
            plain.insert("id".to_string(), id);
            JsonValue::Object(plain)
        }
    }
}

fn properties_and_id(item: &FieldValue) -> (Map<String, JsonValue>, JsonValue) {
    match item {
        FieldValue::Node(node) => (node.properties.clone(), JsonValue::from(node.id)),
        FieldValue::Relationship(rel) => (rel.properties.clone(), JsonValue::from(rel.id)),
        FieldValue::Plain(JsonValue::Object(map)) => (map.clone(), JsonValue::Null),
        _ => (Map::new(), JsonValue::Null),
    }
}
