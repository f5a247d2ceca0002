//! Decoded record values
//!
//! Query results are decoded into [`FieldValue`], which tells graph entities
//! apart from everything else once, at decode time. The mapper then works on
//! this variant instead of probing the shape of driver objects.

use crate::error::{Neo4jError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A graph vertex as returned by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Driver-assigned identity
    pub id: i64,
    /// Labels attached to the node
    pub labels: Vec<String>,
    /// Property map
    pub properties: Map<String, JsonValue>,
}

impl GraphNode {
    /// Create a node with the given identity, labels and properties
    pub fn new<L, S>(id: i64, labels: L, properties: Map<String, JsonValue>) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            labels: labels.into_iter().map(Into::into).collect(),
            properties,
        }
    }

    /// Flattened DTO shape: properties plus `id` and `labels`
    ///
    /// `id` and `labels` are written last and win over properties of the same name.
    pub fn extract(&self) -> JsonValue {
        let mut plain = self.properties.clone();
        plain.insert("id".to_string(), JsonValue::from(self.id));
        plain.insert(
            "labels".to_string(),
            JsonValue::Array(self.labels.iter().cloned().map(JsonValue::String).collect()),
        );
        JsonValue::Object(plain)
    }

    fn to_raw(&self) -> JsonValue {
        serde_json::json!({
            "identity": self.id,
            "labels": self.labels,
            "properties": self.properties,
        })
    }
}

/// A graph edge as returned by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    /// Driver-assigned identity
    pub id: i64,
    /// Identity of the start node
    pub start_node_id: i64,
    /// Identity of the end node
    pub end_node_id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Property map
    pub properties: Map<String, JsonValue>,
}

impl GraphRelationship {
    /// Create a relationship between two node identities
    pub fn new(
        id: i64,
        start_node_id: i64,
        end_node_id: i64,
        rel_type: impl Into<String>,
        properties: Map<String, JsonValue>,
    ) -> Self {
        Self {
            id,
            start_node_id,
            end_node_id,
            rel_type: rel_type.into(),
            properties,
        }
    }

    /// Flattened DTO shape: properties plus `id`
    ///
    /// Type and endpoints are not part of the DTO.
    pub fn extract(&self) -> JsonValue {
        let mut plain = self.properties.clone();
        plain.insert("id".to_string(), JsonValue::from(self.id));
        JsonValue::Object(plain)
    }

    fn to_raw(&self) -> JsonValue {
        serde_json::json!({
            "identity": self.id,
            "start": self.start_node_id,
            "end": self.end_node_id,
            "type": self.rel_type,
            "properties": self.properties,
        })
    }
}

/// Dynamic content of one record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A graph vertex
    Node(GraphNode),
    /// A graph edge
    Relationship(GraphRelationship),
    /// A list of values, possibly holding graph entities
    List(Vec<FieldValue>),
    /// Scalars, maps and anything else without graph identity
    Plain(JsonValue),
}

impl FieldValue {
    /// Shape of the value with no entity flattening applied
    ///
    /// Graph entities keep the driver's structural layout
    /// (`identity`, `labels`/`type`, `properties`).
    pub fn to_raw(&self) -> JsonValue {
        match self {
            FieldValue::Node(node) => node.to_raw(),
            FieldValue::Relationship(rel) => rel.to_raw(),
            FieldValue::List(items) => JsonValue::Array(items.iter().map(FieldValue::to_raw).collect()),
            FieldValue::Plain(value) => value.clone(),
        }
    }

    /// Short name of the variant, used in log and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Node(_) => "node",
            FieldValue::Relationship(_) => "relationship",
            FieldValue::List(_) => "list",
            FieldValue::Plain(_) => "plain",
        }
    }
}

impl From<GraphNode> for FieldValue {
    fn from(node: GraphNode) -> Self {
        FieldValue::Node(node)
    }
}

impl From<GraphRelationship> for FieldValue {
    fn from(rel: GraphRelationship) -> Self {
        FieldValue::Relationship(rel)
    }
}

impl From<JsonValue> for FieldValue {
    fn from(value: JsonValue) -> Self {
        FieldValue::Plain(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// One row of a query result, keyed by field name
pub trait Record {
    /// Fetch a field by name
    ///
    /// Returns [`Neo4jError::MissingField`] when the key is not part of the row.
    fn get(&self, key: &str) -> Result<FieldValue>;
}

/// Record held entirely in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRecord {
    fields: Vec<(String, FieldValue)>,
}

impl MemoryRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any earlier field of the same name
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a field, replacing any earlier field of the same name
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Field names in insertion order
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Record for MemoryRecord {
    fn get(&self, key: &str) -> Result<FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Neo4jError::MissingField(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_node_extract_overrides_id_property() {
        let node = GraphNode::new(7, ["Person"], props(json!({"id": "external", "name": "Ada"})));

        assert_eq!(
            node.extract(),
            json!({"name": "Ada", "id": 7, "labels": ["Person"]})
        );
    }

    #[test]
    fn test_relationship_raw_shape() {
        let rel = GraphRelationship::new(3, 1, 2, "KNOWS", props(json!({"since": 2020})));
        let raw = FieldValue::from(rel).to_raw();

        assert_eq!(raw["identity"], json!(3));
        assert_eq!(raw["type"], json!("KNOWS"));
        assert_eq!(raw["properties"], json!({"since": 2020}));
    }

    #[test]
    fn test_memory_record_access() {
        let record = MemoryRecord::new()
            .with("count", json!(42))
            .with("name", json!("Ada"))
            .with("count", json!(43));

        assert_eq!(record.keys(), vec!["count", "name"]);
        assert_eq!(record.get("count").unwrap(), FieldValue::Plain(json!(43)));
        assert!(matches!(
            record.get("missing"),
            Err(Neo4jError::MissingField(key)) if key == "missing"
        ));
    }
}
