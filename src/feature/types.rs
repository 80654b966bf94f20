//! Core types for the feature store

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Node number. Slots are `1..=max_slot`, other nodes follow up to `max_node`.
pub type Node = u32;

/// Largest node number a feature file may mention
pub const MAX_NODE: Node = 1 << 28;

/// Name of the node type feature
pub const OTYPE: &str = "otype";
/// Name of the slot containment edge feature
pub const OSLOTS: &str = "oslots";
/// Name of the text configuration feature
pub const OTEXT: &str = "otext";
/// Features every dataset needs, in load order
pub const WARP: [&str; 3] = [OTYPE, OSLOTS, OTEXT];

/// A feature value
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.parse().ok(),
        }
    }

    /// Parse a textual value according to a value type
    pub fn parse(text: &str, value_type: ValueType) -> Option<Value> {
        match value_type {
            ValueType::Int => text.trim().parse().ok().map(Value::Int),
            ValueType::Str => Some(Value::Str(text.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    Str,
    Int,
}

impl ValueType {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "str" => Some(ValueType::Str),
            "int" => Some(ValueType::Int),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Str => "str",
            ValueType::Int => "int",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Node,
    Edge,
    Config,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Node => "node",
            FeatureKind::Edge => "edge",
            FeatureKind::Config => "config",
        }
    }
}

/// Header metadata of a feature file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureMeta {
    pub kind: FeatureKind,
    pub value_type: ValueType,
    /// Edge features only: edges carry values
    pub edge_values: bool,
    /// Free-form `@key=value` entries
    pub entries: BTreeMap<String, String>,
}

impl FeatureMeta {
    pub fn new(kind: FeatureKind) -> Self {
        Self {
            kind,
            value_type: ValueType::Str,
            edge_values: false,
            entries: BTreeMap::new(),
        }
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_edge_values(mut self, edge_values: bool) -> Self {
        self.edge_values = edge_values;
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Node feature data in plain map form, as written and read by the file format
pub type NodeMap = BTreeMap<Node, Value>;

/// Edge feature data in plain map form: source -> target -> optional value
pub type EdgeMap = BTreeMap<Node, BTreeMap<Node, Option<Value>>>;

/// Parsed content of a feature file
#[derive(Clone, Debug, PartialEq)]
pub enum RawData {
    Node(NodeMap),
    Edge(EdgeMap),
    Config,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawFeature {
    pub meta: FeatureMeta,
    pub data: RawData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse("12", ValueType::Int), Some(Value::Int(12)));
        assert_eq!(Value::parse("x", ValueType::Int), None);
        assert_eq!(
            Value::parse("x", ValueType::Str),
            Some(Value::Str("x".to_string()))
        );
    }

    #[test]
    fn test_value_ordering_and_display() {
        let mut values = vec![Value::from("b"), Value::Int(3), Value::from("a")];
        values.sort();
        assert_eq!(values[0], Value::Int(3));
        assert_eq!(values[1].to_string(), "a");
        assert_eq!(Value::from("7").as_int(), Some(7));
    }

    #[test]
    fn test_meta_builder() {
        let meta = FeatureMeta::new(FeatureKind::Edge)
            .with_edge_values(true)
            .with_value_type(ValueType::Int)
            .with_entry("description", "links");
        assert!(meta.edge_values);
        assert_eq!(meta.get("description"), Some("links"));
        assert_eq!(meta.value_type.as_str(), "int");
    }
}
