//! Typed accessors for node types, slot links, node features and edge features
//!
//! Everything that returns several nodes returns them in canonical order.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::feature::{
    EdgeColumn, FeatureMeta, Node, NodeColumn, OslotsData, OtypeData, Value,
};
use crate::prepare::{Levels, Rank};

/// Node types
#[derive(Clone, Copy)]
pub struct Otype<'a> {
    pub(crate) data: &'a OtypeData,
    pub(crate) levels: &'a Levels,
    pub(crate) rank: &'a Rank,
}

impl<'a> Otype<'a> {
    /// Type of a node
    pub fn v(&self, node: Node) -> Option<&'a str> {
        self.data.v(node)
    }

    /// Nodes of a type, in canonical order
    pub fn s(&self, node_type: &str) -> Vec<Node> {
        let mut nodes: Vec<Node> = match self.s_interval(node_type) {
            Some((min, max)) => (min..=max)
                .filter(|&n| self.data.v(n) == Some(node_type))
                .collect(),
            None => Vec::new(),
        };
        nodes.sort_unstable_by_key(|&n| self.rank.of(n));
        nodes
    }

    /// Lowest and highest node of a type
    pub fn s_interval(&self, node_type: &str) -> Option<(Node, Node)> {
        self.levels
            .get(node_type)
            .map(|info| (info.min_node, info.max_node))
    }

    /// All node types, broad to narrow
    pub fn all(&self) -> Vec<&'a str> {
        self.levels.names().collect()
    }

    pub fn slot_type(&self) -> &'a str {
        self.data.slot_type()
    }

    pub fn max_slot(&self) -> Node {
        self.data.max_slot()
    }

    pub fn max_node(&self) -> Node {
        self.data.max_node()
    }

    /// Number of nodes per type, broad to narrow
    pub fn freq_list(&self) -> Vec<(&'a str, usize)> {
        self.levels
            .entries()
            .iter()
            .map(|info| (info.name.as_str(), info.count))
            .collect()
    }
}

/// Slot links
#[derive(Clone, Copy)]
pub struct Oslots<'a> {
    pub(crate) data: &'a OslotsData,
}

impl<'a> Oslots<'a> {
    /// Slots of a node, ascending; a slot yields itself
    pub fn s(&self, node: Node) -> &'a [Node] {
        self.data.s(node)
    }
}

/// A loaded node feature
#[derive(Clone, Debug)]
pub struct NodeFeature {
    name: String,
    meta: FeatureMeta,
    column: Arc<NodeColumn>,
    otype: Arc<OtypeData>,
    rank: Arc<Rank>,
}

impl NodeFeature {
    pub fn new(
        name: impl Into<String>,
        meta: FeatureMeta,
        column: Arc<NodeColumn>,
        otype: Arc<OtypeData>,
        rank: Arc<Rank>,
    ) -> Self {
        Self {
            name: name.into(),
            meta,
            column,
            otype,
            rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &FeatureMeta {
        &self.meta
    }

    /// Value of a node
    pub fn v(&self, node: Node) -> Option<&Value> {
        self.column.get(node)
    }

    /// Nodes with a given value, in canonical order
    pub fn s(&self, value: &Value) -> Vec<Node> {
        let mut nodes = self.column.nodes_with(value);
        nodes.sort_unstable_by_key(|&n| self.rank.of(n));
        nodes
    }

    /// Value frequencies, optionally restricted to nodes of some types;
    /// most frequent first
    pub fn freq_list(&self, node_types: Option<&[&str]>) -> Vec<(Value, usize)> {
        match node_types {
            None => self.column.value_counts(|_| true),
            Some(types) => self
                .column
                .value_counts(|n| self.otype.v(n).is_some_and(|t| types.contains(&t))),
        }
    }

    /// All (node, value) pairs in node order
    pub fn items(&self) -> impl Iterator<Item = (Node, &Value)> + '_ {
        self.column.iter()
    }

    pub fn column(&self) -> &NodeColumn {
        &self.column
    }

    /// Number of nodes with a value
    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }
}

/// A loaded edge feature
#[derive(Clone, Debug)]
pub struct EdgeFeature {
    name: String,
    meta: FeatureMeta,
    column: Arc<EdgeColumn>,
    otype: Arc<OtypeData>,
    rank: Arc<Rank>,
}

impl EdgeFeature {
    pub fn new(
        name: impl Into<String>,
        meta: FeatureMeta,
        column: Arc<EdgeColumn>,
        otype: Arc<OtypeData>,
        rank: Arc<Rank>,
    ) -> Self {
        Self {
            name: name.into(),
            meta,
            column,
            otype,
            rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &FeatureMeta {
        &self.meta
    }

    pub fn has_values(&self) -> bool {
        self.column.has_values()
    }

    fn ranked(&self, edges: &[(Node, Option<Value>)]) -> Vec<(Node, Option<Value>)> {
        let mut edges = edges.to_vec();
        edges.sort_by_key(|(n, _)| self.rank.of(*n));
        edges
    }

    /// Edges going out of a node
    pub fn f(&self, node: Node) -> Vec<(Node, Option<Value>)> {
        self.ranked(self.column.from_node(node))
    }

    /// Edges coming into a node
    pub fn t(&self, node: Node) -> Vec<(Node, Option<Value>)> {
        self.ranked(self.column.to_node(node))
    }

    /// Edges in both directions; for a node linked both ways the outgoing
    /// edge wins
    pub fn b(&self, node: Node) -> Vec<(Node, Option<Value>)> {
        let mut merged: BTreeMap<Node, Option<Value>> = BTreeMap::new();
        for (n, v) in self.column.to_node(node) {
            merged.insert(*n, v.clone());
        }
        for (n, v) in self.column.from_node(node) {
            merged.insert(*n, v.clone());
        }
        let mut edges: Vec<(Node, Option<Value>)> = merged.into_iter().collect();
        edges.sort_by_key(|(n, _)| self.rank.of(*n));
        edges
    }

    /// Targets of the outgoing edges, without values
    pub fn f_nodes(&self, node: Node) -> Vec<Node> {
        self.f(node).into_iter().map(|(n, _)| n).collect()
    }

    /// Sources of the incoming edges, without values
    pub fn t_nodes(&self, node: Node) -> Vec<Node> {
        self.t(node).into_iter().map(|(n, _)| n).collect()
    }

    /// Edge value frequencies, optionally restricted by the types of the
    /// nodes at both ends. Edges without a value count under `None`.
    pub fn freq_list(
        &self,
        from_types: Option<&[&str]>,
        to_types: Option<&[&str]>,
    ) -> Vec<(Option<Value>, usize)> {
        let accept = |node: Node, types: Option<&[&str]>| match types {
            None => true,
            Some(types) => self.otype.v(node).is_some_and(|t| types.contains(&t)),
        };
        let mut counts: BTreeMap<Option<Value>, usize> = BTreeMap::new();
        for (from, edges) in self.column.iter() {
            if !accept(from, from_types) {
                continue;
            }
            for (to, value) in edges {
                if accept(*to, to_types) {
                    *counts.entry(value.clone()).or_default() += 1;
                }
            }
        }
        let mut freqs: Vec<(Option<Value>, usize)> = counts.into_iter().collect();
        freqs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        freqs
    }

    pub fn column(&self) -> &EdgeColumn {
        &self.column
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }
}
