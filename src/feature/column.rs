//! Columnar in-memory storage of loaded features
//!
//! - node features: dictionary encode values to ordinals, dense over the
//!   occupied node range, ordinal 0 meaning "no value"
//! - edge features: sorted forward adjacency plus the inverse adjacency,
//!   both built once at load time

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::types::{EdgeMap, Node, NodeMap, Value};

/// Node feature column with dictionary encoding
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeColumn {
    /// Node of `ordinals[0]`
    first: Node,
    /// Ordinals indexed by `node - first`; 0 for nodes without value
    ordinals: Vec<u32>,
    /// Dictionary: ordinal - 1 -> value
    dictionary: Vec<Value>,
    /// Number of nodes with a value
    count: usize,
    /// Reverse lookup: value -> ordinal, rebuilt after deserialization
    #[serde(skip)]
    lookup: HashMap<Value, u32>,
}

impl NodeColumn {
    pub fn from_map(data: &NodeMap) -> Self {
        let (first, last) = match (data.keys().next(), data.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Self::default(),
        };
        let mut column = Self {
            first,
            ordinals: vec![0; (last - first + 1) as usize],
            dictionary: Vec::new(),
            count: data.len(),
            lookup: HashMap::new(),
        };
        for (&node, value) in data {
            let ordinal = match column.lookup.get(value) {
                Some(&ord) => ord,
                None => {
                    column.dictionary.push(value.clone());
                    let ord = column.dictionary.len() as u32;
                    column.lookup.insert(value.clone(), ord);
                    ord
                }
            };
            column.ordinals[(node - first) as usize] = ordinal;
        }
        column
    }

    /// Highest node the column covers
    pub fn last_node(&self) -> Option<Node> {
        let span = self.ordinals.len().checked_sub(1)?;
        Some(self.first + span as Node)
    }

    /// Restore the reverse lookup after deserialization
    pub fn reindex(&mut self) {
        self.lookup = self
            .dictionary
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as u32 + 1))
            .collect();
    }

    fn ordinal(&self, node: Node) -> u32 {
        if node < self.first {
            return 0;
        }
        self.ordinals
            .get((node - self.first) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn ordinal_of(&self, value: &Value) -> Option<u32> {
        if self.lookup.is_empty() {
            return self
                .dictionary
                .iter()
                .position(|v| v == value)
                .map(|i| i as u32 + 1);
        }
        self.lookup.get(value).copied()
    }

    /// Value of a node
    pub fn get(&self, node: Node) -> Option<&Value> {
        match self.ordinal(node) {
            0 => None,
            ord => self.dictionary.get(ord as usize - 1),
        }
    }

    /// All (node, value) pairs in node order
    pub fn iter(&self) -> impl Iterator<Item = (Node, &Value)> + '_ {
        self.ordinals
            .iter()
            .enumerate()
            .filter(|(_, &ord)| ord != 0)
            .map(move |(i, &ord)| (self.first + i as Node, &self.dictionary[ord as usize - 1]))
    }

    /// Nodes carrying exactly this value, in node order
    pub fn nodes_with(&self, value: &Value) -> Vec<Node> {
        let Some(target) = self.ordinal_of(value) else {
            return Vec::new();
        };
        self.ordinals
            .iter()
            .enumerate()
            .filter(|(_, &ord)| ord == target)
            .map(|(i, _)| self.first + i as Node)
            .collect()
    }

    /// Distinct values
    pub fn values(&self) -> &[Value] {
        &self.dictionary
    }

    /// Value frequencies over the nodes accepted by `keep`,
    /// sorted by descending count, then value
    pub fn value_counts<F>(&self, keep: F) -> Vec<(Value, usize)>
    where
        F: Fn(Node) -> bool,
    {
        let mut counts = vec![0usize; self.dictionary.len()];
        for (i, &ord) in self.ordinals.iter().enumerate() {
            if ord != 0 && keep(self.first + i as Node) {
                counts[ord as usize - 1] += 1;
            }
        }
        let mut freqs: Vec<(Value, usize)> = counts
            .into_iter()
            .enumerate()
            .filter(|(_, c)| *c > 0)
            .map(|(i, c)| (self.dictionary[i].clone(), c))
            .collect();
        freqs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        freqs
    }

    pub fn to_map(&self) -> NodeMap {
        self.iter().map(|(n, v)| (n, v.clone())).collect()
    }

    /// Number of nodes with a value
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Target list of one node: (other node, optional edge value), in node order
pub type Adjacency = Vec<(Node, Option<Value>)>;

/// Edge feature column with forward and inverse adjacency
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EdgeColumn {
    forward: BTreeMap<Node, Adjacency>,
    inverse: BTreeMap<Node, Adjacency>,
    has_values: bool,
    edge_count: usize,
}

impl EdgeColumn {
    pub fn from_map(data: &EdgeMap, has_values: bool) -> Self {
        let mut forward = BTreeMap::new();
        let mut inverse: BTreeMap<Node, Adjacency> = BTreeMap::new();
        let mut edge_count = 0;
        for (&source, targets) in data {
            let mut adjacency = Vec::with_capacity(targets.len());
            for (&target, value) in targets {
                let value = if has_values { value.clone() } else { None };
                inverse
                    .entry(target)
                    .or_default()
                    .push((source, value.clone()));
                adjacency.push((target, value));
                edge_count += 1;
            }
            if !adjacency.is_empty() {
                forward.insert(source, adjacency);
            }
        }
        // sources arrive in ascending order, so inverse lists are sorted already
        Self {
            forward,
            inverse,
            has_values,
            edge_count,
        }
    }

    pub fn has_values(&self) -> bool {
        self.has_values
    }

    /// Highest node at either end of an edge
    pub fn last_node(&self) -> Option<Node> {
        let source = self.forward.keys().next_back();
        let target = self.inverse.keys().next_back();
        source.max(target).copied()
    }

    /// Outgoing edges of a node
    pub fn from_node(&self, node: Node) -> &[(Node, Option<Value>)] {
        self.forward.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of a node
    pub fn to_node(&self, node: Node) -> &[(Node, Option<Value>)] {
        self.inverse.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with outgoing edges, ascending
    pub fn sources(&self) -> impl Iterator<Item = Node> + '_ {
        self.forward.keys().copied()
    }

    /// Nodes with incoming edges, ascending
    pub fn targets(&self) -> impl Iterator<Item = Node> + '_ {
        self.inverse.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Node, &Adjacency)> + '_ {
        self.forward.iter().map(|(&n, adj)| (n, adj))
    }

    /// Number of nodes with outgoing edges
    pub fn source_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    pub fn to_map(&self) -> EdgeMap {
        self.forward
            .iter()
            .map(|(&n, adj)| (n, adj.iter().cloned().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> NodeMap {
        let mut data = NodeMap::new();
        data.insert(3, Value::from("noun"));
        data.insert(4, Value::from("verb"));
        data.insert(5, Value::from("noun"));
        data.insert(8, Value::from("noun"));
        data
    }

    #[test]
    fn test_node_column_lookup() {
        let column = NodeColumn::from_map(&sample_map());
        assert_eq!(column.len(), 4);
        assert_eq!(column.get(1), None);
        assert_eq!(column.get(3), Some(&Value::from("noun")));
        assert_eq!(column.get(6), None);
        assert_eq!(column.get(100), None);
        assert_eq!(column.values().len(), 2);
        assert_eq!(column.nodes_with(&Value::from("noun")), vec![3, 5, 8]);
        assert!(column.nodes_with(&Value::from("adj")).is_empty());
    }

    #[test]
    fn test_node_column_value_counts() {
        let column = NodeColumn::from_map(&sample_map());
        let freqs = column.value_counts(|_| true);
        assert_eq!(freqs[0], (Value::from("noun"), 3));
        assert_eq!(freqs[1], (Value::from("verb"), 1));
        let restricted = column.value_counts(|n| n > 4);
        assert_eq!(restricted, vec![(Value::from("noun"), 2)]);
    }

    #[test]
    fn test_node_column_survives_bincode() {
        let column = NodeColumn::from_map(&sample_map());
        let bytes = bincode::serialize(&column).unwrap();
        let mut back: NodeColumn = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.nodes_with(&Value::from("verb")), vec![4]);
        back.reindex();
        assert_eq!(back.to_map(), sample_map());
    }

    #[test]
    fn test_empty_node_column() {
        let column = NodeColumn::from_map(&NodeMap::new());
        assert!(column.is_empty());
        assert_eq!(column.get(1), None);
        assert_eq!(column.iter().count(), 0);
    }

    #[test]
    fn test_edge_column_inverse() {
        let mut data = EdgeMap::new();
        data.entry(1).or_default().insert(5, Some(Value::Int(1)));
        data.entry(2).or_default().insert(5, Some(Value::Int(2)));
        data.entry(2).or_default().insert(6, None);
        let column = EdgeColumn::from_map(&data, true);
        assert_eq!(column.len(), 3);
        assert_eq!(column.from_node(2).len(), 2);
        assert_eq!(
            column.to_node(5),
            &[(1, Some(Value::Int(1))), (2, Some(Value::Int(2)))]
        );
        assert!(column.from_node(9).is_empty());
        assert_eq!(column.targets().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(column.to_map(), data);
    }

    #[test]
    fn test_edge_column_drops_values_without_flag() {
        let mut data = EdgeMap::new();
        data.entry(1).or_default().insert(2, Some(Value::Int(1)));
        let column = EdgeColumn::from_map(&data, false);
        assert_eq!(column.from_node(1), &[(2, None)]);
    }
}
