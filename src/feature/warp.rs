//! The two features that define the node space: node types and slot links

use serde::{Deserialize, Serialize};

use super::column::{EdgeColumn, NodeColumn};
use super::types::Node;

/// Node types, dictionary encoded over `1..=max_node`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtypeData {
    types: Vec<String>,
    /// Type code per node, indexed by `node - 1`
    codes: Vec<u16>,
    slot_type: String,
    max_slot: Node,
    max_node: Node,
}

impl OtypeData {
    pub fn from_column(column: &NodeColumn) -> Result<Self, String> {
        let max_node = column
            .iter()
            .map(|(n, _)| n)
            .last()
            .ok_or_else(|| "no node has a type".to_string())?;
        let slot_type = column
            .get(1)
            .map(|v| v.to_string())
            .ok_or_else(|| "node 1 has no type".to_string())?;

        let mut types: Vec<String> = Vec::new();
        let mut codes = Vec::with_capacity(max_node as usize);
        let mut untyped = Vec::new();
        let mut max_slot = 0;
        let mut in_slots = true;
        for node in 1..=max_node {
            let Some(value) = column.get(node) else {
                untyped.push(node);
                codes.push(0);
                continue;
            };
            let name = value.to_string();
            if in_slots && name == slot_type {
                max_slot = node;
            } else {
                in_slots = false;
            }
            let code = match types.iter().position(|t| *t == name) {
                Some(code) => code,
                None => {
                    types.push(name);
                    types.len() - 1
                }
            };
            codes.push(code as u16);
        }
        if !untyped.is_empty() {
            return Err(format!(
                "{} node(s) without type: {}",
                untyped.len(),
                super::validate::make_examples(&untyped)
            ));
        }
        if types.len() > u16::MAX as usize {
            return Err(format!("too many node types: {}", types.len()));
        }
        Ok(Self {
            types,
            codes,
            slot_type,
            max_slot,
            max_node,
        })
    }

    /// Type of a node
    pub fn v(&self, node: Node) -> Option<&str> {
        if node == 0 {
            return None;
        }
        self.codes
            .get(node as usize - 1)
            .and_then(|&code| self.types.get(code as usize))
            .map(String::as_str)
    }

    pub fn slot_type(&self) -> &str {
        &self.slot_type
    }

    pub fn max_slot(&self) -> Node {
        self.max_slot
    }

    pub fn max_node(&self) -> Node {
        self.max_node
    }

    /// Type names in order of first appearance
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_slot(&self, node: Node) -> bool {
        node >= 1 && node <= self.max_slot
    }

    /// Internal code of a type name
    pub fn code_of(&self, name: &str) -> Option<u16> {
        self.types.iter().position(|t| t == name).map(|c| c as u16)
    }

    /// Nodes of a type in node order
    pub fn nodes_of(&self, name: &str) -> impl Iterator<Item = Node> + '_ {
        let code = self.code_of(name);
        self.codes
            .iter()
            .enumerate()
            .filter(move |(_, &c)| Some(c) == code)
            .map(|(i, _)| i as Node + 1)
    }
}

/// Slots of every node as a compressed sparse row array.
/// Slot `n` links to `[n]`, so every node has a non-empty slot list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OslotsData {
    /// `offsets[n - 1]..offsets[n]` delimits the slots of node `n`
    offsets: Vec<u32>,
    slots: Vec<Node>,
}

impl OslotsData {
    /// Build the slot array; fails on any structural defect of the slot links
    pub fn from_column(column: &EdgeColumn, otype: &OtypeData) -> Result<Self, Vec<String>> {
        let problems = super::validate::check_oslots(otype, column);
        if !problems.is_empty() {
            return Err(problems);
        }
        let max_slot = otype.max_slot();
        let mut offsets = Vec::with_capacity(otype.max_node() as usize + 1);
        let mut slots: Vec<Node> = (1..=max_slot).collect();
        offsets.extend(0..=max_slot);
        for node in max_slot + 1..=otype.max_node() {
            slots.extend(column.from_node(node).iter().map(|(s, _)| *s));
            offsets.push(slots.len() as u32);
        }
        Ok(Self { offsets, slots })
    }

    /// Slots of a node, ascending; empty for nodes outside the node space
    pub fn s(&self, node: Node) -> &[Node] {
        if node == 0 || node as usize >= self.offsets.len() {
            return &[];
        }
        let start = self.offsets[node as usize - 1] as usize;
        let end = self.offsets[node as usize] as usize;
        &self.slots[start..end]
    }

    pub fn first_slot(&self, node: Node) -> Option<Node> {
        self.s(node).first().copied()
    }

    pub fn last_slot(&self, node: Node) -> Option<Node> {
        self.s(node).last().copied()
    }

    /// Number of nodes covered
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::types::{EdgeMap, NodeMap, Value};

    fn warp() -> (NodeColumn, EdgeColumn) {
        let mut otype = NodeMap::new();
        for n in 1..=6 {
            otype.insert(n, Value::from("word"));
        }
        otype.insert(7, Value::from("phrase"));
        otype.insert(8, Value::from("phrase"));
        let mut oslots = EdgeMap::new();
        oslots.entry(7).or_default().insert(1, None);
        oslots.entry(7).or_default().insert(3, None);
        oslots.entry(8).or_default().insert(4, None);
        (
            NodeColumn::from_map(&otype),
            EdgeColumn::from_map(&oslots, false),
        )
    }

    #[test]
    fn test_otype_data() {
        let (otype, _) = warp();
        let data = OtypeData::from_column(&otype).unwrap();
        assert_eq!(data.slot_type(), "word");
        assert_eq!(data.max_slot(), 6);
        assert_eq!(data.max_node(), 8);
        assert_eq!(data.v(7), Some("phrase"));
        assert_eq!(data.v(0), None);
        assert_eq!(data.v(9), None);
        assert_eq!(data.nodes_of("phrase").collect::<Vec<_>>(), vec![7, 8]);
    }

    #[test]
    fn test_untyped_nodes_are_rejected() {
        let mut otype = NodeMap::new();
        otype.insert(1, Value::from("word"));
        otype.insert(3, Value::from("word"));
        let err = OtypeData::from_column(&NodeColumn::from_map(&otype)).unwrap_err();
        assert!(err.contains("without type"));
    }

    #[test]
    fn test_oslots_data() {
        let (otype, oslots) = warp();
        let otype = OtypeData::from_column(&otype).unwrap();
        let data = OslotsData::from_column(&oslots, &otype).unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(data.s(2), &[2]);
        assert_eq!(data.s(7), &[1, 3]);
        assert_eq!(data.first_slot(8), Some(4));
        assert_eq!(data.last_slot(7), Some(3));
        assert!(data.s(9).is_empty());
    }
}
