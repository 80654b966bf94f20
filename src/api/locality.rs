//! Navigation between embedding, embedded and neighbouring nodes

use std::collections::BTreeSet;

use crate::feature::{Node, OslotsData, OtypeData};
use crate::prepare::{Boundary, LevDown, LevUp, Rank};

#[derive(Clone, Copy)]
pub struct Locality<'a> {
    pub(crate) otype: &'a OtypeData,
    pub(crate) oslots: &'a OslotsData,
    pub(crate) lev_up: &'a LevUp,
    pub(crate) lev_down: &'a LevDown,
    pub(crate) boundary: &'a Boundary,
    pub(crate) rank: &'a Rank,
}

impl<'a> Locality<'a> {
    fn has_type(&self, node: Node, node_type: Option<&str>) -> bool {
        node_type.map_or(true, |t| self.otype.v(node) == Some(t))
    }

    fn canonical(&self, mut nodes: Vec<Node>) -> Vec<Node> {
        nodes.sort_unstable_by_key(|&n| self.rank.of(n));
        nodes
    }

    /// Embedders of a node, innermost first
    pub fn u(&self, node: Node, node_type: Option<&str>) -> Vec<Node> {
        self.lev_up
            .get(node)
            .iter()
            .copied()
            .filter(|&m| self.has_type(m, node_type))
            .collect()
    }

    /// Nodes embedded in a node, slots included, in canonical order
    pub fn d(&self, node: Node, node_type: Option<&str>) -> Vec<Node> {
        if self.otype.is_slot(node) {
            return Vec::new();
        }
        let slot_type = self.otype.slot_type();
        match node_type {
            Some(t) if t == slot_type => self.oslots.s(node).to_vec(),
            Some(t) => self
                .lev_down
                .get(node)
                .iter()
                .copied()
                .filter(|&m| self.otype.v(m) == Some(t))
                .collect(),
            None => {
                let mut nodes = self.lev_down.get(node).to_vec();
                nodes.extend_from_slice(self.oslots.s(node));
                self.canonical(nodes)
            }
        }
    }

    /// Nodes ending right before the node starts
    pub fn p(&self, node: Node, node_type: Option<&str>) -> Vec<Node> {
        let Some(first) = self.oslots.first_slot(node) else {
            return Vec::new();
        };
        if first <= 1 {
            return Vec::new();
        }
        let nodes = self
            .boundary
            .ending_at(first - 1)
            .iter()
            .copied()
            .filter(|&m| self.has_type(m, node_type))
            .collect();
        self.canonical(nodes)
    }

    /// Nodes starting right after the node ends
    pub fn n(&self, node: Node, node_type: Option<&str>) -> Vec<Node> {
        let Some(last) = self.oslots.last_slot(node) else {
            return Vec::new();
        };
        if last >= self.otype.max_slot() {
            return Vec::new();
        }
        let nodes = self
            .boundary
            .starting_at(last + 1)
            .iter()
            .copied()
            .filter(|&m| self.has_type(m, node_type))
            .collect();
        self.canonical(nodes)
    }

    /// Nodes whose first slot is `slot`, in canonical order
    pub fn starting_at(&self, slot: Node) -> Vec<Node> {
        self.canonical(self.boundary.starting_at(slot).to_vec())
    }

    /// Nodes whose last slot is `slot`, in canonical order
    pub fn ending_at(&self, slot: Node) -> Vec<Node> {
        self.canonical(self.boundary.ending_at(slot).to_vec())
    }

    /// Nodes sharing at least one slot with the node, other than itself
    pub fn i(&self, node: Node, node_type: Option<&str>) -> Vec<Node> {
        let mut found: BTreeSet<Node> = BTreeSet::new();
        for &slot in self.oslots.s(node) {
            found.insert(slot);
            found.extend(self.lev_up.get(slot).iter().copied());
        }
        found.remove(&node);
        let nodes = found
            .into_iter()
            .filter(|&m| self.has_type(m, node_type))
            .collect();
        self.canonical(nodes)
    }
}
