//! Canonical ordering of nodes, tuples and slot chunks

use std::cmp::{Ordering, Reverse};

use crate::feature::{Node, OtypeData};
use crate::prepare::{Levels, Order, Rank};

/// A node together with a slot range `(first, last)` it covers
pub type Chunk = (Node, (Node, Node));

#[derive(Clone, Copy)]
pub struct Nodes<'a> {
    pub(crate) otype: &'a OtypeData,
    pub(crate) levels: &'a Levels,
    pub(crate) order: &'a Order,
    pub(crate) rank: &'a Rank,
}

impl<'a> Nodes<'a> {
    /// Sort key of a node: its canonical position
    pub fn sort_key(&self, node: Node) -> u32 {
        self.rank.of(node)
    }

    /// Sort key of a tuple of nodes
    pub fn sort_key_tuple(&self, nodes: &[Node]) -> Vec<u32> {
        nodes.iter().map(|&n| self.rank.of(n)).collect()
    }

    /// Chunks by position: earlier start first, then longer first,
    /// then canonical node order
    pub fn sort_key_chunk(&self, chunk: &Chunk) -> (Node, Reverse<Node>, u32) {
        let (node, (first, last)) = *chunk;
        (first, Reverse(last), self.rank.of(node))
    }

    /// Chunks by length: longer first, then earlier start, then
    /// canonical node order
    pub fn sort_key_chunk_length(&self, chunk: &Chunk) -> (Reverse<Node>, Node, u32) {
        let (node, (first, last)) = *chunk;
        (Reverse(last.saturating_sub(first)), first, self.rank.of(node))
    }

    /// Position comparator for chunks
    pub fn before_position(&self, a: &Chunk, b: &Chunk) -> Ordering {
        self.sort_key_chunk(a).cmp(&self.sort_key_chunk(b))
    }

    /// Length comparator for chunks
    pub fn before_length(&self, a: &Chunk, b: &Chunk) -> Ordering {
        self.sort_key_chunk_length(a)
            .cmp(&self.sort_key_chunk_length(b))
    }

    /// Sort nodes canonically
    pub fn sort_nodes<I>(&self, nodes: I) -> Vec<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_unstable_by_key(|&n| self.rank.of(n));
        nodes
    }

    /// All nodes in canonical order
    pub fn walk(&self) -> impl Iterator<Item = Node> + 'a {
        self.order.nodes().iter().copied()
    }

    /// Rank of a type counted from the slot type upwards: the slot type is 0,
    /// the broadest type highest
    pub fn otype_rank(&self, node_type: &str) -> Option<usize> {
        let position = self.levels.rank_of(node_type)?;
        Some(self.levels.entries().len() - 1 - position)
    }

    /// Whether `a` precedes `b` canonically
    pub fn precedes(&self, a: Node, b: Node) -> bool {
        self.rank.of(a) < self.rank.of(b)
    }

    pub fn otype(&self) -> &'a OtypeData {
        self.otype
    }
}
