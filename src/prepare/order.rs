//! Canonical node order and its inverse
//!
//! Nodes are sorted by
//! 1. first slot, ascending
//! 2. type hierarchy position, broad types first
//! 3. last slot, descending (longer spans first)
//! 4. node number, ascending
//!
//! The node number makes the key unique, so the order is strict.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::levels::Levels;
use crate::feature::{Node, OslotsData, OtypeData};

/// All nodes in canonical order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    nodes: Vec<Node>,
}

impl Order {
    pub fn compute(otype: &OtypeData, oslots: &OslotsData, levels: &Levels) -> Result<Self, String> {
        let table = levels.rank_table(otype);
        let mut keyed = Vec::with_capacity(otype.max_node() as usize);
        for node in 1..=otype.max_node() {
            let slots = oslots.s(node);
            let (first, last) = match (slots.first(), slots.last()) {
                (Some(&first), Some(&last)) => (first, last),
                _ => return Err(format!("node {} has no slots", node)),
            };
            let level = otype
                .v(node)
                .and_then(|t| otype.code_of(t))
                .and_then(|code| table.get(code as usize).copied())
                .ok_or_else(|| format!("node {} has no type", node))?;
            keyed.push(((first, level, Reverse(last), node), node));
        }
        keyed.sort_unstable_by_key(|(key, _)| *key);
        Ok(Self {
            nodes: keyed.into_iter().map(|(_, n)| n).collect(),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Position of every node in the canonical order: `rank[n - 1]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    ranks: Vec<u32>,
}

impl Rank {
    pub fn compute(order: &Order) -> Result<Self, String> {
        let mut ranks = vec![u32::MAX; order.len()];
        for (position, &node) in order.nodes().iter().enumerate() {
            let slot = ranks
                .get_mut(node as usize - 1)
                .ok_or_else(|| format!("node {} outside the node range", node))?;
            if *slot != u32::MAX {
                return Err(format!("node {} occurs twice in the order", node));
            }
            *slot = position as u32;
        }
        Ok(Self { ranks })
    }

    /// Canonical position of a node; `u32::MAX` outside the node range
    pub fn of(&self, node: Node) -> u32 {
        if node == 0 {
            return u32::MAX;
        }
        self.ranks
            .get(node as usize - 1)
            .copied()
            .unwrap_or(u32::MAX)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.ranks
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    fn order_of(corpus: &CorpusBuilder) -> (Order, Rank) {
        let (otype, oslots) = corpus.warp().unwrap();
        let levels = Levels::compute(&otype, &oslots).unwrap();
        let order = Order::compute(&otype, &oslots, &levels).unwrap();
        let rank = Rank::compute(&order).unwrap();
        (order, rank)
    }

    #[test]
    fn test_sentences_precede_their_words() {
        let (order, rank) = order_of(&CorpusBuilder::sentences());
        assert_eq!(
            order.nodes(),
            &[11, 1, 2, 3, 4, 5, 12, 6, 7, 8, 9, 10]
        );
        assert_eq!(rank.of(11), 0);
        assert_eq!(rank.of(1), 1);
        assert_eq!(rank.of(12), 6);
        for (position, &node) in order.nodes().iter().enumerate() {
            assert_eq!(rank.of(node) as usize, position);
        }
    }

    #[test]
    fn test_longer_spans_first_within_a_type() {
        let corpus = CorpusBuilder::new("w", 4)
            .node("phrase", [2, 3])
            .node("phrase", [2, 3, 4])
            .node("phrase", [2, 3]);
        let (order, _) = order_of(&corpus);
        assert_eq!(order.nodes(), &[1, 6, 5, 7, 2, 3, 4]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let corpus = CorpusBuilder::sentences().node("clause", [3, 4, 5]);
        let (a, ra) = order_of(&corpus);
        let (b, rb) = order_of(&corpus);
        assert_eq!(a, b);
        assert_eq!(ra, rb);
        assert_eq!(bincode::serialize(&a).unwrap(), bincode::serialize(&b).unwrap());
    }
}
