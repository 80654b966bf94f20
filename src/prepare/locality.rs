//! Embedding relations between nodes
//!
//! `levUp[n]`: every node whose slots include all slots of `n` (other than
//! `n` itself), innermost first.
//! `levDown[n]`: for non-slot `n`, every non-slot node whose slots lie
//! within the slots of `n`, in canonical order.

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use super::order::Rank;
use super::NodeLists;
use crate::feature::{Node, OslotsData, OtypeData};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevUp {
    lists: NodeLists,
}

impl LevUp {
    pub fn compute(otype: &OtypeData, oslots: &OslotsData, rank: &Rank) -> Result<Self, String> {
        let max_slot = otype.max_slot();
        let max_node = otype.max_node();

        // non-slot nodes per slot
        let mut containers = vec![RoaringBitmap::new(); max_slot as usize];
        for node in max_slot + 1..=max_node {
            for &slot in oslots.s(node) {
                let bucket = containers
                    .get_mut(slot as usize - 1)
                    .ok_or_else(|| format!("node {} links to non-slot {}", node, slot))?;
                bucket.insert(node);
            }
        }

        let mut lists = Vec::with_capacity(max_node as usize);
        for node in 1..=max_node {
            let slots = oslots.s(node);
            let mut embedders = match slots.first() {
                Some(&first) => containers[first as usize - 1].clone(),
                None => RoaringBitmap::new(),
            };
            for &slot in slots.iter().skip(1) {
                if embedders.is_empty() {
                    break;
                }
                embedders &= &containers[slot as usize - 1];
            }
            embedders.remove(node);
            let mut ups: Vec<Node> = embedders.iter().collect();
            ups.sort_unstable_by_key(|&m| std::cmp::Reverse(rank.of(m)));
            lists.push(ups);
        }
        Ok(Self {
            lists: NodeLists::from_lists(lists),
        })
    }

    /// Embedders of a node, innermost first
    pub fn get(&self, node: Node) -> &[Node] {
        if node == 0 {
            return &[];
        }
        self.lists.get(node as usize - 1)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevDown {
    max_slot: Node,
    lists: NodeLists,
}

impl LevDown {
    pub fn compute(otype: &OtypeData, lev_up: &LevUp, rank: &Rank) -> Result<Self, String> {
        let max_slot = otype.max_slot();
        let max_node = otype.max_node();
        let mut lists: Vec<Vec<Node>> = vec![Vec::new(); (max_node - max_slot) as usize];
        for node in max_slot + 1..=max_node {
            for &up in lev_up.get(node) {
                if up <= max_slot {
                    return Err(format!("slot {} embeds node {}", up, node));
                }
                lists[(up - max_slot - 1) as usize].push(node);
            }
        }
        for list in &mut lists {
            list.sort_unstable_by_key(|&m| rank.of(m));
        }
        Ok(Self {
            max_slot,
            lists: NodeLists::from_lists(lists),
        })
    }

    /// Non-slot nodes embedded in a node, in canonical order
    pub fn get(&self, node: Node) -> &[Node] {
        if node <= self.max_slot {
            return &[];
        }
        self.lists.get((node - self.max_slot - 1) as usize)
    }
}
