//! Nodes by the slot where they start and the slot where they end

use serde::{Deserialize, Serialize};

use super::order::Rank;
use super::NodeLists;
use crate::feature::{Node, OslotsData, OtypeData};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    /// Per slot: nodes whose first slot it is, innermost first
    starting: NodeLists,
    /// Per slot: nodes whose last slot it is, outermost first
    ending: NodeLists,
}

impl Boundary {
    pub fn compute(otype: &OtypeData, oslots: &OslotsData, rank: &Rank) -> Result<Self, String> {
        let max_slot = otype.max_slot() as usize;
        let mut starting: Vec<Vec<Node>> = vec![Vec::new(); max_slot];
        let mut ending: Vec<Vec<Node>> = vec![Vec::new(); max_slot];
        for node in 1..=otype.max_node() {
            let slots = oslots.s(node);
            let (first, last) = match (slots.first(), slots.last()) {
                (Some(&first), Some(&last)) => (first as usize, last as usize),
                _ => return Err(format!("node {} has no slots", node)),
            };
            if first == 0 || last > max_slot {
                return Err(format!("node {} has slots outside 1..={}", node, max_slot));
            }
            starting[first - 1].push(node);
            ending[last - 1].push(node);
        }
        for list in &mut starting {
            list.sort_unstable_by_key(|&m| std::cmp::Reverse(rank.of(m)));
        }
        for list in &mut ending {
            list.sort_unstable_by_key(|&m| rank.of(m));
        }
        Ok(Self {
            starting: NodeLists::from_lists(starting),
            ending: NodeLists::from_lists(ending),
        })
    }

    /// Nodes starting at a slot
    pub fn starting_at(&self, slot: Node) -> &[Node] {
        if slot == 0 {
            return &[];
        }
        self.starting.get(slot as usize - 1)
    }

    /// Nodes ending at a slot
    pub fn ending_at(&self, slot: Node) -> &[Node] {
        if slot == 0 {
            return &[];
        }
        self.ending.get(slot as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::levels::Levels;
    use crate::prepare::order::Order;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_boundaries() {
        let corpus = CorpusBuilder::sentences().node("clause", [1, 2]);
        let (otype, oslots) = corpus.warp().unwrap();
        let levels = Levels::compute(&otype, &oslots).unwrap();
        let order = Order::compute(&otype, &oslots, &levels).unwrap();
        let rank = Rank::compute(&order).unwrap();
        let boundary = Boundary::compute(&otype, &oslots, &rank).unwrap();

        assert_eq!(boundary.starting_at(1), &[1, 13, 11]);
        assert_eq!(boundary.ending_at(5), &[11, 5]);
        assert_eq!(boundary.ending_at(2), &[13, 2]);
        assert_eq!(boundary.starting_at(6), &[6, 12]);
        assert!(boundary.starting_at(11).is_empty());
    }
}
