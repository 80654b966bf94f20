//! Invariant checking framework for loaded datasets
//!
//! Every invariant inspects an `Api` and either passes or reports one
//! `Violation` with a sample of offending nodes.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::api::{Api, ComputedIndex};
use crate::feature::validate::make_examples;
use crate::feature::Node;
use crate::prepare::{Boundary, Levels, Order, Rank};

/// A violation of an invariant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: String,
    pub description: String,
    pub violating_nodes: Vec<Node>,
    pub context: HashMap<String, String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "INVARIANT VIOLATION: {}", self.invariant)?;
        writeln!(f, "  Description: {}", self.description)?;
        writeln!(f, "  Violating nodes: {}", make_examples(&self.violating_nodes))?;
        if !self.context.is_empty() {
            writeln!(f, "  Context:")?;
            let mut keys: Vec<&String> = self.context.keys().collect();
            keys.sort();
            for key in keys {
                writeln!(f, "    {}: {}", key, self.context[key])?;
            }
        }
        Ok(())
    }
}

/// Trait for invariant checkers
pub trait Invariant: Send + Sync {
    /// Name of the invariant
    fn name(&self) -> &str;

    /// Check the invariant against a loaded dataset
    fn check(&self, api: &Api) -> Result<(), Violation>;

    /// Human-readable description
    fn description(&self) -> &str {
        "No description provided"
    }
}

/// Check all invariants and return violations
pub fn check_all_invariants(api: &Api, invariants: &[Box<dyn Invariant>]) -> Vec<Violation> {
    invariants
        .iter()
        .filter_map(|invariant| invariant.check(api).err())
        .collect()
}

fn violation(invariant: &dyn Invariant, description: String, nodes: Vec<Node>) -> Violation {
    Violation {
        invariant: invariant.name().to_string(),
        description,
        violating_nodes: nodes,
        context: HashMap::new(),
    }
}

fn missing_index(invariant: &dyn Invariant, name: &str) -> Violation {
    let mut v = violation(invariant, format!("index {} is not available", name), Vec::new());
    v.context.insert("index".to_string(), name.to_string());
    v
}

fn order_and_rank<'a>(
    invariant: &dyn Invariant,
    api: &'a Api,
) -> Result<(&'a Order, &'a Rank), Violation> {
    let order = match api.computed("order") {
        Some(ComputedIndex::Order(order)) => order,
        _ => return Err(missing_index(invariant, "order")),
    };
    let rank = match api.computed("rank") {
        Some(ComputedIndex::Rank(rank)) => rank,
        _ => return Err(missing_index(invariant, "rank")),
    };
    Ok((order, rank))
}

// ============================================================================
// CONCRETE INVARIANTS
// ============================================================================

/// Invariant: rank is the inverse of order
///
/// The node at position i of the canonical order has rank i.
pub struct RankInvertsOrder;

impl Invariant for RankInvertsOrder {
    fn name(&self) -> &str {
        "RankInvertsOrder"
    }

    fn description(&self) -> &str {
        "rank[n] is the position of n in the canonical order"
    }

    fn check(&self, api: &Api) -> Result<(), Violation> {
        let (order, rank) = order_and_rank(self, api)?;
        let wrong: Vec<Node> = order
            .nodes()
            .iter()
            .enumerate()
            .filter(|(position, &node)| rank.of(node) != *position as u32)
            .map(|(_, &node)| node)
            .collect();
        if !wrong.is_empty() {
            return Err(violation(
                self,
                format!("{} node(s) with a rank other than their position", wrong.len()),
                wrong,
            ));
        }
        Ok(())
    }
}

/// Invariant: the canonical order is a strict total order
///
/// Every node occurs exactly once, and consecutive nodes have strictly
/// increasing keys (first slot, type level, longer span first, node).
pub struct StrictOrder;

impl Invariant for StrictOrder {
    fn name(&self) -> &str {
        "StrictOrder"
    }

    fn description(&self) -> &str {
        "The canonical order lists every node once with strictly increasing keys"
    }

    fn check(&self, api: &Api) -> Result<(), Violation> {
        let (order, _) = order_and_rank(self, api)?;
        let levels: &Levels = match api.computed("levels") {
            Some(ComputedIndex::Levels(levels)) => levels,
            _ => return Err(missing_index(self, "levels")),
        };
        let otype = api.otype();
        let oslots = api.oslots();

        let max_node = otype.max_node();
        let mut seen = HashSet::new();
        let duplicates: Vec<Node> = order
            .nodes()
            .iter()
            .copied()
            .filter(|n| !seen.insert(*n))
            .collect();
        if !duplicates.is_empty() || order.len() != max_node as usize {
            let mut v = violation(
                self,
                format!(
                    "order has {} entries for {} nodes, {} duplicate(s)",
                    order.len(),
                    max_node,
                    duplicates.len()
                ),
                duplicates,
            );
            v.context.insert("max_node".to_string(), max_node.to_string());
            return Err(v);
        }

        let key = |node: Node| {
            let slots = oslots.s(node);
            let level = otype
                .v(node)
                .and_then(|t| levels.rank_of(t))
                .unwrap_or(usize::MAX);
            (
                slots.first().copied().unwrap_or(0),
                level,
                Reverse(slots.last().copied().unwrap_or(0)),
                node,
            )
        };
        let unordered: Vec<Node> = order
            .nodes()
            .windows(2)
            .filter(|pair| key(pair[0]) >= key(pair[1]))
            .map(|pair| pair[1])
            .collect();
        if !unordered.is_empty() {
            return Err(violation(
                self,
                format!("{} node(s) out of canonical order", unordered.len()),
                unordered,
            ));
        }
        Ok(())
    }
}

/// Invariant: slot links are sound and agree with the boundary index
///
/// Every non-slot node has a non-empty, strictly increasing list of slots,
/// and it is registered as starting at its first and ending at its last
/// slot.
pub struct SlotsIncreasing;

impl Invariant for SlotsIncreasing {
    fn name(&self) -> &str {
        "SlotsIncreasing"
    }

    fn description(&self) -> &str {
        "Slots of a node increase strictly and span its boundary"
    }

    fn check(&self, api: &Api) -> Result<(), Violation> {
        let boundary: &Boundary = match api.computed("boundary") {
            Some(ComputedIndex::Boundary(boundary)) => boundary,
            _ => return Err(missing_index(self, "boundary")),
        };
        let otype = api.otype();
        let oslots = api.oslots();
        let mut bad = Vec::new();
        let mut off_boundary = Vec::new();
        for node in otype.max_slot() + 1..=otype.max_node() {
            let slots = oslots.s(node);
            let (Some(&first), Some(&last)) = (slots.first(), slots.last()) else {
                bad.push(node);
                continue;
            };
            if slots.windows(2).any(|w| w[0] >= w[1]) {
                bad.push(node);
                continue;
            }
            if !boundary.starting_at(first).contains(&node)
                || !boundary.ending_at(last).contains(&node)
            {
                off_boundary.push(node);
            }
        }
        if !bad.is_empty() {
            return Err(violation(
                self,
                format!("{} node(s) with empty or unordered slots", bad.len()),
                bad,
            ));
        }
        if !off_boundary.is_empty() {
            return Err(violation(
                self,
                format!(
                    "{} node(s) missing from the boundary of their span",
                    off_boundary.len()
                ),
                off_boundary,
            ));
        }
        Ok(())
    }
}

/// Invariant: up and down navigation agree
///
/// Every node returned by `u(n)` contains all slots of n and has n among
/// its `d` nodes. Datasets without locality pass trivially.
pub struct EmbeddingConsistent;

impl Invariant for EmbeddingConsistent {
    fn name(&self) -> &str {
        "EmbeddingConsistent"
    }

    fn description(&self) -> &str {
        "Embedders contain the slots of the nodes they embed and list them downwards"
    }

    fn check(&self, api: &Api) -> Result<(), Violation> {
        let Ok(locality) = api.locality() else {
            return Ok(());
        };
        let oslots = api.oslots();
        let mut wrong = Vec::new();
        for node in api.nodes().walk() {
            let slots = oslots.s(node);
            for up in locality.u(node, None) {
                let outer = oslots.s(up);
                let contains = slots.iter().all(|s| outer.binary_search(s).is_ok());
                if !contains || !locality.d(up, None).contains(&node) {
                    wrong.push(node);
                    break;
                }
            }
        }
        if !wrong.is_empty() {
            return Err(violation(
                self,
                format!("{} node(s) with inconsistent embedders", wrong.len()),
                wrong,
            ));
        }
        Ok(())
    }
}

/// Invariant: the type hierarchy accounts for every node
///
/// Counts per type add up to the number of nodes, the node range of every
/// type matches `otype`, and the slot type comes last.
pub struct LevelsCoverAllNodes;

impl Invariant for LevelsCoverAllNodes {
    fn name(&self) -> &str {
        "LevelsCoverAllNodes"
    }

    fn description(&self) -> &str {
        "Levels count every node once and put the slot type last"
    }

    fn check(&self, api: &Api) -> Result<(), Violation> {
        let levels: &Levels = match api.computed("levels") {
            Some(ComputedIndex::Levels(levels)) => levels,
            _ => return Err(missing_index(self, "levels")),
        };
        let otype = api.otype();
        let total: usize = levels.entries().iter().map(|e| e.count).sum();
        if total != otype.max_node() as usize {
            let mut v = violation(
                self,
                format!("levels count {} nodes, there are {}", total, otype.max_node()),
                Vec::new(),
            );
            v.context.insert("levels".to_string(), total.to_string());
            return Err(v);
        }
        for entry in levels.entries() {
            if otype.s_interval(&entry.name) != Some((entry.min_node, entry.max_node)) {
                return Err(violation(
                    self,
                    format!("node range of {} differs from otype", entry.name),
                    vec![entry.min_node, entry.max_node],
                ));
            }
        }
        if levels.names().last() != Some(otype.slot_type()) {
            return Err(violation(
                self,
                format!("slot type {} is not the last level", otype.slot_type()),
                Vec::new(),
            ));
        }
        Ok(())
    }
}

/// Get all default invariants
pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(RankInvertsOrder),
        Box::new(StrictOrder),
        Box::new(SlotsIncreasing),
        Box::new(EmbeddingConsistent),
        Box::new(LevelsCoverAllNodes),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_fixtures_satisfy_all_invariants() {
        for corpus in [CorpusBuilder::bible(), CorpusBuilder::sentences()] {
            let api = corpus.api().unwrap();
            let violations = check_all_invariants(&api, &default_invariants());
            assert!(violations.is_empty(), "{:?}", violations);
        }
    }

    #[test]
    fn test_overlapping_nodes() {
        let corpus = CorpusBuilder::new("word", 6)
            .node("clause", [1, 2, 5])
            .node("phrase", [2, 3])
            .node("phrase", [3, 4, 5, 6]);
        let api = corpus.api().unwrap();
        assert!(check_all_invariants(&api, &default_invariants()).is_empty());
    }

    #[test]
    fn test_violation_display() {
        let mut v = violation(&StrictOrder, "2 node(s) out of order".to_string(), vec![3, 4]);
        v.context.insert("max_node".to_string(), "9".to_string());
        let text = v.to_string();
        assert!(text.contains("INVARIANT VIOLATION: StrictOrder"));
        assert!(text.contains("Violating nodes: 3, 4"));
        assert!(text.contains("max_node: 9"));
    }
}
