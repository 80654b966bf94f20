//! Consistency checks of the slot links against the node types

use std::collections::BTreeMap;

use super::column::EdgeColumn;
use super::types::Node;
use super::warp::OtypeData;

/// How many example nodes a message shows
const EXAMPLE_COUNT: usize = 5;

/// Compact sample of a node list: `1, 2, 3, 4, 5 ... and 12 more`
pub fn make_examples(nodes: &[Node]) -> String {
    let shown: Vec<String> = nodes
        .iter()
        .take(EXAMPLE_COUNT)
        .map(Node::to_string)
        .collect();
    let mut rep = shown.join(", ");
    if nodes.len() > EXAMPLE_COUNT {
        rep.push_str(&format!(" ... and {} more", nodes.len() - EXAMPLE_COUNT));
    }
    rep
}

fn grouped(otype: &OtypeData, nodes: Vec<Node>, what: &str) -> Vec<String> {
    let mut by_type: BTreeMap<String, Vec<Node>> = BTreeMap::new();
    for node in nodes {
        let name = otype.v(node).unwrap_or("?").to_string();
        by_type.entry(name).or_default().push(node);
    }
    by_type
        .into_iter()
        .map(|(name, nodes)| {
            format!(
                "{} {} node(s) {}: {}",
                nodes.len(),
                name,
                what,
                make_examples(&nodes)
            )
        })
        .collect()
}

/// Check the slot links; returns one message per problem, empty when sound
///
/// - slot nodes must not be linked to slots
/// - no links from nodes beyond the node space ("fake" nodes)
/// - links only point to slots
/// - every non-slot node is linked
pub fn check_oslots(otype: &OtypeData, oslots: &EdgeColumn) -> Vec<String> {
    let max_slot = otype.max_slot();
    let max_node = otype.max_node();
    let mut problems = Vec::new();

    let mut mapped_slots = Vec::new();
    let mut fake = Vec::new();
    let mut bad_targets = Vec::new();
    for (node, targets) in oslots.iter() {
        if node <= max_slot {
            mapped_slots.push(node);
        } else if node > max_node {
            fake.push(node);
        }
        if targets.iter().any(|(s, _)| *s == 0 || *s > max_slot) {
            bad_targets.push(node);
        }
    }
    problems.extend(grouped(otype, mapped_slots, "linked to slots although slots themselves"));
    if !fake.is_empty() {
        problems.push(format!(
            "{} node(s) beyond the maximal node {} linked to slots: {}",
            fake.len(),
            max_node,
            make_examples(&fake)
        ));
    }
    if !bad_targets.is_empty() {
        problems.push(format!(
            "{} node(s) linked to non-slot nodes: {}",
            bad_targets.len(),
            make_examples(&bad_targets)
        ));
    }

    let unmapped: Vec<Node> = (max_slot + 1..=max_node)
        .filter(|&n| oslots.from_node(n).is_empty())
        .collect();
    problems.extend(grouped(otype, unmapped, "not linked to slots"));
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::column::NodeColumn;
    use crate::feature::types::{EdgeMap, NodeMap, Value};

    fn otype() -> OtypeData {
        let mut map = NodeMap::new();
        for n in 1..=4 {
            map.insert(n, Value::from("word"));
        }
        map.insert(5, Value::from("phrase"));
        map.insert(6, Value::from("phrase"));
        map.insert(7, Value::from("clause"));
        OtypeData::from_column(&NodeColumn::from_map(&map)).unwrap()
    }

    #[test]
    fn test_make_examples() {
        assert_eq!(make_examples(&[1, 2]), "1, 2");
        assert_eq!(
            make_examples(&[1, 2, 3, 4, 5, 6, 7]),
            "1, 2, 3, 4, 5 ... and 2 more"
        );
    }

    #[test]
    fn test_sound_links() {
        let mut map = EdgeMap::new();
        for (node, slot) in [(5, 1), (6, 3), (7, 1), (7, 2)] {
            map.entry(node).or_default().insert(slot, None);
        }
        assert!(check_oslots(&otype(), &EdgeColumn::from_map(&map, false)).is_empty());
    }

    #[test]
    fn test_problems_are_grouped_by_type() {
        let mut map = EdgeMap::new();
        for (node, slot) in [(2, 1), (5, 1), (9, 2), (5, 6)] {
            map.entry(node).or_default().insert(slot, None);
        }
        let problems = check_oslots(&otype(), &EdgeColumn::from_map(&map, false));
        assert_eq!(problems.len(), 5);
        assert!(problems[0].starts_with("1 word node(s) linked to slots"));
        assert!(problems[1].contains("beyond the maximal node 7"));
        assert!(problems[2].contains("linked to non-slot nodes: 5"));
        assert_eq!(problems[3], "1 clause node(s) not linked to slots: 7");
        assert_eq!(problems[4], "1 phrase node(s) not linked to slots: 6");
    }
}
