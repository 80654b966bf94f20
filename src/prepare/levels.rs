//! Type hierarchy: node types ordered from broad to narrow

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feature::{Node, OslotsData, OtypeData};

/// Statistics of one node type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub name: String,
    /// Average number of slots per node
    pub avg_slots: f64,
    pub min_node: Node,
    pub max_node: Node,
    pub count: usize,
}

/// Node types by descending average slot count, the slot type last
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    entries: Vec<LevelInfo>,
}

impl Levels {
    pub fn compute(otype: &OtypeData, oslots: &OslotsData) -> Result<Self, String> {
        if otype.max_slot() == 0 {
            return Err("there are no slots".to_string());
        }
        let mut stats: BTreeMap<&str, (u64, Node, Node, usize)> = BTreeMap::new();
        for node in 1..=otype.max_node() {
            let name = otype
                .v(node)
                .ok_or_else(|| format!("node {} has no type", node))?;
            let slots = oslots.s(node).len() as u64;
            let entry = stats.entry(name).or_insert((0, node, node, 0));
            entry.0 += slots;
            entry.2 = node;
            entry.3 += 1;
        }

        let slot_type = otype.slot_type();
        let mut entries: Vec<LevelInfo> = stats
            .into_iter()
            .map(|(name, (total, min_node, max_node, count))| LevelInfo {
                name: name.to_string(),
                avg_slots: total as f64 / count as f64,
                min_node,
                max_node,
                count,
            })
            .collect();
        entries.sort_by(|a, b| {
            let a_slot = a.name == slot_type;
            let b_slot = b.name == slot_type;
            a_slot
                .cmp(&b_slot)
                .then_with(|| b.avg_slots.total_cmp(&a.avg_slots))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LevelInfo] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&LevelInfo> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Position of a type in the hierarchy; 0 is the broadest type
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Hierarchy position per type code of `otype`
    pub fn rank_table(&self, otype: &OtypeData) -> Vec<usize> {
        otype
            .types()
            .iter()
            .map(|t| self.rank_of(t).unwrap_or(self.entries.len()))
            .collect()
    }

    /// Type names, broad to narrow
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_levels_of_nested_corpus() {
        let corpus = CorpusBuilder::new("word", 6)
            .node("phrase", [1, 2])
            .node("phrase", [3])
            .node("phrase", [4, 5, 6])
            .node("sentence", [1, 2, 3, 4, 5, 6])
            .node("clause", [1, 2, 3])
            .node("clause", [4, 5, 6]);
        let (otype, oslots) = corpus.warp().unwrap();
        let levels = Levels::compute(&otype, &oslots).unwrap();
        let names: Vec<&str> = levels.names().collect();
        assert_eq!(names, vec!["sentence", "clause", "phrase", "word"]);
        let phrase = levels.get("phrase").unwrap();
        assert_eq!(phrase.count, 3);
        assert_eq!(phrase.avg_slots, 2.0);
        assert_eq!((phrase.min_node, phrase.max_node), (7, 9));
        assert_eq!(levels.rank_of("word"), Some(3));
    }

    #[test]
    fn test_equal_averages_sort_by_name() {
        let corpus = CorpusBuilder::new("w", 2).node("b", [1]).node("a", [2]);
        let (otype, oslots) = corpus.warp().unwrap();
        let levels = Levels::compute(&otype, &oslots).unwrap();
        assert_eq!(levels.names().collect::<Vec<_>>(), vec!["a", "b", "w"]);
    }
}
