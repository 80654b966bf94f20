//! Structure: nested headings of arbitrary depth
//!
//! A heading is the path of (type, value) pairs from a top level structure
//! node down to the node itself. The structural parent of a node is the
//! nearest structure node that embeds it and precedes it in canonical order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::locality::LevUp;
use super::order::Rank;
use crate::config::TextConfig;
use crate::feature::{Node, NodeColumn, OtypeData, Value};

/// Path of (node type, heading value) pairs, outermost first
pub type Heading = Vec<(String, Value)>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub types: Vec<String>,
    pub features: Vec<String>,
    pub hd_from_nd: BTreeMap<Node, Heading>,
    pub nd_from_hd: BTreeMap<Heading, Node>,
    /// Headings that belong to more than one node, with all those nodes
    pub hd_mult: BTreeMap<Heading, Vec<Node>>,
    pub hd_top: Vec<Node>,
    pub hd_up: BTreeMap<Node, Node>,
    pub hd_down: BTreeMap<Node, Vec<Node>>,
}

impl Structure {
    pub fn compute(
        otype: &OtypeData,
        rank: &Rank,
        lev_up: &LevUp,
        text: &TextConfig,
        columns: &BTreeMap<String, Arc<NodeColumn>>,
    ) -> Result<Self, String> {
        let types = text.structure_types.clone();
        let features = text.structure_features.clone();
        if types.len() != features.len() {
            return Err(format!(
                "{} structure types but {} structure features",
                types.len(),
                features.len()
            ));
        }
        let mut column_of: BTreeMap<&str, &NodeColumn> = BTreeMap::new();
        for (t, f) in types.iter().zip(&features) {
            if otype.code_of(t).is_none() {
                return Err(format!("structure type {} does not occur", t));
            }
            let column = columns
                .get(f)
                .ok_or_else(|| format!("structure feature {} not loaded", f))?;
            column_of.insert(t.as_str(), column.as_ref());
        }

        // structure nodes with their own heading part, in canonical order
        let mut parts: BTreeMap<Node, (String, Value)> = BTreeMap::new();
        for (t, column) in &column_of {
            for node in otype.nodes_of(t) {
                if let Some(value) = column.get(node) {
                    parts.insert(node, (t.to_string(), value.clone()));
                }
            }
        }
        let mut nodes: Vec<Node> = parts.keys().copied().collect();
        nodes.sort_unstable_by_key(|&n| rank.of(n));

        let mut structure = Self {
            types,
            features,
            hd_from_nd: BTreeMap::new(),
            nd_from_hd: BTreeMap::new(),
            hd_mult: BTreeMap::new(),
            hd_top: Vec::new(),
            hd_up: BTreeMap::new(),
            hd_down: BTreeMap::new(),
        };
        for node in nodes {
            let own_rank = rank.of(node);
            let parent = lev_up
                .get(node)
                .iter()
                .copied()
                .find(|m| parts.contains_key(m) && rank.of(*m) < own_rank);
            let mut heading = match parent {
                Some(p) => {
                    structure.hd_up.insert(node, p);
                    structure.hd_down.entry(p).or_default().push(node);
                    structure.hd_from_nd.get(&p).cloned().unwrap_or_default()
                }
                None => {
                    structure.hd_top.push(node);
                    Vec::new()
                }
            };
            if let Some(part) = parts.get(&node) {
                heading.push(part.clone());
            }
            if let Some(&first) = structure.nd_from_hd.get(&heading) {
                structure
                    .hd_mult
                    .entry(heading.clone())
                    .or_insert_with(|| vec![first])
                    .push(node);
            } else {
                structure.nd_from_hd.insert(heading.clone(), node);
            }
            structure.hd_from_nd.insert(node, heading);
        }
        Ok(structure)
    }

    pub fn is_structural_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// `book:Genesis-chapter:2`
    pub fn heading_rep(heading: &Heading) -> String {
        heading
            .iter()
            .map(|(t, v)| format!("{}:{}", t, v))
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MessageLog;
    use crate::prepare::{prepare, PrepareInput};
    use crate::testing::CorpusBuilder;

    fn structure_of(corpus: &CorpusBuilder) -> Arc<Structure> {
        let (otype, oslots) = corpus.warp().unwrap();
        let text = corpus.text_config();
        let columns = corpus.columns(&text.structure_features);
        let input = PrepareInput {
            otype: &otype,
            oslots: &oslots,
            text: &text,
            columns: &columns,
            cache: None,
        };
        prepare(&input, &mut MessageLog::default())
            .structure
            .unwrap()
    }

    #[test]
    fn test_headings_and_tree() {
        let structure = structure_of(&CorpusBuilder::bible());
        assert_eq!(structure.hd_top, vec![9]);
        assert_eq!(structure.hd_down[&9], vec![10, 11]);
        assert_eq!(structure.hd_up[&11], 9);
        let heading = &structure.hd_from_nd[&11];
        assert_eq!(Structure::heading_rep(heading), "book:Genesis-chapter:2");
        assert_eq!(structure.nd_from_hd[heading], 11);
        assert!(structure.hd_mult.is_empty());
    }

    #[test]
    fn test_duplicate_headings_are_reported() {
        let corpus = CorpusBuilder::new("word", 4)
            .node("book", [1, 2, 3, 4])
            .node("chapter", [1, 2])
            .node("chapter", [3, 4])
            .node_feature("book", [(5, "Ruth")])
            .int_feature("chapter", [(6, 1), (7, 1)])
            .otext("structureTypes", "book,chapter")
            .otext("structureFeatures", "book,chapter");
        let structure = structure_of(&corpus);
        let heading = structure.hd_from_nd[&7].clone();
        assert_eq!(Structure::heading_rep(&heading), "book:Ruth-chapter:1");
        assert_eq!(structure.hd_mult[&heading], vec![6, 7]);
        assert_eq!(structure.nd_from_hd[&heading], 6);
        assert_eq!(structure.hd_down[&5], vec![6, 7]);
    }
}
