//! Section lookup: up to three levels of headings (book, chapter, verse)

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::locality::LevUp;
use crate::config::TextConfig;
use crate::feature::{Node, NodeColumn, OtypeData, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sections {
    types: Vec<String>,
    features: Vec<String>,
    /// Level 0 heading -> level 0 node
    top: BTreeMap<Value, Node>,
    /// Level 0 node -> level 1 heading -> level 1 node
    sec1: BTreeMap<Node, BTreeMap<Value, Node>>,
    /// Level 0 node -> level 1 heading -> level 2 heading -> level 2 node
    sec2: BTreeMap<Node, BTreeMap<Value, BTreeMap<Value, Node>>>,
}

impl Sections {
    pub fn compute(
        otype: &OtypeData,
        lev_up: &LevUp,
        text: &TextConfig,
        columns: &BTreeMap<String, Arc<NodeColumn>>,
    ) -> Result<Self, String> {
        let types = text.section_types.clone();
        let features = text.section_features.clone();
        if types.len() != features.len() {
            return Err(format!(
                "{} section types but {} section features",
                types.len(),
                features.len()
            ));
        }
        for t in &types {
            if otype.code_of(t).is_none() {
                return Err(format!("section type {} does not occur", t));
            }
        }
        let cols: Vec<&NodeColumn> = features
            .iter()
            .map(|f| {
                columns
                    .get(f)
                    .map(Arc::as_ref)
                    .ok_or_else(|| format!("section feature {} not loaded", f))
            })
            .collect::<Result<_, _>>()?;

        let up_of = |node: Node, t: &str| -> Option<Node> {
            lev_up.get(node).iter().copied().find(|&m| otype.v(m) == Some(t))
        };

        let mut top = BTreeMap::new();
        for node in otype.nodes_of(&types[0]) {
            if let Some(heading) = cols[0].get(node) {
                top.entry(heading.clone()).or_insert(node);
            }
        }

        let mut sec1: BTreeMap<Node, BTreeMap<Value, Node>> = BTreeMap::new();
        if types.len() > 1 {
            for n1 in otype.nodes_of(&types[1]) {
                let (Some(n0), Some(h1)) = (up_of(n1, &types[0]), cols[1].get(n1)) else {
                    continue;
                };
                sec1.entry(n0).or_default().entry(h1.clone()).or_insert(n1);
            }
        }

        let mut sec2: BTreeMap<Node, BTreeMap<Value, BTreeMap<Value, Node>>> = BTreeMap::new();
        if types.len() > 2 {
            for n2 in otype.nodes_of(&types[2]) {
                let (Some(n0), Some(n1)) = (up_of(n2, &types[0]), up_of(n2, &types[1])) else {
                    continue;
                };
                let (Some(h1), Some(h2)) = (cols[1].get(n1), cols[2].get(n2)) else {
                    continue;
                };
                sec2.entry(n0)
                    .or_default()
                    .entry(h1.clone())
                    .or_default()
                    .entry(h2.clone())
                    .or_insert(n2);
            }
        }

        Ok(Self {
            types,
            features,
            top,
            sec1,
            sec2,
        })
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Level 0 node with this heading
    pub fn top_node(&self, heading: &Value) -> Option<Node> {
        self.top.get(heading).copied()
    }

    /// Node of a section given by one, two or three headings
    pub fn node_from_headings(&self, headings: &[Value]) -> Option<Node> {
        let n0 = self.top_node(headings.first()?)?;
        match headings {
            [_] => Some(n0),
            [_, h1] => self.sec1.get(&n0)?.get(h1).copied(),
            [_, h1, h2] => self.sec2.get(&n0)?.get(h1)?.get(h2).copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::{prepare, PrepareInput};
    use crate::log::MessageLog;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_three_levels() {
        let corpus = CorpusBuilder::bible();
        let (otype, oslots) = corpus.warp().unwrap();
        let text = corpus.text_config();
        let columns = corpus.columns(&text.section_features);
        let input = PrepareInput {
            otype: &otype,
            oslots: &oslots,
            text: &text,
            columns: &columns,
            cache: None,
        };
        let computed = prepare(&input, &mut MessageLog::default());
        let sections = computed.sections.unwrap();

        let genesis = Value::from("Genesis");
        let book = sections.node_from_headings(&[genesis.clone()]).unwrap();
        assert_eq!(otype.v(book), Some("book"));
        let chapter = sections
            .node_from_headings(&[genesis.clone(), Value::Int(2)])
            .unwrap();
        assert_eq!(otype.v(chapter), Some("chapter"));
        let verse = sections
            .node_from_headings(&[genesis.clone(), Value::Int(2), Value::Int(1)])
            .unwrap();
        assert_eq!(otype.v(verse), Some("verse"));
        assert_eq!(
            sections.node_from_headings(&[genesis, Value::Int(9)]),
            None
        );
        assert_eq!(sections.node_from_headings(&[Value::from("Exodus")]), None);
    }

    #[test]
    fn test_mismatched_declarations_fail() {
        let corpus = CorpusBuilder::bible();
        let (otype, oslots) = corpus.warp().unwrap();
        let mut text = corpus.text_config();
        text.section_features.pop();
        let columns = corpus.columns(&text.section_features);
        let input = PrepareInput {
            otype: &otype,
            oslots: &oslots,
            text: &text,
            columns: &columns,
            cache: None,
        };
        let computed = prepare(&input, &mut MessageLog::default());
        assert!(!computed.sections_ok());
        assert!(computed.base_ok());
    }
}
