//! In-memory corpus fixtures
//!
//! ```rust,ignore
//! let corpus = CorpusBuilder::new("word", 4)
//!     .node("phrase", [1, 2])
//!     .node_feature("pos", [(1, "noun"), (2, "verb")]);
//! corpus.write_to(dir.path())?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::api::{Api, ApiParts};
use crate::config::TextConfig;
use crate::error::{Result, TapestryError};
use crate::feature::format::{write_feature, FEATURE_EXT};
use crate::feature::{
    EdgeColumn, EdgeMap, FeatureKind, FeatureMeta, Node, NodeColumn, NodeMap, OslotsData,
    OtypeData, RawData, RawFeature, Value, ValueType, OSLOTS, OTEXT, OTYPE,
};
use crate::log::MessageLog;
use crate::prepare::{prepare, PrepareInput};

/// Builds a corpus node by node: slots first, then every other node
/// gets the next free number
#[derive(Clone, Debug)]
pub struct CorpusBuilder {
    otype: NodeMap,
    oslots: EdgeMap,
    features: BTreeMap<String, RawFeature>,
    otext: BTreeMap<String, String>,
}

impl CorpusBuilder {
    pub fn new(slot_type: &str, slots: Node) -> Self {
        Self {
            otype: (1..=slots).map(|n| (n, Value::from(slot_type))).collect(),
            oslots: EdgeMap::new(),
            features: BTreeMap::new(),
            otext: BTreeMap::new(),
        }
    }

    /// Number the next added node will get
    pub fn next_node(&self) -> Node {
        self.otype.keys().next_back().map_or(1, |n| n + 1)
    }

    /// Add a non-slot node linked to the given slots
    pub fn node<I>(mut self, node_type: &str, slots: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        let node = self.next_node();
        self.otype.insert(node, Value::from(node_type));
        let links = self.oslots.entry(node).or_default();
        for slot in slots {
            links.insert(slot, None);
        }
        self
    }

    fn with_node_map<F>(&mut self, name: &str, value_type: ValueType, fill: F)
    where
        F: FnOnce(&mut NodeMap),
    {
        let feature = self
            .features
            .entry(name.to_string())
            .or_insert_with(|| RawFeature {
                meta: FeatureMeta::new(FeatureKind::Node).with_value_type(value_type),
                data: RawData::Node(NodeMap::new()),
            });
        match &mut feature.data {
            RawData::Node(map) => fill(map),
            other => {
                let mut map = NodeMap::new();
                fill(&mut map);
                *other = RawData::Node(map);
            }
        }
    }

    fn with_edge_map<F>(&mut self, name: &str, edge_values: bool, fill: F)
    where
        F: FnOnce(&mut EdgeMap),
    {
        let feature = self
            .features
            .entry(name.to_string())
            .or_insert_with(|| RawFeature {
                meta: FeatureMeta::new(FeatureKind::Edge)
                    .with_edge_values(edge_values)
                    .with_value_type(ValueType::Int),
                data: RawData::Edge(EdgeMap::new()),
            });
        match &mut feature.data {
            RawData::Edge(map) => fill(map),
            other => {
                let mut map = EdgeMap::new();
                fill(&mut map);
                *other = RawData::Edge(map);
            }
        }
    }

    /// Add string values to a node feature
    pub fn node_feature<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (Node, V)>,
        V: Into<Value>,
    {
        self.with_node_map(name, ValueType::Str, |map| {
            for (node, value) in values {
                map.insert(node, value.into());
            }
        });
        self
    }

    /// Add integer values to a node feature
    pub fn int_feature<I>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (Node, i64)>,
    {
        self.with_node_map(name, ValueType::Int, |map| {
            for (node, value) in values {
                map.insert(node, Value::Int(value));
            }
        });
        self
    }

    /// Add edges without values
    pub fn edge_feature<I>(mut self, name: &str, edges: I) -> Self
    where
        I: IntoIterator<Item = (Node, Node)>,
    {
        self.with_edge_map(name, false, |map| {
            for (from, to) in edges {
                map.entry(from).or_default().insert(to, None);
            }
        });
        self
    }

    /// Add edges with integer values
    pub fn valued_edge_feature<I>(mut self, name: &str, edges: I) -> Self
    where
        I: IntoIterator<Item = (Node, Node, i64)>,
    {
        self.with_edge_map(name, true, |map| {
            for (from, to, value) in edges {
                map.entry(from).or_default().insert(to, Some(Value::Int(value)));
            }
        });
        self
    }

    /// Add a metadata entry to the text configuration
    pub fn otext(mut self, key: &str, value: &str) -> Self {
        self.otext.insert(key.to_string(), value.to_string());
        self
    }

    pub fn text_config(&self) -> TextConfig {
        TextConfig::from_meta(&self.otext)
    }

    /// Node types and slot links as loaded structures
    pub fn warp(&self) -> Result<(OtypeData, OslotsData)> {
        let otype = OtypeData::from_column(&NodeColumn::from_map(&self.otype))
            .map_err(|e| TapestryError::Validation(vec![e]))?;
        let oslots = OslotsData::from_column(&EdgeColumn::from_map(&self.oslots, false), &otype)
            .map_err(TapestryError::Validation)?;
        Ok((otype, oslots))
    }

    /// Columns of the named node features that exist
    pub fn columns(&self, names: &[String]) -> BTreeMap<String, Arc<NodeColumn>> {
        names
            .iter()
            .filter_map(|name| match self.features.get(name).map(|f| &f.data) {
                Some(RawData::Node(map)) => {
                    Some((name.clone(), Arc::new(NodeColumn::from_map(map))))
                }
                _ => None,
            })
            .collect()
    }

    /// All features including node types, slot links and text configuration
    pub fn raw_features(&self) -> BTreeMap<String, RawFeature> {
        let mut features = self.features.clone();
        features.insert(
            OTYPE.to_string(),
            RawFeature {
                meta: FeatureMeta::new(FeatureKind::Node),
                data: RawData::Node(self.otype.clone()),
            },
        );
        features.insert(
            OSLOTS.to_string(),
            RawFeature {
                meta: FeatureMeta::new(FeatureKind::Edge),
                data: RawData::Edge(self.oslots.clone()),
            },
        );
        if !self.otext.is_empty() {
            let mut meta = FeatureMeta::new(FeatureKind::Config);
            meta.entries = self.otext.clone();
            features.insert(
                OTEXT.to_string(),
                RawFeature {
                    meta,
                    data: RawData::Config,
                },
            );
        }
        features
    }

    /// Assemble an in-memory API with every feature of the corpus loaded
    /// and all indices computed
    pub fn api(&self) -> Result<Api> {
        let (otype, oslots) = self.warp()?;
        let text = self.text_config();
        let mut node_features = Vec::new();
        let mut edge_features = Vec::new();
        for (name, feature) in &self.features {
            match &feature.data {
                RawData::Node(map) => node_features.push((
                    name.clone(),
                    feature.meta.clone(),
                    Arc::new(NodeColumn::from_map(map)),
                )),
                RawData::Edge(map) => edge_features.push((
                    name.clone(),
                    feature.meta.clone(),
                    Arc::new(EdgeColumn::from_map(map, feature.meta.edge_values)),
                )),
                RawData::Config => {}
            }
        }
        let columns: BTreeMap<String, Arc<NodeColumn>> = node_features
            .iter()
            .map(|(name, _, column)| (name.clone(), column.clone()))
            .collect();
        let mut log = MessageLog::default();
        let computed = prepare(
            &PrepareInput {
                otype: &otype,
                oslots: &oslots,
                text: &text,
                columns: &columns,
                cache: None,
            },
            &mut log,
        );
        Api::assemble(
            ApiParts {
                otype: Arc::new(otype),
                oslots: Arc::new(oslots),
                computed,
                text,
                node_features,
                edge_features,
            },
            &mut log,
        )
    }

    /// Write every feature as a file into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for (name, feature) in self.raw_features() {
            write_feature(&dir.join(format!("{}.{}", name, FEATURE_EXT)), &feature)?;
        }
        Ok(())
    }

    /// Ten words in two sentences: 11 covers 1..=5, 12 covers 6..=10
    pub fn sentences() -> Self {
        Self::new("word", 10)
            .node("sentence", 1..=5)
            .node("sentence", 6..=10)
    }

    /// One book with two chapters of two verses each, eight words, four
    /// phrases and a few features and edges
    ///
    /// ```text
    /// 9  book Genesis            1..=8
    /// 10 chapter 1               1..=4     11 chapter 2    5..=8
    /// 12 verse 1  1,2    13 verse 2  3,4   14 verse 1  5,6   15 verse 2  7,8
    /// 16 phrase Time 1..=3   17 Subj 4   18 Pred 5   19 Objc 6..=8
    /// ```
    pub fn bible() -> Self {
        let words = [
            ("In", "in", "prep"),
            ("the", "the", "art"),
            ("beginning", "beginning", "noun"),
            ("God", "god", "noun"),
            ("created", "create", "verb"),
            ("the", "the", "art"),
            ("heavens", "heaven", "noun"),
            ("earth", "earth", "noun"),
        ];
        let mut corpus = Self::new("word", 8)
            .node("book", 1..=8)
            .node("chapter", 1..=4)
            .node("chapter", 5..=8)
            .node("verse", [1, 2])
            .node("verse", [3, 4])
            .node("verse", [5, 6])
            .node("verse", [7, 8])
            .node("phrase", 1..=3)
            .node("phrase", [4])
            .node("phrase", [5])
            .node("phrase", 6..=8)
            .node_feature("book", [(9, "Genesis")])
            .int_feature("chapter", [(10, 1), (11, 2)])
            .int_feature("verse", [(12, 1), (13, 2), (14, 1), (15, 2)])
            .node_feature(
                "function",
                [(16, "Time"), (17, "Subj"), (18, "Pred"), (19, "Objc")],
            )
            .edge_feature("subject", [(18, 17)])
            .valued_edge_feature("crossref", [(12, 14, 80), (13, 15, 60)])
            .otext("sectionTypes", "book,chapter,verse")
            .otext("sectionFeatures", "book,chapter,verse")
            .otext("structureTypes", "book,chapter")
            .otext("structureFeatures", "book,chapter")
            .otext("fmt:text-orig-full", "{letters}{trailer}")
            .otext("fmt:lex-orig-plain", "{lex} ")
            .otext("fmt:text-phrase-function", "phrase#{function} ");
        for (i, (letters, lex, pos)) in words.iter().enumerate() {
            let node = i as Node + 1;
            let trailer = if node == 8 { "." } else { " " };
            corpus = corpus
                .node_feature("letters", [(node, *letters)])
                .node_feature("lex", [(node, *lex)])
                .node_feature("pos", [(node, *pos)])
                .node_feature("trailer", [(node, trailer)]);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_are_numbered_after_slots() {
        let corpus = CorpusBuilder::sentences();
        assert_eq!(corpus.next_node(), 13);
        let (otype, oslots) = corpus.warp().unwrap();
        assert_eq!(otype.max_slot(), 10);
        assert_eq!(otype.max_node(), 12);
        assert_eq!(oslots.s(12), &[6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_bible_fixture() {
        let corpus = CorpusBuilder::bible();
        let (otype, _) = corpus.warp().unwrap();
        assert_eq!(otype.max_node(), 19);
        assert_eq!(otype.v(16), Some("phrase"));
        let text = corpus.text_config();
        assert!(text.sections_declared());
        assert_eq!(corpus.columns(&text.section_features).len(), 3);
        let features = corpus.raw_features();
        assert!(features.contains_key(OTEXT));
        assert_eq!(features["chapter"].meta.value_type, ValueType::Int);
    }
}
