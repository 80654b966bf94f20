//! API facade
//!
//! One `Api` value holds everything that was loaded and computed for a
//! feature set: the node space, the derived indices and a registry of node
//! and edge features by name. Views borrow from it:
//! - `otype()`, `oslots()`: node types and slot links
//! - `nodes()`: canonical ordering
//! - `locality()`: up, down, previous, next, intersecting
//! - `text()`: text formats, sections and structure
//!
//! The facade is immutable; loading another feature set builds a new one.

pub mod features;
pub mod locality;
pub mod nodes;
pub mod text;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::TextConfig;
use crate::error::{Result, TapestryError};
use crate::feature::{EdgeColumn, FeatureMeta, NodeColumn, OslotsData, OtypeData};
use crate::log::MessageLog;
use crate::prepare::{
    Boundary, Computed, ComputedKind, LevDown, LevUp, Levels, Order, Rank, Sections, Structure,
};

pub use features::{EdgeFeature, NodeFeature, Oslots, Otype};
pub use locality::Locality;
pub use nodes::{Chunk, Nodes};
pub use text::{CompiledFormat, StructureInfo, StructureTree, Text, DEFAULT_FORMAT};

/// Everything an `Api` is assembled from
pub struct ApiParts {
    pub otype: Arc<OtypeData>,
    pub oslots: Arc<OslotsData>,
    pub computed: Computed,
    pub text: TextConfig,
    pub node_features: Vec<(String, FeatureMeta, Arc<NodeColumn>)>,
    pub edge_features: Vec<(String, FeatureMeta, Arc<EdgeColumn>)>,
}

/// A derived index looked up by name
#[derive(Clone, Copy, Debug)]
pub enum ComputedIndex<'a> {
    Levels(&'a Levels),
    Order(&'a Order),
    Rank(&'a Rank),
    LevUp(&'a LevUp),
    LevDown(&'a LevDown),
    Boundary(&'a Boundary),
    Sections(&'a Sections),
    Structure(&'a Structure),
}

pub struct Api {
    pub(crate) otype: Arc<OtypeData>,
    pub(crate) oslots: Arc<OslotsData>,
    pub(crate) computed: Computed,
    levels: Arc<Levels>,
    order: Arc<Order>,
    rank: Arc<Rank>,
    text_config: TextConfig,
    node_features: BTreeMap<String, NodeFeature>,
    edge_features: BTreeMap<String, EdgeFeature>,
    pub(crate) formats: BTreeMap<String, CompiledFormat>,
    /// Node type -> name of its default format
    pub(crate) default_formats: BTreeMap<String, String>,
}

impl Api {
    /// Assemble the facade. Fails when the base indices (levels, order,
    /// rank) could not be built.
    pub fn assemble(parts: ApiParts, log: &mut MessageLog) -> Result<Self> {
        let ApiParts {
            otype,
            oslots,
            computed,
            text,
            node_features,
            edge_features,
        } = parts;
        let unavailable = |kind: ComputedKind| TapestryError::IndexUnavailable(kind.name().to_string());
        let levels = computed.levels.clone().ok_or_else(|| unavailable(ComputedKind::Levels))?;
        let order = computed.order.clone().ok_or_else(|| unavailable(ComputedKind::Order))?;
        let rank = computed.rank.clone().ok_or_else(|| unavailable(ComputedKind::Rank))?;

        let node_features: BTreeMap<String, NodeFeature> = node_features
            .into_iter()
            .map(|(name, meta, column)| {
                let feature =
                    NodeFeature::new(name.clone(), meta, column, otype.clone(), rank.clone());
                (name, feature)
            })
            .collect();
        let edge_features = edge_features
            .into_iter()
            .map(|(name, meta, column)| {
                let feature =
                    EdgeFeature::new(name.clone(), meta, column, otype.clone(), rank.clone());
                (name, feature)
            })
            .collect();

        let types = otype.types().to_vec();
        let mut formats = BTreeMap::new();
        let mut default_formats = BTreeMap::new();
        for (name, raw) in &text.formats {
            let format = match CompiledFormat::parse(name, raw, &types, otype.slot_type()) {
                Ok(format) => format,
                Err(err) => {
                    log.warning(format!("text format {}: {}", name, err));
                    continue;
                }
            };
            let missing: Vec<String> = format
                .features()
                .into_iter()
                .filter(|f| !node_features.contains_key(f))
                .collect();
            if !missing.is_empty() {
                log.warning(format!(
                    "text format {} uses features that are not loaded: {}",
                    name,
                    missing.join(", ")
                ));
            }
            if let Some(node_type) = format.default_for(&types) {
                default_formats.insert(node_type.to_string(), name.clone());
            }
            formats.insert(name.clone(), format);
        }

        Ok(Self {
            otype,
            oslots,
            computed,
            levels,
            order,
            rank,
            text_config: text,
            node_features,
            edge_features,
            formats,
            default_formats,
        })
    }

    pub fn otype(&self) -> Otype<'_> {
        Otype {
            data: &self.otype,
            levels: &self.levels,
            rank: &self.rank,
        }
    }

    pub fn oslots(&self) -> Oslots<'_> {
        Oslots { data: &self.oslots }
    }

    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            otype: &self.otype,
            levels: &self.levels,
            order: &self.order,
            rank: &self.rank,
        }
    }

    /// Locality navigation; unavailable when levUp, levDown or boundary
    /// could not be built
    pub fn locality(&self) -> Result<Locality<'_>> {
        let missing = |name: &str| TapestryError::IndexUnavailable(name.to_string());
        Ok(Locality {
            otype: &self.otype,
            oslots: &self.oslots,
            lev_up: self.computed.lev_up.as_deref().ok_or_else(|| missing("levUp"))?,
            lev_down: self
                .computed
                .lev_down
                .as_deref()
                .ok_or_else(|| missing("levDown"))?,
            boundary: self
                .computed
                .boundary
                .as_deref()
                .ok_or_else(|| missing("boundary"))?,
            rank: &self.rank,
        })
    }

    pub fn text(&self) -> Text<'_> {
        Text { api: self }
    }

    pub fn node_feature(&self, name: &str) -> Option<&NodeFeature> {
        self.node_features.get(name)
    }

    pub fn edge_feature(&self, name: &str) -> Option<&EdgeFeature> {
        self.edge_features.get(name)
    }

    pub fn computed(&self, name: &str) -> Option<ComputedIndex<'_>> {
        let c = &self.computed;
        match ComputedKind::from_name(name)? {
            ComputedKind::Levels => c.levels.as_deref().map(ComputedIndex::Levels),
            ComputedKind::Order => c.order.as_deref().map(ComputedIndex::Order),
            ComputedKind::Rank => c.rank.as_deref().map(ComputedIndex::Rank),
            ComputedKind::LevUp => c.lev_up.as_deref().map(ComputedIndex::LevUp),
            ComputedKind::LevDown => c.lev_down.as_deref().map(ComputedIndex::LevDown),
            ComputedKind::Boundary => c.boundary.as_deref().map(ComputedIndex::Boundary),
            ComputedKind::Sections => c.sections.as_deref().map(ComputedIndex::Sections),
            ComputedKind::Structure => c.structure.as_deref().map(ComputedIndex::Structure),
        }
    }

    /// Names of the loaded node features, `otype` included
    pub fn all_node_features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.node_features.keys().map(String::as_str).collect();
        names.push(crate::feature::OTYPE);
        names.sort_unstable();
        names
    }

    /// Names of the loaded edge features, `oslots` included
    pub fn all_edge_features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.edge_features.keys().map(String::as_str).collect();
        names.push(crate::feature::OSLOTS);
        names.sort_unstable();
        names
    }

    pub fn all_computed(&self) -> Vec<&'static str> {
        self.computed.available()
    }

    pub fn computed_status(&self) -> &Computed {
        &self.computed
    }

    pub fn text_config(&self) -> &TextConfig {
        &self.text_config
    }

    pub fn sections_ok(&self) -> bool {
        self.computed.sections_ok()
    }

    pub fn structure_ok(&self) -> bool {
        self.computed.structure_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Value;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_registry() {
        let api = CorpusBuilder::bible().api().unwrap();
        assert!(api.node_feature("lex").is_some());
        assert!(api.node_feature("nope").is_none());
        assert!(api.edge_feature("crossref").unwrap().has_values());
        assert!(api.all_node_features().contains(&"otype"));
        assert!(api.all_edge_features().contains(&"oslots"));
        assert_eq!(api.all_computed().len(), 8);
        assert!(matches!(api.computed("levUp"), Some(ComputedIndex::LevUp(_))));
        assert!(api.computed("bogus").is_none());
    }

    #[test]
    fn test_otype_and_features() {
        let api = CorpusBuilder::bible().api().unwrap();
        let otype = api.otype();
        assert_eq!(otype.all(), vec!["book", "chapter", "phrase", "verse", "word"]);
        assert_eq!(otype.s("chapter"), vec![10, 11]);
        assert_eq!(otype.s_interval("verse"), Some((12, 15)));
        assert_eq!(api.oslots().s(16), &[1, 2, 3]);

        let pos = api.node_feature("pos").unwrap();
        assert_eq!(pos.v(5), Some(&Value::from("verb")));
        assert_eq!(pos.s(&Value::from("art")), vec![2, 6]);
        assert_eq!(pos.freq_list(None)[0], (Value::from("noun"), 4));

        let crossref = api.edge_feature("crossref").unwrap();
        assert_eq!(crossref.f(12), vec![(14, Some(Value::Int(80)))]);
        assert_eq!(crossref.t(15), vec![(13, Some(Value::Int(60)))]);
        assert_eq!(crossref.b(14), vec![(12, Some(Value::Int(80)))]);
        assert_eq!(crossref.freq_list(Some(&["verse"]), None).len(), 2);
        let subject = api.edge_feature("subject").unwrap();
        assert_eq!(subject.f_nodes(18), vec![17]);
        assert_eq!(subject.freq_list(None, None), vec![(None, 1)]);
    }

    #[test]
    fn test_nodes() {
        let api = CorpusBuilder::sentences().api().unwrap();
        let nodes = api.nodes();
        let walked: Vec<_> = nodes.walk().collect();
        assert_eq!(walked, vec![11, 1, 2, 3, 4, 5, 12, 6, 7, 8, 9, 10]);
        assert!(nodes.precedes(11, 1));
        assert_eq!(nodes.sort_nodes([6, 12, 1, 11]), vec![11, 1, 12, 6]);
        assert_eq!(nodes.otype_rank("word"), Some(0));
        assert_eq!(nodes.otype_rank("sentence"), Some(1));
        assert!(nodes.sort_key_tuple(&[11, 1]) < nodes.sort_key_tuple(&[11, 2]));

        let a: Chunk = (11, (1, 5));
        let b: Chunk = (3, (3, 3));
        assert_eq!(nodes.before_position(&a, &b), std::cmp::Ordering::Less);
        let c: Chunk = (12, (6, 10));
        assert_eq!(nodes.before_length(&b, &c), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_locality() {
        let api = CorpusBuilder::bible().api().unwrap();
        let l = api.locality().unwrap();
        assert_eq!(l.u(5, None), vec![14, 18, 11, 9]);
        assert_eq!(l.u(5, Some("chapter")), vec![11]);
        assert_eq!(l.d(11, None), vec![18, 14, 5, 19, 6, 15, 7, 8]);
        assert_eq!(l.d(11, Some("verse")), vec![14, 15]);
        assert_eq!(l.d(11, Some("word")), vec![5, 6, 7, 8]);
        assert!(l.d(3, None).is_empty());
        assert_eq!(l.p(11, Some("chapter")), vec![10]);
        assert_eq!(l.p(14, None), vec![10, 13, 17, 4]);
        assert_eq!(l.n(10, Some("verse")), vec![14]);
        assert!(l.n(9, None).is_empty());
        assert_eq!(l.i(16, Some("verse")), vec![12, 13]);
    }
}
