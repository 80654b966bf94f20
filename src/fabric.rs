//! Loading, saving and searching a feature set
//!
//! A `Fabric` owns the feature store of a dataset, the node space built
//! from `otype` and `oslots`, the derived indices and the current `Api`.
//! Every call logs into the fabric's `MessageLog`; `load` reports failure
//! by returning `None`, partial failures leave `is_good()` false.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roaring::RoaringBitmap;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::{Api, ApiParts, CompiledFormat};
use crate::config::{FabricConfig, SearchSettings, TextConfig};
use crate::error::{Result, TapestryError};
use crate::feature::cache::{clear_cache, combine_fingerprints, source_fingerprint};
use crate::feature::format::{write_feature, FEATURE_EXT};
use crate::feature::validate::check_oslots;
use crate::feature::{
    EdgeColumn, FeatureData, FeatureKind, FeatureStore, Node, NodeColumn, OslotsData,
    OtypeData, RawData, RawFeature, OSLOTS, OTEXT, OTYPE, WARP,
};
use crate::log::MessageLog;
use crate::prepare::{prepare, CacheTarget, Computed, PrepareInput};
use crate::search::{Search, Sets, Tuple};

/// Features of a dataset by kind, as reported by `explore`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FeatureOverview {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub configs: Vec<String>,
    pub computed: Vec<String>,
}

struct Warp {
    otype: Arc<OtypeData>,
    oslots: Arc<OslotsData>,
    text: TextConfig,
    /// Features the text API needs: section, structure and format features
    text_features: BTreeSet<String>,
    computed: Computed,
}

pub struct Fabric {
    config: FabricConfig,
    store: FeatureStore,
    log: MessageLog,
    warp: Option<Warp>,
    requested: BTreeSet<String>,
    api: Option<Api>,
    search: Search,
    sets: Sets,
    good: bool,
}

impl Fabric {
    /// Locate all feature files of the configured locations and modules
    pub fn new(config: FabricConfig) -> Self {
        let mut log = MessageLog::new(config.silence);
        log.info(format!("This is tapestry {}", crate::VERSION));
        let store = FeatureStore::discover(&config, &mut log);
        let mut good = true;
        for name in &WARP[..2] {
            if !store.contains(name) {
                log.error(format!("Mandatory feature \"{}\" is missing", name));
                good = false;
            }
        }
        info!(
            features = store.names().count(),
            locations = config.locations.len(),
            "located feature files"
        );
        Self {
            config,
            store,
            log,
            warp: None,
            requested: BTreeSet::new(),
            api: None,
            search: Search::default(),
            sets: Sets::new(),
            good,
        }
    }

    pub fn with_search_settings(mut self, settings: SearchSettings) -> Self {
        self.search = Search::new(settings);
        self
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn api(&self) -> Option<&Api> {
        self.api.as_ref()
    }

    /// False after a load cycle in which some feature failed
    pub fn is_good(&self) -> bool {
        self.good
    }

    /// Names of the features requested so far
    pub fn requested(&self) -> Vec<&str> {
        self.requested.iter().map(String::as_str).collect()
    }

    /// Load features and rebuild the API. With `add`, the features come on
    /// top of the ones requested before; otherwise they replace them and
    /// features no longer needed are unloaded.
    ///
    /// Returns `None` when the node space or the base indices cannot be
    /// built. Features that fail individually are logged and left out.
    pub fn load<I, S>(&mut self, features: I, add: bool) -> Option<&Api>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.log.indent(0, true);
        self.log.info("loading features ...");
        self.good = true;
        let requested: BTreeSet<String> = features
            .into_iter()
            .map(|f| f.as_ref().trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if add {
            self.requested.extend(requested);
        } else {
            self.requested = requested;
        }

        if let Err(err) = self.load_warp() {
            self.log.error(err.to_string());
            self.fail();
            return None;
        }
        if !add {
            self.unload_unrequested();
        }
        let names: Vec<String> = self.requested.iter().cloned().collect();
        for name in names {
            self.load_feature(&name);
        }
        match self.build_api() {
            Ok(api) => self.api = Some(api),
            Err(err) => {
                self.log.error(err.to_string());
                self.fail();
                return None;
            }
        }
        if !self.good {
            self.log.indent(0, false);
            self.log.error("Not all features could be loaded/computed");
        }
        self.log.info(format!("{} features loaded", self.store.loaded().len()));
        self.api.as_ref()
    }

    /// Load every node and edge feature of the dataset
    pub fn load_all(&mut self) -> Option<&Api> {
        if self.load(Vec::<String>::new(), false).is_none() {
            return None;
        }
        let overview = self.explore();
        let loadable: Vec<String> = overview.nodes.into_iter().chain(overview.edges).collect();
        self.load(loadable, true)
    }

    /// Drop features from the request and from memory, except the ones the
    /// text API needs
    pub fn unload<I, S>(&mut self, features: I) -> Option<&Api>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in features {
            let name = name.as_ref();
            self.requested.remove(name);
            if !self.is_text_feature(name) && self.store.unload(name) {
                debug!(feature = name, "unloaded");
            }
        }
        match self.build_api() {
            Ok(api) => self.api = Some(api),
            Err(err) => {
                self.log.error(err.to_string());
                self.api = None;
            }
        }
        self.api.as_ref()
    }

    /// Make sure the given features are loaded, loading the missing ones.
    /// Unknown names are reported and left out. Returns the features that
    /// are available afterwards.
    pub fn ensure_loaded(&mut self, features: &BTreeSet<String>) -> Vec<String> {
        let mut missing = Vec::new();
        for name in features {
            if self.is_available(name) {
                continue;
            }
            if self.store.contains(name) {
                missing.push(name.clone());
            } else {
                self.log
                    .warning(format!("Feature \"{}\" not available in any location", name));
            }
        }
        if !missing.is_empty() {
            self.log.info(format!("loading {} ...", missing.join(", ")));
            self.load(missing, true);
        }
        features
            .iter()
            .filter(|name| self.is_available(name))
            .cloned()
            .collect()
    }

    /// Classify all features of the dataset by reading their headers
    pub fn explore(&mut self) -> FeatureOverview {
        self.store.load_all_meta(&mut self.log);
        let mut overview = FeatureOverview::default();
        for name in self.store.names() {
            let kind = self
                .store
                .entry(name)
                .and_then(|entry| entry.meta())
                .map(|meta| meta.kind);
            let dest = match kind {
                Some(FeatureKind::Node) => &mut overview.nodes,
                Some(FeatureKind::Edge) => &mut overview.edges,
                Some(FeatureKind::Config) => &mut overview.configs,
                None => continue,
            };
            dest.push(name.to_string());
        }
        if let Some(warp) = &self.warp {
            overview.computed = warp
                .computed
                .available()
                .into_iter()
                .map(str::to_string)
                .collect();
        }
        self.log.info(format!(
            "Feature overview: {} for nodes; {} for edges; {} configs; {} computed",
            overview.nodes.len(),
            overview.edges.len(),
            overview.configs.len(),
            overview.computed.len()
        ));
        overview
    }

    /// Write features into a location/module; defaults to the last
    /// configured ones. When `oslots` is among the features it is checked
    /// against `otype` first and nothing is written if it is not sound.
    pub fn save(
        &mut self,
        features: &BTreeMap<String, RawFeature>,
        location: Option<&Path>,
        module: Option<&str>,
    ) -> Result<PathBuf> {
        self.log.indent(0, true);
        let dir = self.write_dir(location, module);
        let count = |kind: FeatureKind| features.values().filter(|f| f.meta.kind == kind).count();
        self.log.info(format!(
            "Exporting {} node and {} edge and {} config features to {}:",
            count(FeatureKind::Node),
            count(FeatureKind::Edge),
            count(FeatureKind::Config),
            dir.display()
        ));
        if let Err(err) = self.validate_oslots(features) {
            for message in err.messages() {
                self.log.error(message);
            }
            self.log.error("Exporting failed");
            return Err(err);
        }
        fs::create_dir_all(&dir)?;
        self.log.indent(1, false);
        for (name, feature) in features {
            let path = dir.join(format!("{}.{}", name, FEATURE_EXT));
            write_feature(&path, feature)?;
            self.log.info(format!("{} {}", feature.meta.kind.as_str(), name));
            self.store.register(name.clone(), path);
        }
        self.log.indent(0, false);
        self.log.info(format!("Exported {} features", features.len()));
        Ok(dir)
    }

    /// Remove the binary caches from every location/module
    pub fn clear_cache(&mut self) -> Result<usize> {
        let mut removed = 0;
        for dir in self.config.search_dirs() {
            removed += clear_cache(&dir)?;
        }
        self.log.info(format!("Removed {} cache file(s)", removed));
        Ok(removed)
    }

    /// Register a named node set for use as an atom type in templates
    pub fn define_set(&mut self, name: impl Into<String>, nodes: impl IntoIterator<Item = Node>) {
        let set: RoaringBitmap = nodes.into_iter().collect();
        self.sets.insert(name.into(), set);
    }

    pub fn sets(&self) -> &Sets {
        &self.sets
    }

    pub fn search_settings(&self) -> &SearchSettings {
        self.search.settings()
    }

    /// Study a template after loading the features it uses
    pub fn study(&mut self, template: &str) -> Result<()> {
        self.load_template_features(template);
        let Self {
            api,
            search,
            sets,
            log,
            ..
        } = self;
        let api = api.as_ref().ok_or(TapestryError::NotLoaded)?;
        search.study(api, template, sets, log)
    }

    pub fn fetch(&mut self, limit: Option<usize>) -> Result<Vec<Tuple>> {
        let api = self.api.as_ref().ok_or(TapestryError::NotLoaded)?;
        self.search.fetch(api, limit)
    }

    pub fn count(&self, limit: Option<usize>) -> Result<usize> {
        let api = self.api.as_ref().ok_or(TapestryError::NotLoaded)?;
        self.search.count(api, limit)
    }

    /// All results of a template (up to `limit`), sorted canonically
    pub fn search(&mut self, template: &str, limit: Option<usize>) -> Result<Vec<Tuple>> {
        self.load_template_features(template);
        let Self {
            api,
            search,
            sets,
            log,
            ..
        } = self;
        let api = api.as_ref().ok_or(TapestryError::NotLoaded)?;
        search.search(api, template, limit, sets, log)
    }

    pub fn search_shallow(&mut self, template: &str, depth: usize) -> Result<Vec<Tuple>> {
        self.load_template_features(template);
        let Self {
            api,
            search,
            sets,
            log,
            ..
        } = self;
        let api = api.as_ref().ok_or(TapestryError::NotLoaded)?;
        search.search_shallow(api, template, depth, sets, log)
    }

    pub fn show_plan(&self, details: bool) -> Result<String> {
        self.search.show_plan(details)
    }

    pub fn relations_legend(&self) -> &'static str {
        self.search.relations_legend()
    }

    pub fn tweak_performance(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        self.search.tweak_performance(name, value, &mut self.log)
    }

    pub fn glean(&self, tuple: &[Node]) -> Result<String> {
        let api = self.api.as_ref().ok_or(TapestryError::NotLoaded)?;
        Ok(Search::glean(api, tuple))
    }

    fn load_template_features(&mut self, template: &str) {
        // a template that does not parse is reported by the study itself
        if let Ok(features) = Search::template_features(template) {
            let features = features
                .into_iter()
                .filter(|f| !WARP.contains(&f.as_str()))
                .collect();
            self.ensure_loaded(&features);
        }
    }

    fn fail(&mut self) {
        self.good = false;
        self.api = None;
        self.log.indent(0, false);
        self.log.error("Not all features could be loaded/computed");
    }

    fn is_available(&self, name: &str) -> bool {
        WARP.contains(&name)
            || self.api.as_ref().map_or(false, |api| {
                api.node_feature(name).is_some() || api.edge_feature(name).is_some()
            })
    }

    fn is_text_feature(&self, name: &str) -> bool {
        self.warp
            .as_ref()
            .map_or(false, |w| w.text_features.contains(name))
    }

    fn write_dir(&self, location: Option<&Path>, module: Option<&str>) -> PathBuf {
        let base = match location {
            Some(location) => location.to_path_buf(),
            None if module.is_none() => return self.config.write_dir(),
            None => self.config.locations.last().cloned().unwrap_or_default(),
        };
        match module {
            Some(module) if !module.is_empty() => base.join(module),
            _ => base,
        }
    }

    fn validate_oslots(&mut self, features: &BTreeMap<String, RawFeature>) -> Result<()> {
        let Some(oslots) = features.get(OSLOTS) else {
            return Ok(());
        };
        self.log.info(format!("VALIDATING {} feature", OSLOTS));
        let RawData::Edge(map) = &oslots.data else {
            return Err(TapestryError::Validation(vec![format!(
                "{} is not an edge feature",
                OSLOTS
            )]));
        };
        let otype = match (features.get(OTYPE), &self.warp) {
            (Some(RawFeature { data: RawData::Node(map), .. }), _) => Arc::new(
                OtypeData::from_column(&NodeColumn::from_map(map))
                    .map_err(|e| TapestryError::Validation(vec![e]))?,
            ),
            (Some(_), _) => {
                return Err(TapestryError::Validation(vec![format!(
                    "{} is not a node feature",
                    OTYPE
                )]))
            }
            (None, Some(warp)) => warp.otype.clone(),
            (None, None) => {
                return Err(TapestryError::Validation(vec![format!(
                    "cannot check validity of {} without {}",
                    OSLOTS, OTYPE
                )]))
            }
        };
        self.log.info(format!("maxSlot={:>11}", otype.max_slot()));
        self.log.info(format!("maxNode={:>11}", otype.max_node()));
        let problems = check_oslots(&otype, &EdgeColumn::from_map(map, false));
        if !problems.is_empty() {
            return Err(TapestryError::Validation(problems));
        }
        self.log.info(format!("OK: {} is valid", OSLOTS));
        Ok(())
    }

    /// Build the node space and the derived indices, once
    fn load_warp(&mut self) -> Result<()> {
        if self.warp.is_some() {
            return Ok(());
        }
        let otype = match self.store.load(OTYPE, &mut self.log) {
            Ok(FeatureData::Node(column)) => {
                OtypeData::from_column(&column).map_err(|e| TapestryError::Validation(vec![e]))?
            }
            Ok(_) => return Err(TapestryError::MissingBaseFeature(OTYPE.to_string())),
            Err(err) => {
                self.log.error(err.to_string());
                return Err(TapestryError::MissingBaseFeature(OTYPE.to_string()));
            }
        };
        let oslots = match self.store.load(OSLOTS, &mut self.log) {
            Ok(FeatureData::Edge(column)) => {
                OslotsData::from_column(&column, &otype).map_err(TapestryError::Validation)?
            }
            Ok(_) => return Err(TapestryError::MissingBaseFeature(OSLOTS.to_string())),
            Err(err) => {
                self.log.error(err.to_string());
                return Err(TapestryError::MissingBaseFeature(OSLOTS.to_string()));
            }
        };
        // the compact forms replace the raw columns
        self.store.unload(OTYPE);
        self.store.unload(OSLOTS);
        self.store.set_max_node(otype.max_node());

        let text = self.read_text_config();
        let mut text_features: BTreeSet<String> = text.text_features().into_iter().collect();
        for (name, raw) in &text.formats {
            if let Ok(format) = CompiledFormat::parse(name, raw, otype.types(), otype.slot_type())
            {
                text_features.extend(format.features());
            }
        }
        let mut columns = BTreeMap::new();
        for name in &text_features {
            if !self.store.contains(name) {
                self.log
                    .warning(format!("Text feature \"{}\" not available in any location", name));
                continue;
            }
            match self.store.load(name, &mut self.log) {
                Ok(FeatureData::Node(column)) => {
                    columns.insert(name.clone(), column);
                }
                Ok(_) => self
                    .log
                    .warning(format!("Text feature \"{}\" is not a node feature", name)),
                Err(err) => self.log.warning(err.to_string()),
            }
        }

        let cache = if self.config.use_cache {
            self.cache_target(&text)
        } else {
            None
        };
        self.log.info("computing indices ...");
        self.log.indent(1, false);
        let computed = prepare(
            &PrepareInput {
                otype: &otype,
                oslots: &oslots,
                text: &text,
                columns: &columns,
                cache,
            },
            &mut self.log,
        );
        self.log.indent(0, false);
        if !text.sections_declared() {
            self.log.warning(format!(
                "Dataset without sections in {}: no section functions in the text API",
                OTEXT
            ));
        }
        if !text.structure_declared() {
            self.log.info(format!(
                "Dataset without structure sections in {}: no structure functions in the text API",
                OTEXT
            ));
        }
        self.warp = Some(Warp {
            otype: Arc::new(otype),
            oslots: Arc::new(oslots),
            text,
            text_features,
            computed,
        });
        Ok(())
    }

    /// Metadata of `otext` plus its language variants `otext@xx`; a dataset
    /// without `otext` gets an empty configuration
    fn read_text_config(&mut self) -> TextConfig {
        let prefix = format!("{}@", OTEXT);
        let names: Vec<String> = self
            .store
            .names()
            .filter(|n| *n == OTEXT || n.starts_with(&prefix))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            self.log.info(format!("No {} feature: using defaults", OTEXT));
        }
        let mut meta = BTreeMap::new();
        for name in names {
            match self.store.meta(&name) {
                Ok(m) => meta.extend(m.entries.clone()),
                Err(err) => self.log.warning(err.to_string()),
            }
        }
        TextConfig::from_meta(&meta)
    }

    /// Derived indices depend on the slot links, the node types, the text
    /// configuration and the section and structure features
    fn cache_target(&mut self, text: &TextConfig) -> Option<CacheTarget> {
        let dir = self.store.entry(OTYPE)?.dir().to_path_buf();
        let mut names: Vec<&str> = WARP.to_vec();
        names.extend(text.section_features.iter().map(String::as_str));
        names.extend(text.structure_features.iter().map(String::as_str));
        let mut parts = Vec::new();
        for name in names {
            let Some(entry) = self.store.entry(name) else {
                parts.push(0);
                continue;
            };
            match source_fingerprint(&entry.path) {
                Ok(fingerprint) => parts.push(fingerprint),
                Err(err) => {
                    self.log
                        .warning(format!("cannot fingerprint {}: {}", name, err));
                    return None;
                }
            }
        }
        Some(CacheTarget {
            dir,
            fingerprint: combine_fingerprints(&parts),
        })
    }

    fn unload_unrequested(&mut self) {
        for name in self.store.loaded() {
            if !self.requested.contains(&name) && !self.is_text_feature(&name) {
                self.store.unload(&name);
                debug!(feature = %name, "unloaded");
            }
        }
    }

    fn load_feature(&mut self, name: &str) {
        if WARP.contains(&name) {
            return;
        }
        if !self.store.contains(name) {
            self.log.error(format!(
                "cannot load feature \"{}\": not found in any location",
                name
            ));
            self.requested.remove(name);
            self.good = false;
            return;
        }
        if let Err(err) = self.store.load(name, &mut self.log) {
            self.log.error(err.to_string());
            self.requested.remove(name);
            self.good = false;
        }
    }

    fn build_api(&mut self) -> Result<Api> {
        let warp = self.warp.as_ref().ok_or(TapestryError::NotLoaded)?;
        let mut node_features = Vec::new();
        let mut edge_features = Vec::new();
        for name in self.store.loaded() {
            if WARP.contains(&name.as_str()) {
                continue;
            }
            let Some(meta) = self.store.entry(&name).and_then(|e| e.meta()).cloned() else {
                continue;
            };
            match self.store.data(&name) {
                Some(FeatureData::Node(column)) => {
                    node_features.push((name, meta, column.clone()))
                }
                Some(FeatureData::Edge(column)) => {
                    edge_features.push((name, meta, column.clone()))
                }
                _ => {}
            }
        }
        Api::assemble(
            ApiParts {
                otype: warp.otype.clone(),
                oslots: warp.oslots.clone(),
                computed: warp.computed.clone(),
                text: warp.text.clone(),
                node_features,
                edge_features,
            },
            &mut self.log,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Value;
    use crate::testing::CorpusBuilder;
    use tempfile::TempDir;

    fn fabric(corpus: &CorpusBuilder) -> (TempDir, Fabric) {
        let dir = TempDir::new().unwrap();
        corpus.write_to(dir.path()).unwrap();
        let fabric = Fabric::new(FabricConfig::new(dir.path()));
        (dir, fabric)
    }

    #[test]
    fn test_load_and_unload() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::bible());
        let api = tf.load(["pos"], false).unwrap();
        assert_eq!(api.node_feature("pos").unwrap().v(5), Some(&Value::from("verb")));
        assert!(api.edge_feature("subject").is_none());
        assert!(api.sections_ok());
        assert!(tf.is_good());

        let api = tf.load(["subject"], true).unwrap();
        assert!(api.node_feature("pos").is_some());
        assert!(api.edge_feature("subject").is_some());

        let api = tf.load(["subject"], false).unwrap();
        assert!(api.node_feature("pos").is_none());
        // section and format features stay for the text API
        assert!(api.node_feature("book").is_some());
        assert!(api.node_feature("function").is_some());

        let api = tf.unload(["subject", "function"]).unwrap();
        assert!(api.edge_feature("subject").is_none());
        assert!(api.node_feature("function").is_some());
    }

    #[test]
    fn test_missing_feature_is_reported() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::bible());
        let api = tf.load(["pos", "gloss"], false).unwrap();
        assert!(api.node_feature("pos").is_some());
        assert!(api.node_feature("gloss").is_none());
        assert!(!tf.is_good());
        assert!(tf
            .log()
            .at_least(crate::log::Severity::Error)
            .any(|m| m.text.contains("gloss")));
    }

    #[test]
    fn test_missing_base_feature_is_fatal() {
        let dir = TempDir::new().unwrap();
        CorpusBuilder::sentences().write_to(dir.path()).unwrap();
        fs::remove_file(dir.path().join("oslots.tf")).unwrap();
        let mut tf = Fabric::new(FabricConfig::new(dir.path()));
        assert!(!tf.is_good());
        assert!(tf.load(Vec::<String>::new(), false).is_none());
        assert!(tf.api().is_none());
    }

    #[test]
    fn test_explore_and_load_all() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::bible());
        let overview = tf.explore();
        assert!(overview.nodes.contains(&"lex".to_string()));
        assert!(overview.edges.contains(&"crossref".to_string()));
        assert_eq!(overview.configs, vec![OTEXT.to_string()]);
        let api = tf.load_all().unwrap();
        assert!(api.edge_feature("subject").is_some());
        assert!(api.node_feature("trailer").is_some());
    }

    #[test]
    fn test_save_validates_oslots() {
        let (dir, mut tf) = fabric(&CorpusBuilder::sentences());
        let mut features = CorpusBuilder::sentences().raw_features();
        if let Some(RawData::Edge(map)) = features.get_mut(OSLOTS).map(|f| &mut f.data) {
            map.remove(&12);
            map.entry(3).or_default().insert(3, None);
        }
        let err = tf.save(&features, Some(dir.path().join("bad").as_path()), None).unwrap_err();
        assert!(matches!(err, TapestryError::Validation(ref problems) if problems.len() == 2));
        assert!(!dir.path().join("bad").exists());
    }

    #[test]
    fn test_save_then_search() {
        let (dir, mut tf) = fabric(&CorpusBuilder::sentences());
        tf.load(Vec::<String>::new(), false).unwrap();
        let mut features = BTreeMap::new();
        let gloss = CorpusBuilder::sentences()
            .node_feature("gloss", [(11, "first"), (12, "second")])
            .raw_features()
            .remove("gloss")
            .unwrap();
        features.insert("gloss".to_string(), gloss);
        let written = tf.save(&features, None, Some("extra")).unwrap();
        assert_eq!(written, dir.path().join("extra"));

        let config = FabricConfig::new(dir.path()).with_modules(["", "extra"]);
        let mut tf = Fabric::new(config);
        tf.load(Vec::<String>::new(), false).unwrap();
        let results = tf.search("sentence gloss=second", None).unwrap();
        assert_eq!(results, vec![vec![12]]);
        assert_eq!(tf.count(None).unwrap(), 1);
    }

    #[test]
    fn test_custom_sets() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::sentences());
        tf.load(Vec::<String>::new(), false).unwrap();
        tf.define_set("chosen", [2, 7]);
        let results = tf.search("sentence\n  chosen\n", None).unwrap();
        assert_eq!(results, vec![vec![11, 2], vec![12, 7]]);
    }

    #[test]
    fn test_search_before_load() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::sentences());
        assert!(matches!(tf.search("sentence", None), Err(TapestryError::NotLoaded)));
    }

    #[test]
    fn test_clear_cache() {
        let (_dir, mut tf) = fabric(&CorpusBuilder::bible());
        tf.load(["lex"], false).unwrap();
        assert!(tf.clear_cache().unwrap() > 0);
        assert_eq!(tf.clear_cache().unwrap(), 0);
    }
}
