//! Feature discovery and lazy loading
//!
//! Every feature starts out known by name and location only. Its header is
//! read when somebody asks about it, its data when somebody needs it, and the
//! data can be dropped again later. Config features carry no data and count
//! as loaded as soon as their header is known.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::{cache_path, read_cache, source_fingerprint, write_cache};
use super::column::{EdgeColumn, NodeColumn};
use super::format::{read_feature, read_meta, FEATURE_EXT};
use super::types::{FeatureKind, FeatureMeta, Node, RawData};
use crate::config::FabricConfig;
use crate::error::{Result, TapestryError};
use crate::log::MessageLog;

/// Lifecycle of a feature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureState {
    Unloaded,
    MetadataOnly,
    DataLoaded,
}

/// Resident data of a loaded feature
#[derive(Clone, Debug)]
pub enum FeatureData {
    Node(Arc<NodeColumn>),
    Edge(Arc<EdgeColumn>),
    Config,
}

#[derive(Serialize, Deserialize)]
enum CachedData {
    Node(NodeColumn),
    Edge(EdgeColumn),
}

impl CachedData {
    fn last_node(&self) -> Option<Node> {
        match self {
            CachedData::Node(column) => column.last_node(),
            CachedData::Edge(column) => column.last_node(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CachedFeature {
    meta: FeatureMeta,
    data: CachedData,
}

/// A known feature file
#[derive(Debug)]
pub struct FeatureEntry {
    pub name: String,
    pub path: PathBuf,
    meta: Option<FeatureMeta>,
    data: Option<FeatureData>,
}

impl FeatureEntry {
    fn new(name: String, path: PathBuf) -> Self {
        Self {
            name,
            path,
            meta: None,
            data: None,
        }
    }

    pub fn state(&self) -> FeatureState {
        match (&self.meta, &self.data) {
            (_, Some(_)) => FeatureState::DataLoaded,
            (Some(_), None) => FeatureState::MetadataOnly,
            (None, None) => FeatureState::Unloaded,
        }
    }

    pub fn meta(&self) -> Option<&FeatureMeta> {
        self.meta.as_ref()
    }

    /// Directory holding the feature file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// All features found in the configured locations
#[derive(Debug, Default)]
pub struct FeatureStore {
    use_cache: bool,
    entries: BTreeMap<String, FeatureEntry>,
    /// Feature files shadowed by a later location
    ignored: Vec<(String, PathBuf)>,
    /// Nodes beyond this are dropped at load time
    max_node: Option<Node>,
}

impl FeatureStore {
    /// Scan all location/module directories for feature files; later
    /// directories win over earlier ones
    pub fn discover(config: &FabricConfig, log: &mut MessageLog) -> Self {
        let mut store = Self {
            use_cache: config.use_cache,
            ..Default::default()
        };
        for dir in config.search_dirs() {
            if !dir.is_dir() {
                log.warning(format!("no directory {}", dir.display()));
                continue;
            }
            match feature_files(&dir) {
                Ok(files) => {
                    let count = files.len();
                    for (name, path) in files {
                        store.register(name, path);
                    }
                    debug!(dir = %dir.display(), count, "scanned feature directory");
                }
                Err(err) => log.warning(format!("cannot read {}: {}", dir.display(), err)),
            }
        }
        for (name, path) in &store.ignored {
            log.note(
                crate::log::Severity::Info,
                format!("{} in {} is overridden", name, path.display()),
            );
        }
        store
    }

    /// Add or replace a feature file
    pub fn register(&mut self, name: String, path: PathBuf) {
        let entry = FeatureEntry::new(name.clone(), path);
        if let Some(old) = self.entries.insert(name.clone(), entry) {
            if old.path != self.entries[&name].path {
                self.ignored.push((name, old.path));
            }
        }
    }

    /// Bound node numbers of features loaded from now on
    pub fn set_max_node(&mut self, max_node: Node) {
        self.max_node = Some(max_node);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&FeatureEntry> {
        self.entries.get(name)
    }

    pub fn ignored(&self) -> &[(String, PathBuf)] {
        &self.ignored
    }

    pub fn state(&self, name: &str) -> FeatureState {
        self.entries
            .get(name)
            .map(FeatureEntry::state)
            .unwrap_or(FeatureState::Unloaded)
    }

    /// Resident data, if loaded
    pub fn data(&self, name: &str) -> Option<&FeatureData> {
        self.entries.get(name).and_then(|e| e.data.as_ref())
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut FeatureEntry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| TapestryError::FeatureNotFound(name.to_string()))
    }

    /// Header of a feature, reading it if needed
    pub fn meta(&mut self, name: &str) -> Result<&FeatureMeta> {
        let entry = self.entry_mut(name)?;
        if entry.meta.is_none() {
            let meta = read_meta(&entry.path)?;
            if meta.kind == FeatureKind::Config {
                entry.data = Some(FeatureData::Config);
            }
            entry.meta = Some(meta);
        }
        entry
            .meta
            .as_ref()
            .ok_or_else(|| TapestryError::FeatureNotLoaded(name.to_string()))
    }

    pub fn kind(&mut self, name: &str) -> Result<FeatureKind> {
        Ok(self.meta(name)?.kind)
    }

    /// Read the headers of all features
    pub fn load_all_meta(&mut self, log: &mut MessageLog) {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            if let Err(err) = self.meta(&name) {
                log.error(err.to_string());
            }
        }
    }

    /// Make the data of a feature resident, from cache when possible
    pub fn load(&mut self, name: &str, log: &mut MessageLog) -> Result<FeatureData> {
        if let Some(data) = self.data(name) {
            return Ok(data.clone());
        }
        let use_cache = self.use_cache;
        let max_node = self.max_node;
        let entry = self.entry_mut(name)?;
        let fingerprint = source_fingerprint(&entry.path)?;
        let cache = cache_path(entry.dir(), name);

        let cached = if use_cache {
            read_cache::<CachedFeature>(&cache, fingerprint)?
        } else {
            None
        };
        // a cache written before the bound was known may reach beyond it
        let cached = cached.filter(|c| match (c.data.last_node(), max_node) {
            (Some(last), Some(max)) => last <= max,
            _ => true,
        });
        let (meta, data) = match cached {
            Some(CachedFeature { meta, data }) => {
                debug!(feature = name, "loaded from cache");
                let data = match data {
                    CachedData::Node(mut column) => {
                        column.reindex();
                        FeatureData::Node(Arc::new(column))
                    }
                    CachedData::Edge(column) => FeatureData::Edge(Arc::new(column)),
                };
                (meta, data)
            }
            None => {
                let mut raw = read_feature(&entry.path)?;
                let mut dropped = 0;
                if let Some(max) = max_node {
                    dropped = drop_beyond(&mut raw.data, max);
                    if dropped > 0 {
                        log.warning(format!(
                            "{}: ignored {} value(s) for nodes beyond {}",
                            name, dropped, max
                        ));
                    }
                }
                let (data, cached) = match &raw.data {
                    RawData::Config => (FeatureData::Config, None),
                    RawData::Node(map) => {
                        let column = NodeColumn::from_map(map);
                        (
                            FeatureData::Node(Arc::new(column.clone())),
                            Some(CachedData::Node(column)),
                        )
                    }
                    RawData::Edge(map) => {
                        let column = EdgeColumn::from_map(map, raw.meta.edge_values);
                        (
                            FeatureData::Edge(Arc::new(column.clone())),
                            Some(CachedData::Edge(column)),
                        )
                    }
                };
                // only complete data is cached
                if let (true, 0, Some(cached)) = (use_cache, dropped, cached) {
                    let record = CachedFeature {
                        meta: raw.meta.clone(),
                        data: cached,
                    };
                    if let Err(err) = write_cache(&cache, fingerprint, &record) {
                        log.warning(format!("cannot cache {}: {}", name, err));
                    }
                }
                log.info(format!("{} {}", raw.meta.kind.as_str(), name));
                (raw.meta, data)
            }
        };
        entry.meta = Some(meta);
        entry.data = Some(data.clone());
        Ok(data)
    }

    /// Drop the resident data of a feature; config features stay loaded.
    /// Returns whether data was dropped.
    pub fn unload(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if matches!(entry.data, Some(FeatureData::Node(_) | FeatureData::Edge(_))) => {
                entry.data = None;
                true
            }
            _ => false,
        }
    }

    /// Names of features with resident data
    pub fn loaded(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.state() == FeatureState::DataLoaded)
            .map(|e| e.name.clone())
            .collect()
    }
}

/// Remove data for nodes above `max`; returns the number of values removed
fn drop_beyond(data: &mut RawData, max: Node) -> usize {
    match data {
        RawData::Config => 0,
        RawData::Node(map) => {
            let before = map.len();
            map.retain(|&node, _| node <= max);
            before - map.len()
        }
        RawData::Edge(map) => {
            let mut dropped = 0;
            map.retain(|&source, targets| {
                let before = targets.len();
                if source <= max {
                    targets.retain(|&target, _| target <= max);
                } else {
                    targets.clear();
                }
                dropped += before - targets.len();
                !targets.is_empty()
            });
            dropped
        }
    }
}

/// Feature files in a directory, sorted by name
fn feature_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(FEATURE_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::types::Value;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{}.tf", name)), text).unwrap();
    }

    #[test]
    fn test_later_location_wins() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "gloss", "@node\n\nfirst\n");
        write(b.path(), "gloss", "@node\n\nsecond\n");
        write(a.path(), "lex", "@node\n\nx\n");
        let config = FabricConfig::new(a.path()).with_location(b.path());
        let mut log = MessageLog::default();
        let mut store = FeatureStore::discover(&config, &mut log);

        assert_eq!(store.names().collect::<Vec<_>>(), vec!["gloss", "lex"]);
        assert_eq!(store.ignored().len(), 1);
        let FeatureData::Node(column) = store.load("gloss", &mut log).unwrap() else {
            panic!("expected node data");
        };
        assert_eq!(column.get(1), Some(&Value::from("second")));
    }

    #[test]
    fn test_state_machine() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lex", "@node\n\n2*\tbe\n");
        write(dir.path(), "otext", "@config\n@sectionTypes=book\n\n");
        let mut log = MessageLog::default();
        let mut store = FeatureStore::discover(&FabricConfig::new(dir.path()), &mut log);

        assert_eq!(store.state("lex"), FeatureState::Unloaded);
        assert_eq!(store.kind("lex").unwrap(), FeatureKind::Node);
        assert_eq!(store.state("lex"), FeatureState::MetadataOnly);
        store.load("lex", &mut log).unwrap();
        assert_eq!(store.state("lex"), FeatureState::DataLoaded);
        assert!(store.unload("lex"));
        assert_eq!(store.state("lex"), FeatureState::MetadataOnly);

        store.meta("otext").unwrap();
        assert_eq!(store.state("otext"), FeatureState::DataLoaded);
        assert!(!store.unload("otext"));
        assert_eq!(store.state("otext"), FeatureState::DataLoaded);
    }

    #[test]
    fn test_second_load_uses_cache() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lex", "@node\n\n3*\tbe\n");
        let config = FabricConfig::new(dir.path());
        let mut log = MessageLog::default();
        let mut store = FeatureStore::discover(&config, &mut log);
        store.load("lex", &mut log).unwrap();
        assert!(cache_path(dir.path(), "lex").exists());

        let mut fresh = FeatureStore::discover(&config, &mut log);
        let FeatureData::Node(column) = fresh.load("lex", &mut log).unwrap() else {
            panic!("expected node data");
        };
        assert_eq!(column.nodes_with(&Value::from("be")), vec![1, 2, 3]);
    }

    #[test]
    fn test_nodes_beyond_the_corpus_are_dropped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "gloss", "@node\n\nin\n5000\tout\n");
        write(dir.path(), "link", "@edge\n\n1\t2,5000\n5000\t1\n");
        let config = FabricConfig::new(dir.path());
        let mut log = MessageLog::default();
        let mut store = FeatureStore::discover(&config, &mut log);
        store.set_max_node(12);

        let FeatureData::Node(column) = store.load("gloss", &mut log).unwrap() else {
            panic!("expected node data");
        };
        assert_eq!(column.get(1), Some(&Value::from("in")));
        assert_eq!(column.get(5000), None);
        assert_eq!(column.last_node(), Some(1));
        let FeatureData::Edge(column) = store.load("link", &mut log).unwrap() else {
            panic!("expected edge data");
        };
        assert_eq!(column.len(), 1);
        assert_eq!(column.last_node(), Some(2));
        let warnings: Vec<&str> = log
            .at_least(crate::log::Severity::Warning)
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("gloss") && warnings[0].contains("beyond 12"));
        assert!(!cache_path(dir.path(), "gloss").exists());
    }

    #[test]
    fn test_cache_beyond_the_corpus_is_not_used() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "gloss", "@node\n\nin\n5000\tout\n");
        let config = FabricConfig::new(dir.path());
        let mut log = MessageLog::default();
        FeatureStore::discover(&config, &mut log)
            .load("gloss", &mut log)
            .unwrap();
        assert!(cache_path(dir.path(), "gloss").exists());

        let mut bounded = FeatureStore::discover(&config, &mut log);
        bounded.set_max_node(12);
        let FeatureData::Node(column) = bounded.load("gloss", &mut log).unwrap() else {
            panic!("expected node data");
        };
        assert_eq!(column.len(), 1);
        assert_eq!(column.last_node(), Some(1));
    }

    #[test]
    fn test_unknown_feature() {
        let dir = TempDir::new().unwrap();
        let mut log = MessageLog::default();
        let mut store = FeatureStore::discover(&FabricConfig::new(dir.path()), &mut log);
        assert!(matches!(
            store.load("nope", &mut log),
            Err(TapestryError::FeatureNotFound(_))
        ));
    }
}
