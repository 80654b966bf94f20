use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Result, TapestryError};
use crate::log::Silence;

/// Where to find feature files and how to treat them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Base directories, searched in order; later ones win
    pub locations: Vec<PathBuf>,
    /// Subdirectories tried under every location
    pub modules: Vec<String>,
    /// Read and write binary caches of parsed features and derived indices
    pub use_cache: bool,
    pub silence: Silence,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            modules: vec![String::new()],
            use_cache: true,
            silence: Silence::Off,
        }
    }
}

impl FabricConfig {
    /// Create a configuration for a single location
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            locations: vec![location.into()],
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.locations.push(location.into());
        self
    }

    /// Replace the module list
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        if self.modules.is_empty() {
            self.modules.push(String::new());
        }
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_silence(mut self, silence: Silence) -> Self {
        self.silence = silence;
        self
    }

    /// All directories that may hold feature files, in precedence order
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for location in &self.locations {
            for module in &self.modules {
                if module.is_empty() {
                    dirs.push(location.clone());
                } else {
                    dirs.push(location.join(module));
                }
            }
        }
        dirs
    }

    /// Directory that `save` writes to when no explicit target is given
    pub fn write_dir(&self) -> PathBuf {
        let location = self.locations.last().cloned().unwrap_or_default();
        match self.modules.last() {
            Some(module) if !module.is_empty() => location.join(module),
            _ => location,
        }
    }
}

/// Tunable constants of the search planner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Minimal size ratio between two yarns before an edge is spun
    pub yarn_ratio: f64,
    /// Number of left nodes sampled when estimating a spread
    pub try_limit_from: usize,
    /// Number of right nodes sampled per left node for test-only relations
    pub try_limit_to: usize,
    /// Estimated result space above which a study is reported as expensive
    pub expensive_threshold: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            yarn_ratio: 1.25,
            try_limit_from: 40,
            try_limit_to: 40,
            expensive_threshold: 1e9,
        }
    }
}

impl SearchSettings {
    pub fn with_yarn_ratio(mut self, ratio: f64) -> Self {
        self.yarn_ratio = ratio;
        self
    }

    pub fn with_try_limits(mut self, from: usize, to: usize) -> Self {
        self.try_limit_from = from;
        self.try_limit_to = to;
        self
    }

    pub fn with_profile(mut self, profile: SearchProfile) -> Self {
        profile.apply_to(&mut self);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.yarn_ratio.is_finite() && self.yarn_ratio >= 1.0) {
            return Err(TapestryError::InvalidSetting(format!(
                "yarn_ratio must be a finite number >= 1, not {}",
                self.yarn_ratio
            )));
        }
        if self.try_limit_from == 0 || self.try_limit_to == 0 {
            return Err(TapestryError::InvalidSetting(
                "try limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Presets for the search planner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchProfile {
    /// Few samples, aggressive spinning
    Quick,
    Balanced,
    /// Many samples, spin only when it clearly pays off
    Thorough,
}

impl SearchProfile {
    pub fn yarn_ratio(&self) -> f64 {
        match self {
            SearchProfile::Quick => 1.1,
            SearchProfile::Balanced => 1.25,
            SearchProfile::Thorough => 2.0,
        }
    }

    pub fn try_limits(&self) -> (usize, usize) {
        match self {
            SearchProfile::Quick => (10, 10),
            SearchProfile::Balanced => (40, 40),
            SearchProfile::Thorough => (200, 200),
        }
    }

    pub fn apply_to(&self, settings: &mut SearchSettings) {
        settings.yarn_ratio = self.yarn_ratio();
        let (from, to) = self.try_limits();
        settings.try_limit_from = from;
        settings.try_limit_to = to;
    }
}

/// Section, structure and text-format declarations of a corpus,
/// taken from the metadata of the `otext` config feature
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    pub section_types: Vec<String>,
    pub section_features: Vec<String>,
    pub structure_types: Vec<String>,
    pub structure_features: Vec<String>,
    /// Format name -> raw template
    pub formats: BTreeMap<String, String>,
}

impl TextConfig {
    pub fn from_meta(meta: &BTreeMap<String, String>) -> Self {
        let list = |key: &str| -> Vec<String> {
            meta.get(key)
                .map(|v| itemize(v, ','))
                .unwrap_or_default()
        };
        let formats = meta
            .iter()
            .filter_map(|(k, v)| k.strip_prefix("fmt:").map(|f| (f.to_string(), v.clone())))
            .collect();
        Self {
            section_types: list("sectionTypes"),
            section_features: list("sectionFeatures"),
            structure_types: list("structureTypes"),
            structure_features: list("structureFeatures"),
            formats,
        }
    }

    /// Sections need between one and three types and features
    pub fn sections_declared(&self) -> bool {
        (1..=3).contains(&self.section_types.len())
            && (1..=3).contains(&self.section_features.len())
    }

    pub fn structure_declared(&self) -> bool {
        !self.structure_types.is_empty() && !self.structure_features.is_empty()
    }

    /// Features needed by the text API
    pub fn text_features(&self) -> Vec<String> {
        let mut feats: Vec<String> = Vec::new();
        if self.sections_declared() {
            feats.extend(self.section_features.iter().cloned());
        }
        if self.structure_declared() {
            feats.extend(self.structure_features.iter().cloned());
        }
        feats.sort();
        feats.dedup();
        feats
    }
}

/// Split a separated list, trimming items and dropping empty ones
pub fn itemize(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let fabric = FabricConfig::default();
        assert!(fabric.use_cache);
        assert_eq!(fabric.modules, vec![String::new()]);

        let search = SearchSettings::default();
        assert_eq!(search.yarn_ratio, 1.25);
        assert_eq!(search.try_limit_from, 40);
        assert_eq!(search.try_limit_to, 40);
        assert!(search.validate().is_ok());
    }

    #[test]
    fn test_search_profiles() {
        let quick = SearchSettings::default().with_profile(SearchProfile::Quick);
        assert_eq!(quick.try_limit_from, 10);
        let thorough = SearchSettings::default().with_profile(SearchProfile::Thorough);
        assert_eq!(thorough.yarn_ratio, 2.0);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(SearchSettings::default().with_yarn_ratio(0.5).validate().is_err());
        assert!(SearchSettings::default().with_try_limits(0, 3).validate().is_err());
    }

    #[test]
    fn test_search_dirs_and_write_dir() {
        let config = FabricConfig::new("/data/a")
            .with_location("/data/b")
            .with_modules(["core", "extra"]);
        let dirs = config.search_dirs();
        assert_eq!(dirs.len(), 4);
        assert_eq!(dirs[0], PathBuf::from("/data/a/core"));
        assert_eq!(config.write_dir(), PathBuf::from("/data/b/extra"));
    }

    #[test]
    fn test_text_config_from_meta() {
        let mut meta = BTreeMap::new();
        meta.insert("sectionTypes".to_string(), "book, chapter,verse".to_string());
        meta.insert("sectionFeatures".to_string(), "book,chapter,verse".to_string());
        meta.insert("fmt:text-orig-full".to_string(), "{letters} ".to_string());
        let config = TextConfig::from_meta(&meta);
        assert_eq!(config.section_types, vec!["book", "chapter", "verse"]);
        assert!(config.sections_declared());
        assert!(!config.structure_declared());
        assert_eq!(config.formats["text-orig-full"], "{letters} ");
        assert_eq!(config.text_features(), vec!["book", "chapter", "verse"]);
    }
}
