//! The search interface: study a template, then fetch or count its results

use std::collections::BTreeSet;

use super::compile::{compile, Query, Sets};
use super::executor::{Cursor, Tuple};
use super::plan::{describe, plan};
use super::relations::LEGEND;
use super::syntax;
use crate::api::Api;
use crate::config::SearchSettings;
use crate::error::{Result, TapestryError};
use crate::feature::{Node, Value};
use crate::log::MessageLog;

/// Number of slots shown for a non-section node in `glean`
const GLEAN_SLOTS: usize = 5;

struct Study {
    template: String,
    query: Query,
    cursor: Cursor,
}

/// Search state: planner settings and the most recently studied template
pub struct Search {
    settings: SearchSettings,
    study: Option<Study>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new(SearchSettings::default())
    }
}

fn limit_setting(name: &str, value: Option<f64>, default: usize) -> Result<usize> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
        Some(v) => Err(TapestryError::InvalidSetting(format!(
            "{} must be a positive integer, not {}",
            name, v
        ))),
    }
}

fn heading(values: &[Value]) -> String {
    match values {
        [book, chapter, verse] => format!("{} {}:{}", book, chapter, verse),
        other => other
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

impl Search {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            study: None,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Change one planner parameter; `None` restores its default
    pub fn tweak_performance(
        &mut self,
        name: &str,
        value: Option<f64>,
        log: &mut MessageLog,
    ) -> Result<()> {
        let defaults = SearchSettings::default();
        let mut settings = self.settings.clone();
        match name {
            "yarn_ratio" => settings.yarn_ratio = value.unwrap_or(defaults.yarn_ratio),
            "try_limit_from" => {
                settings.try_limit_from = limit_setting(name, value, defaults.try_limit_from)?
            }
            "try_limit_to" => {
                settings.try_limit_to = limit_setting(name, value, defaults.try_limit_to)?
            }
            other => {
                log.error(format!("No such performance parameter: {}", other));
                return Err(TapestryError::InvalidSetting(format!(
                    "unknown performance parameter {}",
                    other
                )));
            }
        }
        settings.validate()?;
        self.settings = settings;
        log.info(format!(
            "Performance parameters: yarn_ratio={} try_limit_from={} try_limit_to={}",
            self.settings.yarn_ratio, self.settings.try_limit_from, self.settings.try_limit_to
        ));
        Ok(())
    }

    /// Parse, compile and plan a template. A successful study replaces the
    /// previous one and resets the result cursor.
    pub fn study(
        &mut self,
        api: &Api,
        template: &str,
        sets: &Sets,
        log: &mut MessageLog,
    ) -> Result<()> {
        self.study = None;
        log.indent(0, true);
        log.info("Checking search template ...");
        let result = syntax::parse(template)
            .map_err(TapestryError::Query)
            .and_then(|parsed| compile(api, &parsed, sets));
        let mut query = match result {
            Ok(query) => query,
            Err(err) => {
                for message in err.messages() {
                    log.error(message);
                }
                return Err(err);
            }
        };
        log.info(format!(
            "Setting up search space for {} objects ...",
            query.objects.len()
        ));
        log.info(format!(
            "Constraining search space with {} relations ...",
            query.relation_count()
        ));
        if !query.quantifiers.is_empty() {
            log.info(format!("Applying {} quantifiers ...", query.quantifiers.len()));
        }
        log.info("Making search plan ...");
        plan(&mut query, api, &self.settings);
        log.indent(1, false);
        for note in &query.plan.notes {
            log.info(note.clone());
        }
        log.indent(0, false);
        if query.plan.expensive {
            log.warning(format!(
                "Search space of about {:.0} may be too expensive",
                query.plan.estimate
            ));
        }
        let nodes: u64 = query.objects.iter().map(|o| o.yarn.len()).sum();
        log.info(format!("Ready to deliver results from {} nodes", nodes));
        self.study = Some(Study {
            template: template.to_string(),
            cursor: Cursor::new(&query),
            query,
        });
        Ok(())
    }

    /// The template of the current study
    pub fn studied(&self) -> Option<&str> {
        self.study.as_ref().map(|s| s.template.as_str())
    }

    /// Continue delivering results of the current study
    pub fn fetch(&mut self, api: &Api, limit: Option<usize>) -> Result<Vec<Tuple>> {
        let study = self.study.as_mut().ok_or(TapestryError::NoStudy)?;
        Ok(study.cursor.take(&study.query, api, limit))
    }

    /// Count the results of the current study from the start, without
    /// disturbing `fetch`
    pub fn count(&self, api: &Api, limit: Option<usize>) -> Result<usize> {
        let study = self.study.as_ref().ok_or(TapestryError::NoStudy)?;
        let mut cursor = Cursor::new(&study.query);
        let mut count = 0;
        while limit.map_or(true, |l| count < l) && cursor.next(&study.query, api).is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Study and fetch, sorted canonically; a limit keeps the first
    /// `limit` results of the sorted whole
    pub fn search(
        &mut self,
        api: &Api,
        template: &str,
        limit: Option<usize>,
        sets: &Sets,
        log: &mut MessageLog,
    ) -> Result<Vec<Tuple>> {
        self.study(api, template, sets, log)?;
        let mut results = self.fetch(api, None)?;
        let nodes = api.nodes();
        results.sort_by_cached_key(|tuple| nodes.sort_key_tuple(tuple));
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// Distinct result prefixes of length `depth`, sorted canonically
    pub fn search_shallow(
        &mut self,
        api: &Api,
        template: &str,
        depth: usize,
        sets: &Sets,
        log: &mut MessageLog,
    ) -> Result<Vec<Tuple>> {
        self.study(api, template, sets, log)?;
        let mut prefixes: BTreeSet<Tuple> = BTreeSet::new();
        for tuple in self.fetch(api, None)? {
            let end = depth.clamp(1, tuple.len());
            prefixes.insert(tuple[..end].to_vec());
        }
        let nodes = api.nodes();
        let mut results: Vec<Tuple> = prefixes.into_iter().collect();
        results.sort_by_cached_key(|tuple| nodes.sort_key_tuple(tuple));
        Ok(results)
    }

    pub fn show_plan(&self, details: bool) -> Result<String> {
        let study = self.study.as_ref().ok_or(TapestryError::NoStudy)?;
        Ok(describe(&study.query, details))
    }

    pub fn relations_legend(&self) -> &'static str {
        LEGEND
    }

    /// Features a template refers to
    pub fn template_features(template: &str) -> Result<BTreeSet<String>> {
        syntax::parse(template)
            .map(|t| t.features())
            .map_err(TapestryError::Query)
    }

    /// A one-line summary of a result tuple: a section heading for the
    /// lowest section level, the text of slots, and the type with its
    /// first few words for anything else
    pub fn glean(api: &Api, tuple: &[Node]) -> String {
        let text = api.text();
        let otype = api.otype();
        let slot_type = otype.slot_type();
        let section_types = &api.text_config().section_types;
        let parts: Vec<String> = tuple
            .iter()
            .map(|&node| {
                let node_type = otype.v(node).unwrap_or_default();
                if api.sections_ok() {
                    if section_types.last().map(String::as_str) == Some(node_type) {
                        return text
                            .section_from_node(node, false)
                            .map(|values| heading(&values))
                            .unwrap_or_default();
                    }
                    if section_types.iter().any(|t| t == node_type) {
                        return String::new();
                    }
                }
                if node_type == slot_type {
                    return text
                        .text(&[node], None, None)
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                }
                let slots = api.oslots().s(node);
                let shown = &slots[..slots.len().min(GLEAN_SLOTS)];
                let words = text.text(shown, None, None).unwrap_or_default();
                let more = if slots.len() > GLEAN_SLOTS { "..." } else { "" };
                format!("{}[{}{}]", node_type, words.trim(), more)
            })
            .filter(|part| !part.is_empty())
            .collect();
        parts.join(" ")
    }
}
