//! Derived indices
//!
//! Everything here is a pure function of the node types, the slot links and
//! the section/structure declarations. The indices form a small DAG of named
//! build steps; each step declares what it needs, and the steps run in
//! topological order:
//!
//! ```text
//! levels -> order -> rank -> levUp -> levDown
//!                         \-> boundary
//! levels + levUp          -> sections
//! rank + levUp            -> structure
//! ```
//!
//! A step whose dependencies are not all available is skipped, and so is
//! everything downstream of it. The rest of the API keeps working.

pub mod boundary;
pub mod levels;
pub mod locality;
pub mod order;
pub mod sections;
pub mod structure;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TextConfig;
use crate::feature::cache::{cache_path, combine_fingerprints, read_cache, write_cache};
use crate::feature::{Node, NodeColumn, OslotsData, OtypeData};
use crate::log::MessageLog;

pub use boundary::Boundary;
pub use levels::{LevelInfo, Levels};
pub use locality::{LevDown, LevUp};
pub use order::{Order, Rank};
pub use sections::Sections;
pub use structure::{Heading, Structure};

/// The derived indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComputedKind {
    Levels,
    Order,
    Rank,
    LevUp,
    LevDown,
    Boundary,
    Sections,
    Structure,
}

impl ComputedKind {
    pub const ALL: [ComputedKind; 8] = [
        ComputedKind::Levels,
        ComputedKind::Order,
        ComputedKind::Rank,
        ComputedKind::LevUp,
        ComputedKind::LevDown,
        ComputedKind::Boundary,
        ComputedKind::Sections,
        ComputedKind::Structure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComputedKind::Levels => "levels",
            ComputedKind::Order => "order",
            ComputedKind::Rank => "rank",
            ComputedKind::LevUp => "levUp",
            ComputedKind::LevDown => "levDown",
            ComputedKind::Boundary => "boundary",
            ComputedKind::Sections => "sections",
            ComputedKind::Structure => "structure",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Steps that must succeed before this one can run
    pub fn deps(&self) -> &'static [ComputedKind] {
        use ComputedKind::*;
        match self {
            Levels => &[],
            Order => &[Levels],
            Rank => &[Order],
            LevUp => &[Rank],
            LevDown => &[LevUp, Rank],
            Boundary => &[Rank],
            Sections => &[Levels, LevUp],
            Structure => &[Rank, LevUp],
        }
    }
}

/// Build order of the steps: every step after all its dependencies,
/// ties broken by declaration order
pub fn build_order() -> Vec<ComputedKind> {
    let mut done: BTreeSet<ComputedKind> = BTreeSet::new();
    let mut sequence = Vec::with_capacity(ComputedKind::ALL.len());
    while sequence.len() < ComputedKind::ALL.len() {
        let ready = ComputedKind::ALL
            .into_iter()
            .find(|k| !done.contains(k) && k.deps().iter().all(|d| done.contains(d)));
        match ready {
            Some(kind) => {
                done.insert(kind);
                sequence.push(kind);
            }
            None => break,
        }
    }
    sequence
}

/// Outcome of a build step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    Failed(String),
    /// A dependency was not available
    Skipped(ComputedKind),
}

/// Lists of nodes per index position, as one flat array with offsets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLists {
    offsets: Vec<u32>,
    items: Vec<Node>,
}

impl NodeLists {
    pub fn from_lists<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<Node>>,
    {
        let mut offsets = vec![0];
        let mut items = Vec::new();
        for list in lists {
            items.extend(list);
            offsets.push(items.len() as u32);
        }
        Self { offsets, items }
    }

    /// List at position `i`; empty when out of range
    pub fn get(&self, i: usize) -> &[Node] {
        if i + 1 >= self.offsets.len() {
            return &[];
        }
        &self.items[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where derived indices are cached and what they are derived from
#[derive(Clone, Debug)]
pub struct CacheTarget {
    pub dir: PathBuf,
    /// Combined fingerprint of all inputs
    pub fingerprint: u64,
}

/// Inputs of the build
pub struct PrepareInput<'a> {
    pub otype: &'a OtypeData,
    pub oslots: &'a OslotsData,
    pub text: &'a TextConfig,
    /// Data of the section and structure features
    pub columns: &'a BTreeMap<String, Arc<NodeColumn>>,
    pub cache: Option<CacheTarget>,
}

/// The derived indices that could be built, and the status of every step
#[derive(Clone, Debug, Default)]
pub struct Computed {
    pub levels: Option<Arc<Levels>>,
    pub order: Option<Arc<Order>>,
    pub rank: Option<Arc<Rank>>,
    pub lev_up: Option<Arc<LevUp>>,
    pub lev_down: Option<Arc<LevDown>>,
    pub boundary: Option<Arc<Boundary>>,
    pub sections: Option<Arc<Sections>>,
    pub structure: Option<Arc<Structure>>,
    status: BTreeMap<ComputedKind, StepStatus>,
}

impl Computed {
    pub fn status(&self, kind: ComputedKind) -> Option<&StepStatus> {
        self.status.get(&kind)
    }

    pub fn is_ok(&self, kind: ComputedKind) -> bool {
        self.status.get(&kind) == Some(&StepStatus::Ok)
    }

    /// The indices every API needs: levels, order and rank
    pub fn base_ok(&self) -> bool {
        [ComputedKind::Levels, ComputedKind::Order, ComputedKind::Rank]
            .iter()
            .all(|k| self.is_ok(*k))
    }

    pub fn locality_ok(&self) -> bool {
        [ComputedKind::LevUp, ComputedKind::LevDown, ComputedKind::Boundary]
            .iter()
            .all(|k| self.is_ok(*k))
    }

    pub fn sections_ok(&self) -> bool {
        self.is_ok(ComputedKind::Sections)
    }

    pub fn structure_ok(&self) -> bool {
        self.is_ok(ComputedKind::Structure)
    }

    /// Names of the indices that were built
    pub fn available(&self) -> Vec<&'static str> {
        self.status
            .iter()
            .filter(|(_, s)| **s == StepStatus::Ok)
            .map(|(k, _)| k.name())
            .collect()
    }
}

/// Build all derived indices, reading and writing caches when configured
pub fn prepare(input: &PrepareInput<'_>, log: &mut MessageLog) -> Computed {
    let mut computed = Computed::default();
    for kind in build_order() {
        if let Some(dep) = kind
            .deps()
            .iter()
            .find(|d| !computed.is_ok(**d))
            .copied()
        {
            log.warning(format!(
                "{} not computed: needs {}",
                kind.name(),
                dep.name()
            ));
            computed.status.insert(kind, StepStatus::Skipped(dep));
            continue;
        }
        let outcome = run_step(kind, input, &mut computed, log);
        let status = match outcome {
            Ok(()) => StepStatus::Ok,
            Err(message) => {
                log.warning(format!("{} not computed: {}", kind.name(), message));
                StepStatus::Failed(message)
            }
        };
        computed.status.insert(kind, status);
    }
    computed
}

fn run_step(
    kind: ComputedKind,
    input: &PrepareInput<'_>,
    computed: &mut Computed,
    log: &mut MessageLog,
) -> Result<(), String> {
    let missing = |k: ComputedKind| format!("{} missing", k.name());
    match kind {
        ComputedKind::Levels => {
            let value = cached(kind, input, log, || Levels::compute(input.otype, input.oslots))?;
            computed.levels = Some(Arc::new(value));
        }
        ComputedKind::Order => {
            let levels = computed.levels.clone().ok_or_else(|| missing(ComputedKind::Levels))?;
            let value = cached(kind, input, log, || {
                Order::compute(input.otype, input.oslots, &levels)
            })?;
            computed.order = Some(Arc::new(value));
        }
        ComputedKind::Rank => {
            let order = computed.order.clone().ok_or_else(|| missing(ComputedKind::Order))?;
            let value = cached(kind, input, log, || Rank::compute(&order))?;
            computed.rank = Some(Arc::new(value));
        }
        ComputedKind::LevUp => {
            let rank = computed.rank.clone().ok_or_else(|| missing(ComputedKind::Rank))?;
            let value = cached(kind, input, log, || {
                LevUp::compute(input.otype, input.oslots, &rank)
            })?;
            computed.lev_up = Some(Arc::new(value));
        }
        ComputedKind::LevDown => {
            let lev_up = computed.lev_up.clone().ok_or_else(|| missing(ComputedKind::LevUp))?;
            let rank = computed.rank.clone().ok_or_else(|| missing(ComputedKind::Rank))?;
            let value = cached(kind, input, log, || {
                LevDown::compute(input.otype, &lev_up, &rank)
            })?;
            computed.lev_down = Some(Arc::new(value));
        }
        ComputedKind::Boundary => {
            let rank = computed.rank.clone().ok_or_else(|| missing(ComputedKind::Rank))?;
            let value = cached(kind, input, log, || {
                Boundary::compute(input.otype, input.oslots, &rank)
            })?;
            computed.boundary = Some(Arc::new(value));
        }
        ComputedKind::Sections => {
            if !input.text.sections_declared() {
                return Err("no section types and features configured".to_string());
            }
            let lev_up = computed.lev_up.clone().ok_or_else(|| missing(ComputedKind::LevUp))?;
            let value = cached(kind, input, log, || {
                Sections::compute(input.otype, &lev_up, input.text, input.columns)
            })?;
            computed.sections = Some(Arc::new(value));
        }
        ComputedKind::Structure => {
            if !input.text.structure_declared() {
                return Err("no structure types and features configured".to_string());
            }
            let lev_up = computed.lev_up.clone().ok_or_else(|| missing(ComputedKind::LevUp))?;
            let rank = computed.rank.clone().ok_or_else(|| missing(ComputedKind::Rank))?;
            let value = cached(kind, input, log, || {
                Structure::compute(input.otype, &rank, &lev_up, input.text, input.columns)
            })?;
            if !value.hd_mult.is_empty() {
                log.warning(format!(
                    "structure: {} heading(s) occur more than once",
                    value.hd_mult.len()
                ));
            }
            computed.structure = Some(Arc::new(value));
        }
    }
    Ok(())
}

/// Read a step result from cache, or compute and cache it
fn cached<T, F>(
    kind: ComputedKind,
    input: &PrepareInput<'_>,
    log: &mut MessageLog,
    compute: F,
) -> Result<T, String>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T, String>,
{
    let Some(target) = &input.cache else {
        return compute();
    };
    let path = cache_path(&target.dir, kind.name());
    let fingerprint = combine_fingerprints(&[target.fingerprint, kind as u64]);
    match read_cache::<T>(&path, fingerprint) {
        Ok(Some(value)) => {
            debug!(index = kind.name(), "loaded from cache");
            return Ok(value);
        }
        Ok(None) => {}
        Err(err) => log.warning(format!("cannot read cached {}: {}", kind.name(), err)),
    }
    let value = compute()?;
    log.info(format!("computed {}", kind.name()));
    if let Err(err) = write_cache(&path, fingerprint, &value) {
        log.warning(format!("cannot cache {}: {}", kind.name(), err));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_build_order_respects_dependencies() {
        let order = build_order();
        assert_eq!(order.len(), ComputedKind::ALL.len());
        for (i, kind) in order.iter().enumerate() {
            for dep in kind.deps() {
                let pos = order.iter().position(|k| k == dep).unwrap();
                assert!(pos < i, "{} before {}", dep.name(), kind.name());
            }
        }
        assert_eq!(ComputedKind::from_name("levUp"), Some(ComputedKind::LevUp));
    }

    #[test]
    fn test_node_lists() {
        let lists = NodeLists::from_lists(vec![vec![3, 1], vec![], vec![7]]);
        assert_eq!(lists.len(), 3);
        assert_eq!(lists.get(0), &[3, 1]);
        assert!(lists.get(1).is_empty());
        assert_eq!(lists.get(2), &[7]);
        assert!(lists.get(3).is_empty());
    }

    #[test]
    fn test_missing_sections_are_not_fatal() {
        let corpus = CorpusBuilder::sentences();
        let (otype, oslots) = corpus.warp().unwrap();
        let text = TextConfig::default();
        let columns = BTreeMap::new();
        let input = PrepareInput {
            otype: &otype,
            oslots: &oslots,
            text: &text,
            columns: &columns,
            cache: None,
        };
        let mut log = MessageLog::default();
        let computed = prepare(&input, &mut log);
        assert!(computed.base_ok());
        assert!(computed.locality_ok());
        assert!(!computed.sections_ok());
        assert!(!computed.structure_ok());
        assert!(matches!(
            computed.status(ComputedKind::Sections),
            Some(StepStatus::Failed(_))
        ));
        assert_eq!(computed.available().len(), 6);
    }

    #[test]
    fn test_cached_build_is_identical() {
        let dir = tempfile::TempDir::new().unwrap();
        let corpus = CorpusBuilder::sentences();
        let (otype, oslots) = corpus.warp().unwrap();
        let text = TextConfig::default();
        let columns = BTreeMap::new();
        let input = PrepareInput {
            otype: &otype,
            oslots: &oslots,
            text: &text,
            columns: &columns,
            cache: Some(CacheTarget {
                dir: dir.path().to_path_buf(),
                fingerprint: 99,
            }),
        };
        let mut log = MessageLog::default();
        let first = prepare(&input, &mut log);
        assert!(cache_path(dir.path(), "order").exists());
        let second = prepare(&input, &mut log);
        assert_eq!(first.order, second.order);
        assert_eq!(first.rank, second.rank);
        assert_eq!(first.levels, second.levels);
    }
}
