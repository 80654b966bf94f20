//! Integration tests for the index invariants
//!
//! Datasets are written to disk, loaded through a `Fabric` and checked
//! with the invariant framework; indices built twice must be identical.

use tapestry::api::ComputedIndex;
use tapestry::testing::prelude::*;
use tapestry::testing::{RankInvertsOrder, StrictOrder};
use tapestry::{Api, Fabric, FabricConfig};
use tempfile::TempDir;

/// Words in sentences of seven, clauses of three and overlapping phrases
fn generated_corpus(words: u32) -> CorpusBuilder {
    let mut corpus = CorpusBuilder::new("word", words);
    let mut start = 1;
    while start <= words {
        let end = (start + 6).min(words);
        corpus = corpus.node("sentence", start..=end);
        start = end + 1;
    }
    let mut start = 1;
    while start <= words {
        let end = (start + 2).min(words);
        corpus = corpus.node("clause", start..=end);
        start = end + 1;
    }
    for start in (1..words).step_by(2) {
        corpus = corpus.node("phrase", [start, start + 1]);
    }
    corpus.node_feature("parity", (1..=words).map(|n| (n, if n % 2 == 0 { "even" } else { "odd" })))
}

fn load(dir: &TempDir, use_cache: bool) -> Fabric {
    let config = FabricConfig::new(dir.path()).with_cache(use_cache);
    let mut fabric = Fabric::new(config);
    assert!(fabric.load(["parity"], false).is_some());
    fabric
}

fn order_of(api: &Api) -> Vec<u32> {
    api.nodes().walk().collect()
}

#[test]
fn test_loaded_datasets_satisfy_invariants() {
    for corpus in [
        CorpusBuilder::bible(),
        CorpusBuilder::sentences(),
        generated_corpus(100),
    ] {
        let tmp = TempDir::new().unwrap();
        corpus.write_to(tmp.path()).unwrap();
        let mut fabric = Fabric::new(FabricConfig::new(tmp.path()));
        let api = fabric.load(Vec::<String>::new(), false).unwrap();

        let violations = check_all_invariants(api, &default_invariants());
        for v in &violations {
            eprintln!("{}", v);
        }
        assert!(violations.is_empty());
    }
}

#[test]
fn test_index_building_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    generated_corpus(60).write_to(tmp.path()).unwrap();

    let first = load(&tmp, false);
    let second = load(&tmp, false);
    let (a, b) = (first.api().unwrap(), second.api().unwrap());
    assert_eq!(order_of(a), order_of(b));
    for name in ["levels", "order", "rank"] {
        let same = match (a.computed(name), b.computed(name)) {
            (Some(ComputedIndex::Levels(x)), Some(ComputedIndex::Levels(y))) => x == y,
            (Some(ComputedIndex::Order(x)), Some(ComputedIndex::Order(y))) => x == y,
            (Some(ComputedIndex::Rank(x)), Some(ComputedIndex::Rank(y))) => x == y,
            _ => false,
        };
        assert!(same, "{} differs between builds", name);
    }
}

#[test]
fn test_cached_indices_match_fresh_ones() {
    let tmp = TempDir::new().unwrap();
    generated_corpus(40).write_to(tmp.path()).unwrap();

    let computed = load(&tmp, true);
    let cached = load(&tmp, true);
    let fresh = load(&tmp, false);
    let order = order_of(fresh.api().unwrap());
    assert_eq!(order_of(computed.api().unwrap()), order);
    assert_eq!(order_of(cached.api().unwrap()), order);

    let api = cached.api().unwrap();
    assert!(RankInvertsOrder.check(api).is_ok());
    assert!(StrictOrder.check(api).is_ok());
}

#[test]
fn test_generated_search_counts() {
    let tmp = TempDir::new().unwrap();
    generated_corpus(70).write_to(tmp.path()).unwrap();
    let mut fabric = load(&tmp, true);

    // 35 odd words, each in one of ten sentences
    let results = fabric.search("sentence\n  word parity=odd\n", None).unwrap();
    assert_eq!(results.len(), 35);
    let sentences = fabric.search_shallow("sentence\n  word parity=odd\n", 1).unwrap();
    assert_eq!(sentences.len(), 10);
}
