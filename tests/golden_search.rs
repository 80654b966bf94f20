use tempfile::TempDir;

use tapestry::testing::CorpusBuilder;
use tapestry::{Fabric, FabricConfig, TapestryError};

fn setup_fabric(corpus: &CorpusBuilder, features: &[&str]) -> (TempDir, Fabric) {
    let tmp = TempDir::new().unwrap();
    corpus.write_to(tmp.path()).unwrap();
    let mut fabric = Fabric::new(FabricConfig::new(tmp.path()));
    fabric.load(features, false).unwrap();
    (tmp, fabric)
}

#[test]
fn golden_sentence_atoms_in_canonical_order() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::sentences(), &[]);

    let walked: Vec<u32> = fabric.api().unwrap().nodes().walk().collect();
    assert_eq!(walked, vec![11, 1, 2, 3, 4, 5, 12, 6, 7, 8, 9, 10]);

    let results = fabric.search("sentence s", None).unwrap();
    assert_eq!(results, vec![vec![11], vec![12]]);
}

#[test]
fn golden_nested_sections() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &["pos"]);

    let template = "
book
  chapter chapter=2
    verse verse=1
      w:word pos=art
";
    let results = fabric.search(template, None).unwrap();
    assert_eq!(results, vec![vec![9, 11, 14, 6]]);

    let results = fabric.search("verse\n  word pos=art\n", None).unwrap();
    assert_eq!(results, vec![vec![12, 2], vec![14, 6]]);
}

#[test]
fn golden_features_load_on_demand() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &[]);
    assert!(fabric.api().unwrap().node_feature("pos").is_none());

    let results = fabric.search("word pos=verb\n", None).unwrap();
    assert_eq!(results, vec![vec![5]]);
    assert!(fabric.api().unwrap().node_feature("pos").is_some());

    let results = fabric.search("phrase\n-subject> phrase\n", None).unwrap();
    assert_eq!(results, vec![vec![18, 17]]);
}

#[test]
fn golden_quantified_phrases() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &["pos"]);

    let results = fabric
        .search("phrase\n/without/\n  word pos=noun\n/-/\n", None)
        .unwrap();
    assert_eq!(results, vec![vec![18]]);
}

#[test]
fn search_is_deterministic_and_chunking_keeps_order() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &["pos"]);
    let template = "phrase\n  word\n";

    let first = fabric.search(template, None).unwrap();
    let second = fabric.search(template, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);

    fabric.study(template).unwrap();
    let mut chunked = Vec::new();
    loop {
        let chunk = fabric.fetch(Some(3)).unwrap();
        if chunk.is_empty() {
            break;
        }
        chunked.extend(chunk);
    }
    assert_eq!(chunked.len(), first.len());
    assert_eq!(fabric.count(None).unwrap(), 8);
    assert_eq!(fabric.count(Some(5)).unwrap(), 5);
}

#[test]
fn compile_errors_are_aggregated() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &["pos"]);

    let err = fabric.search("novel\nword gloss=x\n", None).unwrap_err();
    let TapestryError::Query(messages) = err else {
        panic!("expected a query error");
    };
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.contains("novel")));
    assert!(messages.iter().any(|m| m.contains("gloss")));
    assert!(matches!(fabric.fetch(None), Err(TapestryError::NoStudy)));
}

#[test]
fn plan_and_glean() {
    let (_tmp, mut fabric) = setup_fabric(&CorpusBuilder::bible(), &["pos"]);

    fabric.study("verse\n  word pos=art\n").unwrap();
    let plan = fabric.show_plan(true).unwrap();
    assert!(plan.contains("Search order:"));
    let results = fabric.fetch(Some(1)).unwrap();
    assert_eq!(fabric.glean(&results[0]).unwrap(), "Genesis 1:1 the");
    assert!(fabric.relations_legend().contains("[["));
}
