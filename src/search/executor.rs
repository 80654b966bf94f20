//! Backtracking over a planned query
//!
//! A `Cursor` binds the objects of a query in plan order, one stack frame
//! per bound object. It is resumable: every call to `next` continues where
//! the previous one stopped, so results can be fetched in chunks and come
//! out in the same order however they are chunked.

use std::collections::HashMap;

use super::compile::{Quantifier, QuantifierGate, Query};
use crate::api::Api;
use crate::feature::Node;

/// One search result: a node per template atom, in template order
pub type Tuple = Vec<Node>;

#[derive(Debug)]
struct Frame {
    /// Candidates generated from a bound neighbour; `None` means the
    /// step's own scan list
    generated: Option<Vec<Node>>,
    pos: usize,
}

#[derive(Debug)]
pub struct Cursor {
    /// Objects bound from outside
    fixed: Vec<Option<Node>>,
    binding: Vec<Node>,
    frames: Vec<Frame>,
    started: bool,
    exhausted: bool,
    /// (quantifier, node) -> passes
    memo: HashMap<(usize, Node), bool>,
}

impl Cursor {
    pub fn new(query: &Query) -> Self {
        Self::with_fixed(query, &[])
    }

    /// A cursor with the leading objects bound to `fixed`
    pub fn with_fixed(query: &Query, fixed: &[Node]) -> Self {
        let count = query.objects.len();
        let mut slots = vec![None; count];
        for (slot, &node) in slots.iter_mut().zip(fixed) {
            *slot = Some(node);
        }
        Self {
            fixed: slots,
            binding: vec![0; count],
            frames: Vec::new(),
            started: false,
            exhausted: false,
            memo: HashMap::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The next result, or `None` when the search space is exhausted
    pub fn next(&mut self, query: &Query, api: &Api) -> Option<Tuple> {
        if self.exhausted {
            return None;
        }
        let steps = &query.plan.steps;
        if steps.is_empty() {
            self.exhausted = true;
            return None;
        }
        if !self.started {
            self.started = true;
            let frame = self.frame(query, api, 0);
            self.frames.push(frame);
        }
        loop {
            let Some(depth) = self.frames.len().checked_sub(1) else {
                self.exhausted = true;
                return None;
            };
            let step = &steps[depth];
            let frame = &mut self.frames[depth];
            let candidates = frame.generated.as_deref().unwrap_or(&step.scan);
            let candidate = candidates.get(frame.pos).copied();
            frame.pos += 1;
            let Some(node) = candidate else {
                self.frames.pop();
                continue;
            };
            if !self.accepts(query, api, depth, node) {
                continue;
            }
            if depth + 1 == steps.len() {
                return Some(self.binding.clone());
            }
            let frame = self.frame(query, api, depth + 1);
            self.frames.push(frame);
        }
    }

    /// Up to `limit` further results
    pub fn take(&mut self, query: &Query, api: &Api, limit: Option<usize>) -> Vec<Tuple> {
        let mut results = Vec::new();
        while limit.map_or(true, |l| results.len() < l) {
            match self.next(query, api) {
                Some(tuple) => results.push(tuple),
                None => break,
            }
        }
        results
    }

    fn frame(&self, query: &Query, api: &Api, depth: usize) -> Frame {
        let step = &query.plan.steps[depth];
        let generated = if let Some(node) = self.fixed[step.object] {
            Some(vec![node])
        } else {
            step.via.map(|link| {
                let edge = &query.edges[link.edge];
                let (left, relation) = if link.forward {
                    (edge.from, &edge.relation)
                } else {
                    (edge.to, &edge.converse)
                };
                relation
                    .related(api, self.binding[left])
                    .unwrap_or_default()
            })
        };
        Frame { generated, pos: 0 }
    }

    fn accepts(&mut self, query: &Query, api: &Api, depth: usize, node: Node) -> bool {
        let step = &query.plan.steps[depth];
        let object = step.object;
        if self.fixed[object].is_none() && !query.objects[object].yarn.contains(node) {
            return false;
        }
        self.binding[object] = node;
        for &e in &step.checks {
            let edge = &query.edges[e];
            if !edge
                .relation
                .holds(api, self.binding[edge.from], self.binding[edge.to])
            {
                return false;
            }
        }
        for (q, gate) in query.quantifiers.iter().enumerate() {
            if gate.object != object {
                continue;
            }
            let passes = match self.memo.get(&(q, node)) {
                Some(&passes) => passes,
                None => {
                    let passes = quantifier_holds(gate, api, node);
                    self.memo.insert((q, node), passes);
                    passes
                }
            };
            if !passes {
                return false;
            }
        }
        true
    }
}

fn has_result(query: &Query, api: &Api, fixed: &[Node]) -> bool {
    Cursor::with_fixed(query, fixed).next(query, api).is_some()
}

fn quantifier_holds(gate: &QuantifierGate, api: &Api, node: Node) -> bool {
    match &gate.quantifier {
        Quantifier::Without(sub) => !has_result(sub, api, &[node]),
        Quantifier::Where {
            condition,
            consequence,
        } => {
            let mut cursor = Cursor::with_fixed(condition, &[node]);
            while let Some(tuple) = cursor.next(condition, api) {
                if !has_result(consequence, api, &tuple) {
                    return false;
                }
            }
            true
        }
        Quantifier::With(alternatives) => alternatives
            .iter()
            .any(|sub| has_result(sub, api, &[node])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchSettings;
    use crate::search::compile::{compile, Sets};
    use crate::search::plan::plan;
    use crate::search::syntax::parse;
    use crate::testing::CorpusBuilder;

    fn run(template: &str) -> Vec<Tuple> {
        let api = CorpusBuilder::bible().api().unwrap();
        let mut query = compile(&api, &parse(template).unwrap(), &Sets::new()).unwrap();
        plan(&mut query, &api, &SearchSettings::default());
        Cursor::new(&query).take(&query, &api, None)
    }

    #[test]
    fn test_embedding_search() {
        let results = run("verse\n  word pos=art\n");
        assert_eq!(results, vec![vec![12, 2], vec![14, 6]]);
    }

    #[test]
    fn test_adjacency_and_features() {
        let results = run("word pos=art\n<: word pos=noun\n");
        assert_eq!(results, vec![vec![2, 3], vec![6, 7]]);
        let results = run("a:word\nb:word\na .lex. b\na < b\n");
        assert_eq!(results, vec![vec![2, 6]]);
    }

    #[test]
    fn test_edges() {
        let results = run("phrase function=Pred\n-subject> phrase\n");
        assert_eq!(results, vec![vec![18, 17]]);
        let results = run("a:verse\nb:verse\na -crossref=60> b\n");
        assert_eq!(results, vec![vec![13, 15]]);
    }

    #[test]
    fn test_quantifiers() {
        let without = run("phrase\n/without/\n  word pos=noun\n/-/\n");
        assert_eq!(without, vec![vec![18]]);
        let with = run("verse\n/with/\n  word pos=verb\n/or/\n  word lex=earth\n/-/\n");
        assert_eq!(with, vec![vec![14], vec![15]]);
        let where_ = run("chapter\n/where/\n  w:word pos=art\n/have/\n  n:word pos=noun\nw <: n\n/-/\n");
        assert_eq!(where_, vec![vec![10], vec![11]]);
        // the last noun of a chapter is followed by a word only in chapter 1
        let where_not = run("chapter\n/where/\n  w:word pos=noun\n/have/\nx:word\nw <: x\n/-/\n");
        assert_eq!(where_not, vec![vec![10]]);
    }

    #[test]
    fn test_chunked_fetching_keeps_order() {
        let api = CorpusBuilder::bible().api().unwrap();
        let mut query = compile(&api, &parse("phrase\n  word\n").unwrap(), &Sets::new()).unwrap();
        plan(&mut query, &api, &SearchSettings::default());
        let all = Cursor::new(&query).take(&query, &api, None);
        assert_eq!(all.len(), 8);
        let mut cursor = Cursor::new(&query);
        let mut chunked = Vec::new();
        loop {
            let chunk = cursor.take(&query, &api, Some(3));
            if chunk.is_empty() {
                break;
            }
            chunked.extend(chunk);
        }
        assert_eq!(chunked, all);
        assert!(cursor.is_exhausted());
    }
}
