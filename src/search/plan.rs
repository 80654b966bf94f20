//! Search planning
//!
//! Planning a compiled query happens in three passes:
//! - spin: shrink yarns along generating relations until nothing changes,
//!   but only from a yarn that is clearly smaller than the one it prunes
//!   (`yarn_ratio`)
//! - spread: estimate, by sampling, how many right nodes a left node
//!   reaches over each relation in each direction
//! - stitch: choose the binding order, starting from the smallest yarn and
//!   then always taking the object that is cheapest to reach from what is
//!   already bound

use std::fmt::Write as _;

use ordered_float::OrderedFloat;
use roaring::RoaringBitmap;
use tracing::debug;

use super::compile::{Quantifier, Query};
use super::relations::Relation;
use crate::api::Api;
use crate::config::SearchSettings;
use crate::feature::Node;

/// How a step reaches its object from an already bound one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub edge: usize,
    /// Walk the edge from `from` to `to`; otherwise backwards
    pub forward: bool,
}

#[derive(Clone, Debug)]
pub struct Step {
    pub object: usize,
    pub via: Option<Link>,
    /// Edges to test once the object is bound
    pub checks: Vec<usize>,
    /// Candidates when `via` is absent, in canonical order
    pub scan: Vec<Node>,
    pub cost: f64,
}

#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
    /// Per edge: estimated spread forwards and backwards
    pub spreads: Vec<(f64, f64)>,
    /// Rough size of the search space
    pub estimate: f64,
    pub expensive: bool,
    pub notes: Vec<String>,
}

/// Plan a query and all its quantifier queries
pub fn plan(query: &mut Query, api: &Api, settings: &SearchSettings) {
    let spun = spin(query, api, settings);
    let mut notes = Vec::new();
    if spun > 0 {
        notes.push(format!("spinning reduced {} yarns", spun));
    }
    for object in &query.objects {
        if object.yarn.is_empty() {
            notes.push(format!(
                "line {}: no nodes for {}, so no results",
                object.line, object.description
            ));
        }
    }
    let spreads = query
        .edges
        .iter()
        .map(|edge| {
            let yarn = |i: usize| &query.objects[i].yarn;
            (
                spread(api, settings, edge.relation.as_ref(), yarn(edge.from), yarn(edge.to)),
                spread(api, settings, edge.converse.as_ref(), yarn(edge.to), yarn(edge.from)),
            )
        })
        .collect::<Vec<_>>();
    let steps = stitch(query, api, &spreads);
    let estimate = steps
        .iter()
        .fold(1.0, |total, step| total * step.cost.max(1.0));
    let expensive = estimate > settings.expensive_threshold;
    if expensive {
        notes.push(format!(
            "estimated search space of {:.0} exceeds {:.0}",
            estimate, settings.expensive_threshold
        ));
    }
    debug!(
        objects = query.objects.len(),
        edges = query.edges.len(),
        estimate,
        "planned search"
    );
    query.plan = Plan {
        steps,
        spreads,
        estimate,
        expensive,
        notes,
    };

    for gate in &mut query.quantifiers {
        match &mut gate.quantifier {
            Quantifier::Without(sub) => plan(sub, api, settings),
            Quantifier::Where {
                condition,
                consequence,
            } => {
                plan(condition, api, settings);
                plan(consequence, api, settings);
            }
            Quantifier::With(alternatives) => {
                for sub in alternatives {
                    plan(sub, api, settings);
                }
            }
        }
    }
}

/// Arc consistency over generating relations; returns how many times a
/// yarn shrank
fn spin(query: &mut Query, api: &Api, settings: &SearchSettings) -> usize {
    let mut reductions = 0;
    loop {
        let mut changed = false;
        for e in 0..query.edges.len() {
            for forward in [true, false] {
                let edge = &query.edges[e];
                let (src, dst, relation) = if forward {
                    (edge.from, edge.to, &edge.relation)
                } else {
                    (edge.to, edge.from, &edge.converse)
                };
                if dst < query.pinned || !relation.generates(api) {
                    continue;
                }
                let (source, target) = (&query.objects[src].yarn, &query.objects[dst].yarn);
                let (ns, nt) = (source.len() as f64, target.len() as f64);
                if ns == 0.0 || nt == 0.0 || ns * settings.yarn_ratio > nt {
                    continue;
                }
                let mut reached = RoaringBitmap::new();
                for node in source {
                    if let Some(nodes) = relation.related(api, node) {
                        reached.extend(nodes);
                    }
                }
                reached &= target;
                if reached.len() < target.len() {
                    query.objects[dst].yarn = reached;
                    reductions += 1;
                    changed = true;
                }
            }
        }
        if !changed {
            return reductions;
        }
    }
}

/// Up to `limit` nodes spread evenly over a yarn
fn sample(yarn: &RoaringBitmap, limit: usize) -> Vec<Node> {
    let len = yarn.len() as usize;
    let stride = if len > limit { len / limit } else { 1 };
    yarn.iter().step_by(stride.max(1)).take(limit).collect()
}

/// Average number of target nodes a source node is related to
fn spread(
    api: &Api,
    settings: &SearchSettings,
    relation: &dyn Relation,
    source: &RoaringBitmap,
    target: &RoaringBitmap,
) -> f64 {
    if source.is_empty() || target.is_empty() {
        return 0.0;
    }
    let lefts = sample(source, settings.try_limit_from);
    if relation.generates(api) {
        let reached: usize = lefts
            .iter()
            .map(|&n| {
                relation
                    .related(api, n)
                    .map_or(0, |nodes| nodes.iter().filter(|&&m| target.contains(m)).count())
            })
            .sum();
        return reached as f64 / lefts.len() as f64;
    }
    let rights = sample(target, settings.try_limit_to);
    let hits: usize = lefts
        .iter()
        .map(|&n| {
            rights
                .iter()
                .filter(|&&m| relation.holds(api, n, m))
                .count()
        })
        .sum();
    hits as f64 / (lefts.len() * rights.len()) as f64 * target.len() as f64
}

fn stitch(query: &Query, api: &Api, spreads: &[(f64, f64)]) -> Vec<Step> {
    let count = query.objects.len();
    let mut bound = vec![false; count];
    let mut steps: Vec<Step> = Vec::with_capacity(count);
    let yarn_size = |i: usize| query.objects[i].yarn.len() as f64;

    while steps.len() < count {
        let (object, via, cost) = if steps.len() < query.pinned {
            (steps.len(), None, 1.0)
        } else {
            let mut best: Option<(OrderedFloat<f64>, usize, Option<Link>)> = None;
            for (e, edge) in query.edges.iter().enumerate() {
                for forward in [true, false] {
                    let (src, dst, relation, spread) = if forward {
                        (edge.from, edge.to, &edge.relation, spreads[e].0)
                    } else {
                        (edge.to, edge.from, &edge.converse, spreads[e].1)
                    };
                    if !bound[src] || bound[dst] {
                        continue;
                    }
                    let (cost, link) = if relation.generates(api) {
                        (spread, Some(Link { edge: e, forward }))
                    } else {
                        (yarn_size(dst), None)
                    };
                    let candidate = (OrderedFloat(cost), dst, link);
                    if best.as_ref().map_or(true, |b| (candidate.0, candidate.1) < (b.0, b.1)) {
                        best = Some(candidate);
                    }
                }
            }
            match best {
                Some((cost, object, link)) => (object, link, cost.into_inner()),
                None => {
                    let object = (0..count)
                        .filter(|&i| !bound[i])
                        .min_by_key(|&i| (query.objects[i].yarn.len(), i))
                        .unwrap_or(0);
                    (object, None, yarn_size(object))
                }
            }
        };
        bound[object] = true;
        let checks = query
            .edges
            .iter()
            .enumerate()
            .filter(|(e, edge)| {
                via.map_or(true, |link| link.edge != *e)
                    && ((edge.from == object && bound[edge.to])
                        || (edge.to == object && bound[edge.from]))
            })
            .map(|(e, _)| e)
            .collect();
        let scan = match via {
            Some(_) => Vec::new(),
            None if object < query.pinned => Vec::new(),
            None => api.nodes().sort_nodes(query.objects[object].yarn.iter()),
        };
        steps.push(Step {
            object,
            via,
            checks,
            scan,
            cost,
        });
    }
    steps
}

/// Human readable account of a plan
pub fn describe(query: &Query, details: bool) -> String {
    let mut out = String::new();
    let plan = &query.plan;
    let _ = writeln!(
        out,
        "Search with {} objects and {} relations",
        query.objects.len(),
        query.edges.len()
    );
    if details {
        for (i, object) in query.objects.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:>2} {:<12} {:>8} nodes  line {}: {}",
                i,
                object.name,
                object.yarn.len(),
                object.line,
                object.description
            );
        }
        for (e, edge) in query.edges.iter().enumerate() {
            let (forward, backward) = plan.spreads.get(e).copied().unwrap_or_default();
            let _ = writeln!(
                out,
                "  e{:<2} {} {} {}  spread {:.1} / {:.1}",
                e,
                query.objects[edge.from].name,
                edge.relation.symbol(),
                query.objects[edge.to].name,
                forward,
                backward
            );
        }
    }
    let _ = writeln!(out, "Search order:");
    for (i, step) in plan.steps.iter().enumerate() {
        let object = &query.objects[step.object];
        let how = match step.via {
            Some(link) => {
                let edge = &query.edges[link.edge];
                let (from, relation) = if link.forward {
                    (edge.from, &edge.relation)
                } else {
                    (edge.to, &edge.converse)
                };
                format!("via {} {}", query.objects[from].name, relation.symbol())
            }
            None if step.object < query.pinned => "given".to_string(),
            None => format!("scan {} nodes", step.scan.len()),
        };
        let _ = write!(out, "  {:>2} {:<12} {}", i, object.name, how);
        if !step.checks.is_empty() {
            let checks: Vec<String> = step.checks.iter().map(|e| format!("e{}", e)).collect();
            let _ = write!(out, "  checks {}", checks.join(","));
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "Estimated search space {:.0}{}",
        plan.estimate,
        if plan.expensive { " (expensive)" } else { "" }
    );
    for note in &plan.notes {
        let _ = writeln!(out, "  {}", note);
    }
    if !query.quantifiers.is_empty() {
        let _ = writeln!(out, "{} quantifiers", query.quantifiers.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::compile::{compile, Sets};
    use crate::search::syntax::parse;
    use crate::testing::CorpusBuilder;

    fn planned(template: &str, settings: &SearchSettings) -> Query {
        let api = CorpusBuilder::bible().api().unwrap();
        let mut query = compile(&api, &parse(template).unwrap(), &Sets::new()).unwrap();
        plan(&mut query, &api, settings);
        query
    }

    #[test]
    fn test_sample_is_spread_out() {
        let yarn: RoaringBitmap = (1..=100).collect();
        let picked = sample(&yarn, 10);
        assert_eq!(picked.len(), 10);
        assert_eq!(picked[0], 1);
        assert_eq!(picked[1], 11);
        assert_eq!(sample(&yarn, 200).len(), 100);
    }

    #[test]
    fn test_spinning_shrinks_yarns() {
        let query = planned(
            "chapter chapter=2\n  word\n",
            &SearchSettings::default(),
        );
        let words: Vec<Node> = query.objects[1].yarn.iter().collect();
        assert_eq!(words, vec![5, 6, 7, 8]);
        assert!(query.plan.notes[0].contains("spinning"));
    }

    #[test]
    fn test_order_starts_small_and_follows_edges() {
        let query = planned("word\nbook\nw:word pos=verb\n", &SearchSettings::default());
        assert_eq!(query.plan.steps.len(), 3);
        assert_eq!(query.plan.steps[0].object, 1);
        assert_eq!(query.plan.steps[1].object, 2);

        // without spinning the single verb is the smallest yarn
        let no_spin = SearchSettings::default().with_yarn_ratio(100.0);
        let query = planned("verse\n  word pos=verb\n", &no_spin);
        let order: Vec<usize> = query.plan.steps.iter().map(|s| s.object).collect();
        assert_eq!(order, vec![1, 0]);
        let via = query.plan.steps[1].via.unwrap();
        assert!(!via.forward);
    }

    #[test]
    fn test_test_only_relations_become_checks() {
        let query = planned("a:verse\nb:verse\na < b\n", &SearchSettings::default());
        let second = &query.plan.steps[1];
        assert!(second.via.is_none());
        assert_eq!(second.checks, vec![0]);
        assert_eq!(second.scan.len(), 4);
    }

    #[test]
    fn test_expensive_plans_are_flagged() {
        let settings = SearchSettings {
            expensive_threshold: 10.0,
            ..SearchSettings::default()
        };
        let query = planned("word\nword\n", &settings);
        assert!(query.plan.expensive);
        assert_eq!(query.plan.estimate, 64.0);
        let text = describe(&query, true);
        assert!(text.contains("(expensive)"));
        assert!(text.contains("scan 8 nodes"));
    }
}
