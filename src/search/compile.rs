//! Template compilation
//!
//! Turns a parsed template into a `Query`: one object per atom with its
//! yarn (the nodes that satisfy the atom on its own), one edge per
//! relation, and a nested query per quantifier. Problems are collected and
//! reported together.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use regex::Regex;
use roaring::RoaringBitmap;

use super::plan::Plan;
use super::relations::{self, Relation};
use super::syntax::{
    AtomRef, AtomSpec, FeatureCond, FeatureSpec, OpSpec, QuantifierKind, Template, PARENT,
};
use crate::api::{Api, NodeFeature};
use crate::error::{Result, TapestryError};
use crate::feature::Value;

/// Custom node sets usable as atom types
pub type Sets = BTreeMap<String, RoaringBitmap>;

/// A template atom together with its candidate nodes
#[derive(Clone, Debug)]
pub struct QueryObject {
    pub name: String,
    pub kind: String,
    pub line: usize,
    pub description: String,
    pub yarn: RoaringBitmap,
}

/// A relation between two objects
#[derive(Clone, Debug)]
pub struct QueryEdge {
    pub from: usize,
    pub to: usize,
    pub relation: Box<dyn Relation>,
    pub converse: Box<dyn Relation>,
    pub line: usize,
}

#[derive(Clone, Debug)]
pub enum Quantifier {
    /// No result of the query exists
    Without(Box<Query>),
    /// Every result of `condition` extends to a result of `consequence`
    Where {
        condition: Box<Query>,
        consequence: Box<Query>,
    },
    /// At least one alternative has a result
    With(Vec<Query>),
}

/// A quantifier attached to an object. Its queries bind `..` as object 0.
#[derive(Clone, Debug)]
pub struct QuantifierGate {
    pub object: usize,
    pub line: usize,
    pub quantifier: Quantifier,
}

#[derive(Clone, Debug, Default)]
pub struct Query {
    pub objects: Vec<QueryObject>,
    pub edges: Vec<QueryEdge>,
    pub quantifiers: Vec<QuantifierGate>,
    /// Number of leading objects bound from outside
    pub pinned: usize,
    pub plan: Plan,
}

impl Query {
    pub fn relation_count(&self) -> usize {
        self.edges.len()
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cond {
            FeatureCond::Equals(values) => write!(f, "{}={}", self.feature, values.join("|")),
            FeatureCond::Differs(values) => write!(f, "{}#{}", self.feature, values.join("|")),
            FeatureCond::Present => write!(f, "{}", self.feature),
            FeatureCond::Absent => write!(f, "{}#", self.feature),
            FeatureCond::Less(bound) => write!(f, "{}<{}", self.feature, bound),
            FeatureCond::Greater(bound) => write!(f, "{}>{}", self.feature, bound),
            FeatureCond::Matches(pattern) => write!(f, "{}~{}", self.feature, pattern),
        }
    }
}

fn describe(atom: &AtomSpec) -> String {
    let mut text = atom.kind.clone();
    for spec in &atom.features {
        text.push(' ');
        text.push_str(&spec.to_string());
    }
    text
}

/// Compile a template against an api
pub fn compile(api: &Api, template: &Template, sets: &Sets) -> Result<Query> {
    let mut compiler = Compiler {
        api,
        sets,
        errors: Vec::new(),
    };
    let query = compiler.query(&[template], None, 0);
    if compiler.errors.is_empty() {
        Ok(query)
    } else {
        Err(TapestryError::Query(compiler.errors))
    }
}

struct Compiler<'a> {
    api: &'a Api,
    sets: &'a Sets,
    errors: Vec<String>,
}

impl<'a> Compiler<'a> {
    /// Record an error once; a /where/ consequence recompiles its condition
    fn error(&mut self, line: usize, message: impl AsRef<str>) {
        let error = format!("line {}: {}", line, message.as_ref());
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    /// Compile the atoms of `parts` into one query. The atoms of the first
    /// `pinned_parts` parts are bound from outside, after the parent.
    fn query(
        &mut self,
        parts: &[&Template],
        parent: Option<&QueryObject>,
        pinned_parts: usize,
    ) -> Query {
        let mut query = Query::default();
        if let Some(parent) = parent {
            query.objects.push(QueryObject {
                name: PARENT.to_string(),
                ..parent.clone()
            });
        }
        let mut names: HashMap<String, usize> = HashMap::new();
        let mut bases = Vec::with_capacity(parts.len());
        for (p, part) in parts.iter().enumerate() {
            let base = query.objects.len();
            bases.push(base);
            for (i, atom) in part.atoms.iter().enumerate() {
                let index = base + i;
                let name = match &atom.name {
                    Some(name) => {
                        if names.insert(name.clone(), index).is_some() {
                            self.error(atom.line, format!("name \"{}\" is used twice", name));
                        }
                        name.clone()
                    }
                    None => format!("{}{}", atom.kind, index),
                };
                let yarn = self.yarn(atom);
                query.objects.push(QueryObject {
                    name,
                    kind: atom.kind.clone(),
                    line: atom.line,
                    description: describe(atom),
                    yarn,
                });
            }
            if p < pinned_parts {
                query.pinned = query.objects.len();
            }
        }
        if parent.is_some() && query.pinned == 0 {
            query.pinned = 1;
        }

        for (part, &base) in parts.iter().zip(&bases) {
            for spec in &part.relations {
                let resolve = |atom: &AtomRef| match atom {
                    AtomRef::Local(i) => Ok(base + i),
                    AtomRef::Name(name) => names
                        .get(name)
                        .copied()
                        .ok_or_else(|| format!("unknown atom name \"{}\"", name)),
                    AtomRef::Parent if parent.is_some() => Ok(0),
                    AtomRef::Parent => Err(format!("{} outside a quantifier", PARENT)),
                };
                let (from, to) = match (resolve(&spec.left), resolve(&spec.right)) {
                    (Ok(from), Ok(to)) => (from, to),
                    (left, right) => {
                        for message in [left.err(), right.err()].into_iter().flatten() {
                            self.error(spec.line, message);
                        }
                        continue;
                    }
                };
                if let Err(message) = self.check_op(&spec.op) {
                    self.error(spec.line, message);
                    continue;
                }
                let Some(relation) = relations::build(&spec.op) else {
                    self.error(spec.line, format!("unknown relation {:?}", spec.op));
                    continue;
                };
                if from == to {
                    let api = self.api;
                    let object = &mut query.objects[from];
                    object.yarn = object
                        .yarn
                        .iter()
                        .filter(|&n| relation.holds(api, n, n))
                        .collect();
                    continue;
                }
                query.edges.push(QueryEdge {
                    from,
                    to,
                    converse: relation.converse(),
                    relation,
                    line: spec.line,
                });
            }
        }

        for (part, &base) in parts.iter().zip(&bases) {
            for spec in &part.quantifiers {
                let object = base + spec.parent;
                let parent = query.objects[object].clone();
                let quantifier = match spec.kind {
                    QuantifierKind::Without => {
                        Quantifier::Without(Box::new(self.query(&[&spec.blocks[0]], Some(&parent), 0)))
                    }
                    QuantifierKind::Where => {
                        let (Some(condition), Some(consequence)) =
                            (spec.blocks.first(), spec.blocks.get(1))
                        else {
                            self.error(spec.line, "/where/ needs a /have/ block");
                            continue;
                        };
                        Quantifier::Where {
                            condition: Box::new(self.query(&[condition], Some(&parent), 0)),
                            consequence: Box::new(self.query(
                                &[condition, consequence],
                                Some(&parent),
                                1,
                            )),
                        }
                    }
                    QuantifierKind::With => Quantifier::With(
                        spec.blocks
                            .iter()
                            .map(|block| self.query(&[block], Some(&parent), 0))
                            .collect(),
                    ),
                };
                query.quantifiers.push(QuantifierGate {
                    object,
                    line: spec.line,
                    quantifier,
                });
            }
        }
        query
    }

    fn check_op(&self, op: &OpSpec) -> std::result::Result<(), String> {
        match op {
            OpSpec::Feature { left, right, .. } => {
                for name in [left, right] {
                    if self.api.node_feature(name).is_none() {
                        return Err(format!("node feature \"{}\" is not loaded", name));
                    }
                }
                Ok(())
            }
            OpSpec::Edge { feature, .. } if self.api.edge_feature(feature).is_none() => {
                Err(format!("edge feature \"{}\" is not loaded", feature))
            }
            _ => Ok(()),
        }
    }

    fn nodes_of_kind(&mut self, atom: &AtomSpec) -> Option<RoaringBitmap> {
        if let Some(set) = self.sets.get(&atom.kind) {
            return Some(set.clone());
        }
        let otype = self.api.otype();
        match otype.s_interval(&atom.kind) {
            Some((min, max)) => Some(
                (min..=max)
                    .filter(|&n| otype.v(n) == Some(atom.kind.as_str()))
                    .collect(),
            ),
            None => {
                self.error(
                    atom.line,
                    format!("unknown node type or set \"{}\"", atom.kind),
                );
                None
            }
        }
    }

    fn values(&mut self, line: usize, feature: &NodeFeature, texts: &[String]) -> Vec<Value> {
        let value_type = feature.meta().value_type;
        let mut values = Vec::with_capacity(texts.len());
        for text in texts {
            match Value::parse(text, value_type) {
                Some(value) => values.push(value),
                None => self.error(
                    line,
                    format!(
                        "feature \"{}\" has {} values, not \"{}\"",
                        feature.name(),
                        value_type.as_str(),
                        text
                    ),
                ),
            }
        }
        values
    }

    fn yarn(&mut self, atom: &AtomSpec) -> RoaringBitmap {
        let Some(mut yarn) = self.nodes_of_kind(atom) else {
            return RoaringBitmap::new();
        };
        let api = self.api;
        for spec in &atom.features {
            let Some(feature) = api.node_feature(&spec.feature) else {
                self.error(
                    atom.line,
                    format!("node feature \"{}\" is not loaded", spec.feature),
                );
                continue;
            };
            let keep = |yarn: &RoaringBitmap, test: &dyn Fn(Option<&Value>) -> bool| {
                yarn.iter()
                    .filter(|&n| test(feature.v(n)))
                    .collect::<RoaringBitmap>()
            };
            yarn = match &spec.cond {
                FeatureCond::Equals(texts) => {
                    let mut hits = RoaringBitmap::new();
                    for value in self.values(atom.line, feature, texts) {
                        hits.extend(feature.column().nodes_with(&value));
                    }
                    yarn & hits
                }
                FeatureCond::Differs(texts) => {
                    let values = self.values(atom.line, feature, texts);
                    keep(&yarn, &|v| v.map_or(true, |v| !values.contains(v)))
                }
                FeatureCond::Present => keep(&yarn, &|v| v.is_some()),
                FeatureCond::Absent => keep(&yarn, &|v| v.is_none()),
                FeatureCond::Less(bound) => {
                    keep(&yarn, &|v| v.and_then(Value::as_int).is_some_and(|i| i < *bound))
                }
                FeatureCond::Greater(bound) => {
                    keep(&yarn, &|v| v.and_then(Value::as_int).is_some_and(|i| i > *bound))
                }
                FeatureCond::Matches(pattern) => match Regex::new(pattern) {
                    Ok(regex) => keep(&yarn, &|v| v.is_some_and(|v| regex.is_match(&v.to_string()))),
                    Err(err) => {
                        self.error(atom.line, format!("bad regular expression: {}", err));
                        yarn
                    }
                },
            };
        }
        yarn
    }
}
