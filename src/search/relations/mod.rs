//! Relations between template atoms
//!
//! Every operator a template can use is a `Relation`. A relation can always
//! test a pair of nodes; most can also enumerate the right-hand nodes
//! related to a given left-hand node, which is what the executor uses to
//! walk from one bound atom to the next. Relations that can only test
//! (canonical order, disjointness, `.f<g.`) are checked after the fact.

mod edge;
mod feature;
mod identity;
mod near;
mod slots;

use std::fmt::Debug;

use crate::api::Api;
use crate::feature::Node;

use super::syntax::OpSpec;

pub use edge::EdgeRelation;
pub use feature::FeatureComparison;
pub use identity::{CanonicalOrder, NodeIdentity};
pub use near::NearRelation;
pub use slots::{SlotOp, SlotRelation};

/// A binary relation between nodes
pub trait Relation: Send + Sync + Debug {
    /// The operator as written in templates
    fn symbol(&self) -> String;

    /// Whether `related` can enumerate right nodes against this api
    fn generates(&self, api: &Api) -> bool;

    /// Right nodes related to `left`, in canonical order, or `None` when
    /// the relation can only test pairs
    fn related(&self, api: &Api, left: Node) -> Option<Vec<Node>>;

    /// Whether `left` and `right` are related
    fn holds(&self, api: &Api, left: Node, right: Node) -> bool;

    /// The same relation seen from the right
    fn converse(&self) -> Box<dyn Relation>;

    fn clone_box(&self) -> Box<dyn Relation>;
}

impl Clone for Box<dyn Relation> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Build the relation for a parsed operator
pub fn build(op: &OpSpec) -> Option<Box<dyn Relation>> {
    let relation: Box<dyn Relation> = match op {
        OpSpec::Basic(symbol) => match symbol.as_str() {
            "=" => Box::new(NodeIdentity { equal: true }),
            "#" => Box::new(NodeIdentity { equal: false }),
            "<" => Box::new(CanonicalOrder { before: true }),
            ">" => Box::new(CanonicalOrder { before: false }),
            other => Box::new(SlotRelation::new(SlotOp::from_symbol(other)?)),
        },
        OpSpec::Near { kind, k } => Box::new(NearRelation::new(*kind, *k)),
        OpSpec::Feature { left, cmp, right } => {
            Box::new(FeatureComparison::new(left.clone(), *cmp, right.clone()))
        }
        OpSpec::Edge {
            feature,
            direction,
            values,
        } => Box::new(EdgeRelation::new(feature.clone(), *direction, values.clone())),
    };
    Some(relation)
}

/// First and last slot of a node
pub(crate) fn span(api: &Api, node: Node) -> Option<(Node, Node)> {
    let slots = api.oslots().s(node);
    Some((*slots.first()?, *slots.last()?))
}

/// Overview of the relation operators
pub const LEGEND: &str = "\
=      left equal to right (as node)
#      left unequal to right (as node)
<      left before right (in canonical node ordering)
>      left after right (in canonical node ordering)
==     left occupies same slots as right
&&     left has overlapping slots with right
##     left and right do not have the same slot set
||     left and right do not have common slots
[[     left embeds right
]]     left embedded in right
<<     left completely before right
>>     left completely after right
=:     left and right start at the same slot
:=     left and right end at the same slot
::     left and right start and end at the same slot
<:     left immediately before right
:>     left immediately after right
=k:    left and right start at k-nearly the same slot
:k=    left and right end at k-nearly the same slot
:k:    left and right start and end at k-near slots
<k:    left k-nearly before right
:k>    left k-nearly after right
.f.    left.f = right.f
.f=g.  left.f = right.g
.f#g.  left.f != right.g
.f<g.  left.f < right.g
.f>g.  left.f > right.g
-e>    edge feature e from left to right
<e-    edge feature e from right to left
<e>    edge feature e in either direction
-e=v>  edge with value v (also #v for any other value, v|w for alternatives)
";
