//! Relations defined by the slots two nodes occupy

use super::{span, Relation};
use crate::api::Api;
use crate::feature::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotOp {
    SameSlots,
    Overlap,
    DifferentSlots,
    Disjoint,
    Embeds,
    EmbeddedIn,
    Before,
    After,
    SameStart,
    SameEnd,
    SameBoundary,
    AdjacentBefore,
    AdjacentAfter,
}

impl SlotOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "==" => SlotOp::SameSlots,
            "&&" => SlotOp::Overlap,
            "##" => SlotOp::DifferentSlots,
            "||" => SlotOp::Disjoint,
            "[[" => SlotOp::Embeds,
            "]]" => SlotOp::EmbeddedIn,
            "<<" => SlotOp::Before,
            ">>" => SlotOp::After,
            "=:" => SlotOp::SameStart,
            ":=" => SlotOp::SameEnd,
            "::" => SlotOp::SameBoundary,
            "<:" => SlotOp::AdjacentBefore,
            ":>" => SlotOp::AdjacentAfter,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            SlotOp::SameSlots => "==",
            SlotOp::Overlap => "&&",
            SlotOp::DifferentSlots => "##",
            SlotOp::Disjoint => "||",
            SlotOp::Embeds => "[[",
            SlotOp::EmbeddedIn => "]]",
            SlotOp::Before => "<<",
            SlotOp::After => ">>",
            SlotOp::SameStart => "=:",
            SlotOp::SameEnd => ":=",
            SlotOp::SameBoundary => "::",
            SlotOp::AdjacentBefore => "<:",
            SlotOp::AdjacentAfter => ":>",
        }
    }

    pub fn converse(&self) -> Self {
        match self {
            SlotOp::Embeds => SlotOp::EmbeddedIn,
            SlotOp::EmbeddedIn => SlotOp::Embeds,
            SlotOp::Before => SlotOp::After,
            SlotOp::After => SlotOp::Before,
            SlotOp::AdjacentBefore => SlotOp::AdjacentAfter,
            SlotOp::AdjacentAfter => SlotOp::AdjacentBefore,
            symmetric => *symmetric,
        }
    }

    fn generates(&self) -> bool {
        !matches!(
            self,
            SlotOp::DifferentSlots | SlotOp::Disjoint | SlotOp::Before | SlotOp::After
        )
    }
}

/// Whether two ascending slot lists share a slot
fn shares(a: &[Node], b: &[Node]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Whether ascending `inner` is contained in ascending `outer`
fn contained(inner: &[Node], outer: &[Node]) -> bool {
    let mut j = 0;
    for slot in inner {
        while j < outer.len() && outer[j] < *slot {
            j += 1;
        }
        if j == outer.len() || outer[j] != *slot {
            return false;
        }
    }
    true
}

/// Slots embed nothing; any other node embeds every other node whose
/// slots it covers
fn embeds(api: &Api, outer: Node, inner: Node) -> bool {
    let oslots = api.oslots();
    outer != inner
        && outer > api.otype().max_slot()
        && contained(oslots.s(inner), oslots.s(outer))
}

#[derive(Clone, Debug)]
pub struct SlotRelation {
    op: SlotOp,
}

impl SlotRelation {
    pub fn new(op: SlotOp) -> Self {
        Self { op }
    }

    pub fn op(&self) -> SlotOp {
        self.op
    }
}

impl Relation for SlotRelation {
    fn symbol(&self) -> String {
        self.op.symbol().to_string()
    }

    fn generates(&self, api: &Api) -> bool {
        self.op.generates() && api.locality().is_ok()
    }

    fn related(&self, api: &Api, left: Node) -> Option<Vec<Node>> {
        if !self.op.generates() {
            return None;
        }
        let locality = api.locality().ok()?;
        let (first, last) = span(api, left)?;
        let oslots = api.oslots();
        let nodes = match self.op {
            SlotOp::SameSlots => {
                let slots = oslots.s(left);
                locality
                    .starting_at(first)
                    .into_iter()
                    .filter(|&m| oslots.s(m) == slots)
                    .collect()
            }
            SlotOp::Overlap => {
                let mut nodes = locality.i(left, None);
                nodes.push(left);
                api.nodes().sort_nodes(nodes)
            }
            SlotOp::Embeds => locality.d(left, None),
            SlotOp::EmbeddedIn => api.nodes().sort_nodes(locality.u(left, None)),
            SlotOp::SameStart => locality.starting_at(first),
            SlotOp::SameEnd => locality.ending_at(last),
            SlotOp::SameBoundary => locality
                .starting_at(first)
                .into_iter()
                .filter(|&m| span(api, m).is_some_and(|(_, l)| l == last))
                .collect(),
            SlotOp::AdjacentBefore => locality.starting_at(last + 1),
            SlotOp::AdjacentAfter => locality.ending_at(first - 1),
            SlotOp::DifferentSlots | SlotOp::Disjoint | SlotOp::Before | SlotOp::After => {
                return None
            }
        };
        Some(nodes)
    }

    fn holds(&self, api: &Api, left: Node, right: Node) -> bool {
        let oslots = api.oslots();
        let (ls, rs) = (oslots.s(left), oslots.s(right));
        let (Some((lf, ll)), Some((rf, rl))) = (span(api, left), span(api, right)) else {
            return false;
        };
        match self.op {
            SlotOp::SameSlots => ls == rs,
            SlotOp::Overlap => shares(ls, rs),
            SlotOp::DifferentSlots => ls != rs,
            SlotOp::Disjoint => !shares(ls, rs),
            SlotOp::Embeds => embeds(api, left, right),
            SlotOp::EmbeddedIn => embeds(api, right, left),
            SlotOp::Before => ll < rf,
            SlotOp::After => lf > rl,
            SlotOp::SameStart => lf == rf,
            SlotOp::SameEnd => ll == rl,
            SlotOp::SameBoundary => lf == rf && ll == rl,
            SlotOp::AdjacentBefore => ll + 1 == rf,
            SlotOp::AdjacentAfter => rl + 1 == lf,
        }
    }

    fn converse(&self) -> Box<dyn Relation> {
        Box::new(SlotRelation::new(self.op.converse()))
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_list_helpers() {
        assert!(shares(&[1, 4, 9], &[2, 4]));
        assert!(!shares(&[1, 3], &[2, 4]));
        assert!(contained(&[3, 5], &[1, 3, 4, 5]));
        assert!(!contained(&[3, 6], &[1, 3, 4, 5]));
        assert!(contained(&[], &[1]));
    }

    #[test]
    fn test_symbols_round_trip() {
        for symbol in ["==", "&&", "##", "||", "[[", "]]", "<<", ">>", "=:", ":=", "::", "<:", ":>"] {
            let op = SlotOp::from_symbol(symbol).unwrap();
            assert_eq!(op.symbol(), symbol);
            assert_eq!(op.converse().converse(), op);
        }
        assert!(SlotOp::from_symbol("[]").is_none());
    }
}
