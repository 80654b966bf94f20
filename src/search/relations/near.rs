//! Slot proximity with a tolerance

use super::{span, Relation};
use crate::api::Api;
use crate::feature::Node;
use crate::search::syntax::NearKind;

#[derive(Clone, Debug)]
pub struct NearRelation {
    kind: NearKind,
    k: u32,
}

impl NearRelation {
    pub fn new(kind: NearKind, k: u32) -> Self {
        Self { kind, k }
    }

    fn near(&self, a: Node, b: i64) -> bool {
        (a as i64 - b).abs() <= self.k as i64
    }

    /// Slots within distance k of `center`, clipped to the slot range
    fn window(&self, api: &Api, center: i64) -> impl Iterator<Item = Node> {
        let max_slot = api.otype().max_slot() as i64;
        let low = (center - self.k as i64).max(1);
        let high = (center + self.k as i64).min(max_slot);
        (low..=high).map(|s| s as Node)
    }
}

impl Relation for NearRelation {
    fn symbol(&self) -> String {
        match self.kind {
            NearKind::Start => format!("={}:", self.k),
            NearKind::End => format!(":{}=", self.k),
            NearKind::Both => format!(":{}:", self.k),
            NearKind::Before => format!("<{}:", self.k),
            NearKind::After => format!(":{}>", self.k),
        }
    }

    fn generates(&self, api: &Api) -> bool {
        api.locality().is_ok()
    }

    fn related(&self, api: &Api, left: Node) -> Option<Vec<Node>> {
        let locality = api.locality().ok()?;
        let (first, last) = span(api, left)?;
        let (first, last) = (first as i64, last as i64);
        let mut nodes = Vec::new();
        match self.kind {
            NearKind::Start => {
                for slot in self.window(api, first) {
                    nodes.extend(locality.starting_at(slot));
                }
            }
            NearKind::End => {
                for slot in self.window(api, last) {
                    nodes.extend(locality.ending_at(slot));
                }
            }
            NearKind::Both => {
                for slot in self.window(api, first) {
                    nodes.extend(
                        locality
                            .starting_at(slot)
                            .into_iter()
                            .filter(|&m| span(api, m).is_some_and(|(_, l)| self.near(l, last))),
                    );
                }
            }
            NearKind::Before => {
                for slot in self.window(api, last + 1) {
                    nodes.extend(locality.starting_at(slot));
                }
            }
            NearKind::After => {
                for slot in self.window(api, first - 1) {
                    nodes.extend(locality.ending_at(slot));
                }
            }
        }
        Some(api.nodes().sort_nodes(nodes))
    }

    fn holds(&self, api: &Api, left: Node, right: Node) -> bool {
        let (Some((lf, ll)), Some((rf, rl))) = (span(api, left), span(api, right)) else {
            return false;
        };
        let (lf, ll) = (lf as i64, ll as i64);
        match self.kind {
            NearKind::Start => self.near(rf, lf),
            NearKind::End => self.near(rl, ll),
            NearKind::Both => self.near(rf, lf) && self.near(rl, ll),
            NearKind::Before => self.near(rf, ll + 1),
            NearKind::After => self.near(rl, lf - 1),
        }
    }

    fn converse(&self) -> Box<dyn Relation> {
        let kind = match self.kind {
            NearKind::Before => NearKind::After,
            NearKind::After => NearKind::Before,
            symmetric => symmetric,
        };
        Box::new(NearRelation::new(kind, self.k))
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}
