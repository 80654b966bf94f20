//! Node identity and canonical order

use super::Relation;
use crate::api::Api;
use crate::feature::Node;

/// `=` and `#`
#[derive(Clone, Debug)]
pub struct NodeIdentity {
    pub equal: bool,
}

impl Relation for NodeIdentity {
    fn symbol(&self) -> String {
        let symbol = if self.equal { "=" } else { "#" };
        symbol.to_string()
    }

    fn generates(&self, _api: &Api) -> bool {
        self.equal
    }

    fn related(&self, _api: &Api, left: Node) -> Option<Vec<Node>> {
        self.equal.then(|| vec![left])
    }

    fn holds(&self, _api: &Api, left: Node, right: Node) -> bool {
        (left == right) == self.equal
    }

    fn converse(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}

/// `<` and `>`
#[derive(Clone, Debug)]
pub struct CanonicalOrder {
    pub before: bool,
}

impl Relation for CanonicalOrder {
    fn symbol(&self) -> String {
        let symbol = if self.before { "<" } else { ">" };
        symbol.to_string()
    }

    fn generates(&self, _api: &Api) -> bool {
        false
    }

    fn related(&self, _api: &Api, _left: Node) -> Option<Vec<Node>> {
        None
    }

    fn holds(&self, api: &Api, left: Node, right: Node) -> bool {
        let nodes = api.nodes();
        if self.before {
            nodes.precedes(left, right)
        } else {
            nodes.precedes(right, left)
        }
    }

    fn converse(&self) -> Box<dyn Relation> {
        Box::new(CanonicalOrder {
            before: !self.before,
        })
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}
