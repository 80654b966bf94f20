//! Relations along an edge feature

use super::Relation;
use crate::api::Api;
use crate::feature::{Node, Value};
use crate::search::syntax::EdgeDirection;

#[derive(Clone, Debug)]
pub struct EdgeRelation {
    feature: String,
    direction: EdgeDirection,
    /// (negated, values) the edge value must (not) be one of
    values: Option<(bool, Vec<String>)>,
}

impl EdgeRelation {
    pub fn new(feature: String, direction: EdgeDirection, values: Option<(bool, Vec<String>)>) -> Self {
        Self {
            feature,
            direction,
            values,
        }
    }

    fn accepts(&self, value: Option<&Value>) -> bool {
        match &self.values {
            None => true,
            Some((negated, wanted)) => {
                let hit = value.is_some_and(|v| {
                    let text = v.to_string();
                    wanted.iter().any(|w| *w == text)
                });
                hit != *negated
            }
        }
    }

    fn edges(&self, api: &Api, node: Node) -> Option<Vec<(Node, Option<Value>)>> {
        let feature = api.edge_feature(&self.feature)?;
        Some(match self.direction {
            EdgeDirection::Forward => feature.f(node),
            EdgeDirection::Backward => feature.t(node),
            EdgeDirection::Both => feature.b(node),
        })
    }
}

impl Relation for EdgeRelation {
    fn symbol(&self) -> String {
        let condition = match &self.values {
            None => String::new(),
            Some((negated, values)) => {
                format!("{}{}", if *negated { "#" } else { "=" }, values.join("|"))
            }
        };
        match self.direction {
            EdgeDirection::Forward => format!("-{}{}>", self.feature, condition),
            EdgeDirection::Backward => format!("<{}{}-", self.feature, condition),
            EdgeDirection::Both => format!("<{}{}>", self.feature, condition),
        }
    }

    fn generates(&self, api: &Api) -> bool {
        api.edge_feature(&self.feature).is_some()
    }

    fn related(&self, api: &Api, left: Node) -> Option<Vec<Node>> {
        let nodes = self
            .edges(api, left)?
            .into_iter()
            .filter(|(_, v)| self.accepts(v.as_ref()))
            .map(|(n, _)| n)
            .collect();
        Some(nodes)
    }

    fn holds(&self, api: &Api, left: Node, right: Node) -> bool {
        self.edges(api, left).is_some_and(|edges| {
            edges
                .iter()
                .any(|(n, v)| *n == right && self.accepts(v.as_ref()))
        })
    }

    fn converse(&self) -> Box<dyn Relation> {
        let direction = match self.direction {
            EdgeDirection::Forward => EdgeDirection::Backward,
            EdgeDirection::Backward => EdgeDirection::Forward,
            EdgeDirection::Both => EdgeDirection::Both,
        };
        Box::new(EdgeRelation::new(self.feature.clone(), direction, self.values.clone()))
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}
