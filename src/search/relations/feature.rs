//! Comparisons between feature values of two nodes

use std::cmp::Ordering;

use super::Relation;
use crate::api::Api;
use crate::feature::{Node, Value};
use crate::search::syntax::Comparison;

#[derive(Clone, Debug)]
pub struct FeatureComparison {
    left: String,
    cmp: Comparison,
    right: String,
}

/// Integers compare numerically, anything else by its text
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) if matches!(a, Value::Int(_)) || matches!(b, Value::Int(_)) => x.cmp(&y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl FeatureComparison {
    pub fn new(left: String, cmp: Comparison, right: String) -> Self {
        Self { left, cmp, right }
    }

    fn values<'a>(&self, api: &'a Api, left: Node, right: Node) -> Option<(&'a Value, &'a Value)> {
        let a = api.node_feature(&self.left)?.v(left)?;
        let b = api.node_feature(&self.right)?.v(right)?;
        Some((a, b))
    }
}

impl Relation for FeatureComparison {
    fn symbol(&self) -> String {
        let op = match self.cmp {
            Comparison::Equal if self.left == self.right => return format!(".{}.", self.left),
            Comparison::Equal => "=",
            Comparison::Unequal => "#",
            Comparison::Less => "<",
            Comparison::Greater => ">",
        };
        format!(".{}{}{}.", self.left, op, self.right)
    }

    fn generates(&self, api: &Api) -> bool {
        self.cmp == Comparison::Equal
            && api.node_feature(&self.left).is_some()
            && api.node_feature(&self.right).is_some()
    }

    fn related(&self, api: &Api, left: Node) -> Option<Vec<Node>> {
        if self.cmp != Comparison::Equal {
            return None;
        }
        let target = api.node_feature(&self.right)?;
        match api.node_feature(&self.left)?.v(left) {
            Some(value) => Some(target.s(value)),
            None => Some(Vec::new()),
        }
    }

    fn holds(&self, api: &Api, left: Node, right: Node) -> bool {
        let Some((a, b)) = self.values(api, left, right) else {
            return false;
        };
        match self.cmp {
            Comparison::Equal => a == b,
            Comparison::Unequal => a != b,
            Comparison::Less => compare(a, b) == Ordering::Less,
            Comparison::Greater => compare(a, b) == Ordering::Greater,
        }
    }

    fn converse(&self) -> Box<dyn Relation> {
        let cmp = match self.cmp {
            Comparison::Less => Comparison::Greater,
            Comparison::Greater => Comparison::Less,
            symmetric => symmetric,
        };
        Box::new(FeatureComparison::new(self.right.clone(), cmp, self.left.clone()))
    }

    fn clone_box(&self) -> Box<dyn Relation> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    #[test]
    fn test_compare_values() {
        assert_eq!(compare(&Value::Int(9), &Value::Int(10)), Ordering::Less);
        assert_eq!(compare(&Value::from("9"), &Value::from("10")), Ordering::Greater);
        assert_eq!(compare(&Value::Int(9), &Value::from("10")), Ordering::Less);
    }

    #[test]
    fn test_numeric_comparison() {
        let api = CorpusBuilder::bible().api().unwrap();
        let less = FeatureComparison::new("verse".into(), Comparison::Less, "verse".into());
        assert!(less.holds(&api, 12, 13));
        assert!(!less.holds(&api, 13, 14));
        assert!(!less.holds(&api, 12, 5));
        assert_eq!(less.symbol(), ".verse<verse.");
        let chapter_verse = FeatureComparison::new("chapter".into(), Comparison::Equal, "verse".into());
        assert_eq!(chapter_verse.related(&api, 11).unwrap(), vec![13, 15]);
    }
}
