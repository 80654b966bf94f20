//! Text rendering, sections and structure
//!
//! Text formats come from the `fmt:<name>` entries of the text configuration.
//! A template is literal text with placeholders `{feature}`; a placeholder
//! may name alternatives and a default, `{f1/f2:default}`, and the first
//! feature with a value for the node wins. A template prefixed by `type#`
//! renders nodes of that type; otherwise it renders slots.
//!
//! Formats named `<type>-default` are used for nodes of that type when no
//! format is given.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use super::Api;
use crate::error::{Result, TapestryError};
use crate::feature::{Node, Value};
use crate::prepare::{Heading, Sections, Structure};

pub const DEFAULT_FORMAT: &str = "text-orig-full";
const DEFAULT_SUFFIX: &str = "-default";
const TYPE_SEP: char = '#';
const PLACEHOLDER: &str = r"\{([A-Za-z0-9_./-]+)(?::([^}]*))?\}";

#[derive(Clone, Debug, PartialEq)]
enum Piece {
    Literal(String),
    Lookup { features: Vec<String>, default: String },
}

/// A parsed text format
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFormat {
    name: String,
    descend_type: String,
    pieces: Vec<Piece>,
}

impl CompiledFormat {
    /// Parse a raw template; `types` are the node types of the corpus
    pub fn parse(name: &str, raw: &str, types: &[String], slot_type: &str) -> Result<Self> {
        let (descend_type, template) = match raw.split_once(TYPE_SEP) {
            Some((prefix, rest)) if types.iter().any(|t| t == prefix) => (prefix, rest),
            _ => (slot_type, raw),
        };
        let template = template.replace("\\n", "\n").replace("\\t", "\t");
        let placeholder = Regex::new(PLACEHOLDER)
            .map_err(|e| TapestryError::InvalidSetting(e.to_string()))?;

        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in placeholder.captures_iter(&template) {
            let (Some(whole), Some(feats)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                pieces.push(Piece::Literal(template[last..whole.start()].to_string()));
            }
            pieces.push(Piece::Lookup {
                features: feats.as_str().split('/').map(str::to_string).collect(),
                default: caps.get(2).map_or(String::new(), |d| d.as_str().to_string()),
            });
            last = whole.end();
        }
        if last < template.len() {
            pieces.push(Piece::Literal(template[last..].to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            descend_type: descend_type.to_string(),
            pieces,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node type this format renders
    pub fn descend_type(&self) -> &str {
        &self.descend_type
    }

    /// Features referenced by the placeholders
    pub fn features(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pieces
            .iter()
            .flat_map(|p| match p {
                Piece::Lookup { features, .. } => features.clone(),
                Piece::Literal(_) => Vec::new(),
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// For `<type>-default` formats, the type
    pub fn default_for<'t>(&self, types: &'t [String]) -> Option<&'t str> {
        let prefix = self.name.strip_suffix(DEFAULT_SUFFIX)?;
        types.iter().map(String::as_str).find(|t| *t == prefix)
    }

    fn render(&self, api: &Api, node: Node, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Lookup { features, default } => {
                    let value = features.iter().find_map(|f| {
                        api.node_feature(f).and_then(|feature| feature.v(node))
                    });
                    match value {
                        Some(value) => out.push_str(&value.to_string()),
                        None => out.push_str(default),
                    }
                }
            }
        }
    }
}

/// A structure node with its structural children
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureTree {
    pub node: Node,
    pub children: Vec<StructureTree>,
}

/// Overview of the configured structure
#[derive(Clone, Debug, PartialEq)]
pub struct StructureInfo {
    /// (node type, heading feature) pairs
    pub headings: Vec<(String, String)>,
    pub elements: usize,
    /// Headings shared by several nodes
    pub multiple: Vec<(Heading, Vec<Node>)>,
}

impl fmt::Display for StructureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} structural elements configured", self.headings.len())?;
        for (node_type, feature) in &self.headings {
            writeln!(f, "\tnode type {:<10} with heading feature {}", node_type, feature)?;
        }
        writeln!(f, "{} structural elements in the dataset", self.elements)?;
        if !self.multiple.is_empty() {
            let total: usize = self.multiple.iter().map(|(_, n)| n.len()).sum();
            writeln!(
                f,
                "WARNING: {} structure headings occur more than once (total {})",
                self.multiple.len(),
                total
            )?;
            for (heading, nodes) in self.multiple.iter().take(10) {
                writeln!(
                    f,
                    "\t{} has {} occurrences",
                    Structure::heading_rep(heading),
                    nodes.len()
                )?;
            }
        }
        Ok(())
    }
}

/// Text API
#[derive(Clone, Copy)]
pub struct Text<'a> {
    pub(crate) api: &'a Api,
}

impl<'a> Text<'a> {
    /// Format name -> type it renders
    pub fn formats(&self) -> BTreeMap<&'a str, &'a str> {
        self.api
            .formats
            .iter()
            .map(|(name, fmt)| (name.as_str(), fmt.descend_type()))
            .collect()
    }

    /// Render nodes as text.
    ///
    /// With `descend` unset, an explicit format expands a node into nodes of
    /// the format's type, and an implicit type default format renders the
    /// node itself. `Some(true)` always expands, `Some(false)` never does.
    /// Nodes without any applicable format render as type plus number.
    pub fn text(&self, nodes: &[Node], fmt: Option<&str>, descend: Option<bool>) -> Result<String> {
        let formats = &self.api.formats;
        if let Some(name) = fmt {
            if !formats.contains_key(name) {
                return Err(TapestryError::UnknownFormat(name.to_string()));
            }
        }
        let otype = self.api.otype.as_ref();
        let mut out = String::new();
        for &node in nodes {
            let node_type = otype.v(node).unwrap_or_default();
            let (format, implied_type) = match fmt {
                Some(name) => {
                    let format = formats.get(name);
                    (format, format.map(|f| f.descend_type().to_string()))
                }
                None => match self.api.default_formats.get(node_type) {
                    Some(name) => (formats.get(name), Some(node_type.to_string())),
                    None => {
                        let format = formats.get(DEFAULT_FORMAT);
                        (format, format.map(|f| f.descend_type().to_string()))
                    }
                },
            };
            let down_type = match descend {
                Some(true) => match fmt {
                    Some(_) => implied_type,
                    None => formats
                        .get(DEFAULT_FORMAT)
                        .map(|f| f.descend_type().to_string()),
                },
                Some(false) => None,
                None => implied_type,
            }
            .filter(|t| t != node_type);

            let expanded: Vec<Node> = match down_type.as_deref() {
                Some(t) if t == otype.slot_type() => self.api.oslots.s(node).to_vec(),
                Some(t) => self.api.locality()?.d(node, Some(t)),
                None => vec![node],
            };
            for n in expanded {
                match format {
                    Some(format) => format.render(self.api, n, &mut out),
                    None => {
                        out.push_str(otype.v(n).unwrap_or_default());
                        out.push_str(&n.to_string());
                    }
                }
            }
        }
        Ok(out)
    }

    fn sections(&self) -> Result<&'a Sections> {
        self.api
            .computed
            .sections
            .as_deref()
            .ok_or_else(|| TapestryError::IndexUnavailable("sections".to_string()))
    }

    /// The section nodes containing a node, outermost first, up to the
    /// level of the node itself
    pub fn section_tuple(&self, node: Node, last_slot: bool) -> Result<Vec<Node>> {
        let sections = self.sections()?;
        let locality = self.api.locality()?;
        let otype = self.api.otype.as_ref();
        let node_type = otype.v(node).unwrap_or_default();
        let reference = match otype.is_slot(node) {
            true => node,
            false => {
                let slots = self.api.oslots.s(node);
                let slot = if last_slot { slots.last() } else { slots.first() };
                match slot {
                    Some(&slot) => slot,
                    None => return Ok(Vec::new()),
                }
            }
        };
        let mut tuple = Vec::new();
        for section_type in sections.types() {
            if section_type == node_type {
                tuple.push(node);
                break;
            }
            match locality.u(reference, Some(section_type)).first() {
                Some(&up) => tuple.push(up),
                None => break,
            }
        }
        Ok(tuple)
    }

    /// Section headings of a node, e.g. `("Genesis", 1, 2)`
    pub fn section_from_node(&self, node: Node, last_slot: bool) -> Result<Vec<Value>> {
        let sections = self.sections()?;
        let tuple = self.section_tuple(node, last_slot)?;
        let mut headings = Vec::with_capacity(tuple.len());
        for (n, feature) in tuple.into_iter().zip(sections.features()) {
            let feature = self
                .api
                .node_feature(feature)
                .ok_or_else(|| TapestryError::FeatureNotLoaded(feature.clone()))?;
            match feature.v(n) {
                Some(value) => headings.push(value.clone()),
                None => break,
            }
        }
        Ok(headings)
    }

    /// Node of a section given by one, two or three headings
    pub fn node_from_section(&self, headings: &[Value]) -> Result<Option<Node>> {
        Ok(self.sections()?.node_from_headings(headings))
    }

    fn structure_index(&self) -> Result<&'a Structure> {
        self.api
            .computed
            .structure
            .as_deref()
            .ok_or_else(|| TapestryError::IndexUnavailable("structure".to_string()))
    }

    fn structural(&self, node: Node) -> Result<&'a Structure> {
        let structure = self.structure_index()?;
        let node_type = self.api.otype.v(node).unwrap_or_default();
        if !structure.is_structural_type(node_type) {
            return Err(TapestryError::NotStructural(node, node_type.to_string()));
        }
        Ok(structure)
    }

    /// Top level structure nodes
    pub fn top(&self) -> Result<&'a [Node]> {
        Ok(&self.structure_index()?.hd_top)
    }

    /// Structural parent
    pub fn up(&self, node: Node) -> Result<Option<Node>> {
        Ok(self.structural(node)?.hd_up.get(&node).copied())
    }

    /// Structural children
    pub fn down(&self, node: Node) -> Result<&'a [Node]> {
        Ok(self
            .structural(node)?
            .hd_down
            .get(&node)
            .map_or(&[][..], Vec::as_slice))
    }

    pub fn heading_from_node(&self, node: Node) -> Result<Option<&'a Heading>> {
        Ok(self.structural(node)?.hd_from_nd.get(&node))
    }

    pub fn node_from_heading(&self, heading: &Heading) -> Result<Option<Node>> {
        Ok(self.structure_index()?.nd_from_hd.get(heading).copied())
    }

    /// The structure below a node, or the whole structure
    pub fn structure(&self, node: Option<Node>) -> Result<Vec<StructureTree>> {
        match node {
            Some(node) => Ok(vec![self.subtree(node)?]),
            None => self.top()?.iter().map(|&n| self.subtree(n)).collect(),
        }
    }

    fn subtree(&self, node: Node) -> Result<StructureTree> {
        let children = self
            .down(node)?
            .iter()
            .map(|&child| self.subtree(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(StructureTree { node, children })
    }

    /// Indented outline of the structure, one heading per line
    pub fn structure_pretty(&self, node: Option<Node>, full_heading: bool) -> Result<String> {
        let trees = self.structure(node)?;
        let mut lines = Vec::new();
        for tree in &trees {
            self.outline(tree, 1, full_heading, &mut lines)?;
        }
        Ok(lines.join("\n"))
    }

    fn outline(
        &self,
        tree: &StructureTree,
        depth: usize,
        full_heading: bool,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        let heading = self.heading_from_node(tree.node)?.cloned().unwrap_or_default();
        let shown: Heading = match (full_heading, heading.last()) {
            (false, Some(part)) => vec![part.clone()],
            _ => heading,
        };
        lines.push(format!(
            "{}{}",
            "  ".repeat(depth),
            Structure::heading_rep(&shown)
        ));
        for child in &tree.children {
            self.outline(child, depth + 1, full_heading, lines)?;
        }
        Ok(())
    }

    pub fn structure_info(&self) -> Result<StructureInfo> {
        let structure = self.structure_index()?;
        Ok(StructureInfo {
            headings: structure
                .types
                .iter()
                .cloned()
                .zip(structure.features.iter().cloned())
                .collect(),
            elements: structure.hd_from_nd.len(),
            multiple: structure
                .hd_mult
                .iter()
                .map(|(h, n)| (h.clone(), n.clone()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CorpusBuilder;

    fn types() -> Vec<String> {
        vec!["word".to_string(), "phrase".to_string()]
    }

    #[test]
    fn test_parse_format() {
        let fmt = CompiledFormat::parse("x", "{letters/lex:?}{trailer}\\n", &types(), "word")
            .unwrap();
        assert_eq!(fmt.descend_type(), "word");
        assert_eq!(fmt.features(), vec!["letters", "lex", "trailer"]);
        assert_eq!(fmt.pieces.len(), 3);
        assert_eq!(fmt.pieces[2], Piece::Literal("\n".to_string()));

        let fmt = CompiledFormat::parse("y", "phrase#<{function}>", &types(), "word").unwrap();
        assert_eq!(fmt.descend_type(), "phrase");
        let fmt = CompiledFormat::parse("z", "clause#{function}", &types(), "word").unwrap();
        assert_eq!(fmt.descend_type(), "word");

        let fmt = CompiledFormat::parse("phrase-default", "{function}", &types(), "word").unwrap();
        assert_eq!(fmt.default_for(&types()), Some("phrase"));
    }

    #[test]
    fn test_text_expands_to_slots() {
        let api = CorpusBuilder::bible().api().unwrap();
        let t = api.text();
        assert_eq!(t.text(&[1, 2, 3], None, None).unwrap(), "In the beginning ");
        assert_eq!(t.text(&[10], None, None).unwrap(), "In the beginning God ");
        assert_eq!(
            t.text(&[11], Some("lex-orig-plain"), None).unwrap(),
            "create the heaven earth "
        );
        // a slot format applied to the chapter itself finds no values
        assert_eq!(t.text(&[10], None, Some(false)).unwrap(), "");
    }

    #[test]
    fn test_text_descends_to_format_type() {
        let api = CorpusBuilder::bible().api().unwrap();
        let t = api.text();
        assert_eq!(
            t.text(&[9], Some("text-phrase-function"), None).unwrap(),
            "Time Subj Pred Objc "
        );
        assert!(matches!(
            t.text(&[9], Some("nope"), None),
            Err(TapestryError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_sections() {
        let api = CorpusBuilder::bible().api().unwrap();
        let t = api.text();
        assert_eq!(t.section_tuple(7, false).unwrap(), vec![9, 11, 15]);
        assert_eq!(t.section_tuple(11, false).unwrap(), vec![9, 11]);
        assert_eq!(
            t.section_from_node(19, true).unwrap(),
            vec![Value::from("Genesis"), Value::Int(2), Value::Int(2)]
        );
        assert_eq!(t.section_from_node(19, false).unwrap()[2], Value::Int(1));
        let verse = t
            .node_from_section(&[Value::from("Genesis"), Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(verse, Some(13));
    }

    #[test]
    fn test_structure() {
        let api = CorpusBuilder::bible().api().unwrap();
        let t = api.text();
        assert_eq!(t.top().unwrap(), &[9]);
        assert_eq!(t.down(9).unwrap(), &[10, 11]);
        assert_eq!(t.up(10).unwrap(), Some(9));
        assert!(matches!(t.up(12), Err(TapestryError::NotStructural(12, _))));
        let heading = t.heading_from_node(11).unwrap().unwrap().clone();
        assert_eq!(t.node_from_heading(&heading).unwrap(), Some(11));

        let tree = t.structure(None).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(
            t.structure_pretty(None, false).unwrap(),
            "  book:Genesis\n    chapter:1\n    chapter:2"
        );
        let info = t.structure_info().unwrap();
        assert_eq!(info.elements, 3);
        assert!(info.multiple.is_empty());
        assert!(info.to_string().contains("heading feature chapter"));
    }

    #[test]
    fn test_text_without_sections() {
        let api = CorpusBuilder::sentences().api().unwrap();
        let t = api.text();
        assert!(matches!(
            t.section_tuple(3, false),
            Err(TapestryError::IndexUnavailable(_))
        ));
        assert_eq!(t.text(&[11], None, None).unwrap(), "sentence11");
        assert!(t.top().is_err());
    }
}
