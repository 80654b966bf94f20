//! Search template syntax
//!
//! A template is a sequence of lines:
//!
//! ```text
//! % comment
//! book book=Genesis
//!   chapter chapter=1
//!     v:verse
//!     <: verse
//!   phrase function=Pred|Subj
//!   /without/
//!     word pos=verb
//!   /-/
//! v [[ phrase
//! ```
//!
//! - an atom line is `[op] [name:]type [feature-spec ...]` or
//!   `[op] type name [feature-spec ...]`; an atom indented
//!   under another atom is embedded in it, and a leading relation operator
//!   relates the previous atom at the same level to this one
//! - a relation line is `name op name`
//! - quantifiers `/without/`, `/where/ .. /have/`, `/with/ .. /or/` close
//!   with `/-/` and apply to the nearest atom above them at the same or a
//!   lower indentation; inside, `..` names that atom, and atoms indented
//!   deeper than the keyword are embedded in it

use std::collections::BTreeSet;

/// Name of the atom a quantifier applies to, inside the quantifier
pub const PARENT: &str = "..";

const BASIC_OPS: [&str; 17] = [
    "=", "#", "<", ">", "==", "&&", "##", "||", "[[", "]]", "<<", ">>", "=:", ":=", "::", "<:",
    ":>",
];

/// Condition on the value of a feature
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureCond {
    /// `f=a|b`
    Equals(Vec<String>),
    /// `f#a|b`
    Differs(Vec<String>),
    /// `f`
    Present,
    /// `f#`
    Absent,
    /// `f<n`
    Less(i64),
    /// `f>n`
    Greater(i64),
    /// `f~regex`
    Matches(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSpec {
    pub feature: String,
    pub cond: FeatureCond,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Unequal,
    Less,
    Greater,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeDirection {
    Forward,
    Backward,
    Both,
}

/// Slot distance relations with a tolerance `k`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NearKind {
    /// `=k:`
    Start,
    /// `:k=`
    End,
    /// `:k:`
    Both,
    /// `<k:`
    Before,
    /// `:k>`
    After,
}

/// A parsed relation operator
#[derive(Clone, Debug, PartialEq)]
pub enum OpSpec {
    Basic(String),
    Near {
        kind: NearKind,
        k: u32,
    },
    Feature {
        left: String,
        cmp: Comparison,
        right: String,
    },
    Edge {
        feature: String,
        direction: EdgeDirection,
        /// (negated, values)
        values: Option<(bool, Vec<String>)>,
    },
}

/// Reference to an atom from a relation
#[derive(Clone, Debug, PartialEq)]
pub enum AtomRef {
    /// Index into the atoms of the same template
    Local(usize),
    Name(String),
    Parent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtomSpec {
    pub line: usize,
    pub indent: usize,
    pub name: Option<String>,
    /// Node type or custom set name
    pub kind: String,
    pub features: Vec<FeatureSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationSpec {
    pub line: usize,
    pub left: AtomRef,
    pub op: OpSpec,
    pub right: AtomRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantifierKind {
    Without,
    Where,
    With,
}

impl QuantifierKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            QuantifierKind::Without => "/without/",
            QuantifierKind::Where => "/where/",
            QuantifierKind::With => "/with/",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuantifierSpec {
    pub line: usize,
    /// Index of the atom the quantifier applies to
    pub parent: usize,
    pub kind: QuantifierKind,
    /// `/without/`: one block; `/where/`: condition and consequence;
    /// `/with/`: one block per alternative
    pub blocks: Vec<Template>,
}

/// A parsed template
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Template {
    pub atoms: Vec<AtomSpec>,
    pub relations: Vec<RelationSpec>,
    pub quantifiers: Vec<QuantifierSpec>,
}

impl Template {
    /// Every feature the template refers to, quantifiers included
    pub fn features(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_features(&mut names);
        names
    }

    fn collect_features(&self, names: &mut BTreeSet<String>) {
        for atom in &self.atoms {
            names.extend(atom.features.iter().map(|f| f.feature.clone()));
        }
        for relation in &self.relations {
            match &relation.op {
                OpSpec::Feature { left, right, .. } => {
                    names.insert(left.clone());
                    names.insert(right.clone());
                }
                OpSpec::Edge { feature, .. } => {
                    names.insert(feature.clone());
                }
                OpSpec::Basic(_) | OpSpec::Near { .. } => {}
            }
        }
        for quantifier in &self.quantifiers {
            for block in &quantifier.blocks {
                block.collect_features(names);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    Without,
    Where,
    Have,
    With,
    Or,
    End,
}

fn keyword(text: &str) -> Option<Keyword> {
    match text {
        "/without/" => Some(Keyword::Without),
        "/where/" => Some(Keyword::Where),
        "/have/" => Some(Keyword::Have),
        "/with/" => Some(Keyword::With),
        "/or/" => Some(Keyword::Or),
        "/-/" => Some(Keyword::End),
        _ => None,
    }
}

#[derive(Clone, Debug)]
struct Line {
    number: usize,
    indent: usize,
    text: String,
}

pub fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_name(text: &str) -> bool {
    text == PARENT || is_identifier(text)
}

/// Split on whitespace; `\ ` is a literal space
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse a relation operator
pub fn parse_op(text: &str) -> Option<OpSpec> {
    if let Some(op) = BASIC_OPS.iter().find(|op| **op == text) {
        return Some(OpSpec::Basic(op.to_string()));
    }
    parse_near(text)
        .or_else(|| parse_feature_op(text))
        .or_else(|| parse_edge_op(text))
}

fn parse_near(text: &str) -> Option<OpSpec> {
    let mut chars = text.chars();
    let (first, last) = (chars.next()?, chars.next_back()?);
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let kind = match (first, last) {
        ('=', ':') => NearKind::Start,
        (':', '=') => NearKind::End,
        (':', ':') => NearKind::Both,
        ('<', ':') => NearKind::Before,
        (':', '>') => NearKind::After,
        _ => return None,
    };
    Some(OpSpec::Near {
        kind,
        k: digits.parse().ok()?,
    })
}

fn parse_feature_op(text: &str) -> Option<OpSpec> {
    let inner = text.strip_prefix('.')?.strip_suffix('.')?;
    let (left, cmp, right) = match inner.find(['=', '#', '<', '>']) {
        None => (inner, Comparison::Equal, inner),
        Some(i) => {
            let cmp = match &inner[i..i + 1] {
                "=" => Comparison::Equal,
                "#" => Comparison::Unequal,
                "<" => Comparison::Less,
                _ => Comparison::Greater,
            };
            (&inner[..i], cmp, &inner[i + 1..])
        }
    };
    if !is_identifier(left) || !is_identifier(right) {
        return None;
    }
    Some(OpSpec::Feature {
        left: left.to_string(),
        cmp,
        right: right.to_string(),
    })
}

fn parse_edge_op(text: &str) -> Option<OpSpec> {
    let (direction, inner) = if let Some(inner) = text.strip_prefix('-').and_then(|t| t.strip_suffix('>')) {
        (EdgeDirection::Forward, inner)
    } else if let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('-')) {
        (EdgeDirection::Backward, inner)
    } else if let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        (EdgeDirection::Both, inner)
    } else {
        return None;
    };
    let (feature, values) = match inner.find(['=', '#']) {
        None => (inner, None),
        Some(i) => {
            let values: Vec<String> = inner[i + 1..].split('|').map(str::to_string).collect();
            if values.iter().any(String::is_empty) {
                return None;
            }
            (&inner[..i], Some((&inner[i..i + 1] == "#", values)))
        }
    };
    if !is_identifier(feature) || feature.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(OpSpec::Edge {
        feature: feature.to_string(),
        direction,
        values,
    })
}

fn split_values(text: &str) -> Vec<String> {
    text.split('|').map(str::to_string).collect()
}

/// Parse a feature condition such as `lex=a|b`, `gloss#`, `freq>10`
pub fn parse_feature_spec(token: &str) -> Result<FeatureSpec, String> {
    let (feature, cond) = match token.find(['=', '#', '<', '>', '~']) {
        None => (token, FeatureCond::Present),
        Some(i) => {
            let rest = &token[i + 1..];
            let cond = match &token[i..i + 1] {
                "=" if rest.is_empty() => {
                    return Err(format!("no value after = in {}", token));
                }
                "=" => FeatureCond::Equals(split_values(rest)),
                "#" if rest.is_empty() => FeatureCond::Absent,
                "#" => FeatureCond::Differs(split_values(rest)),
                "~" => FeatureCond::Matches(rest.to_string()),
                op => {
                    let bound: i64 = rest
                        .parse()
                        .map_err(|_| format!("{} needs an integer after {}", token, op))?;
                    if op == "<" {
                        FeatureCond::Less(bound)
                    } else {
                        FeatureCond::Greater(bound)
                    }
                }
            };
            (&token[..i], cond)
        }
    };
    if !is_identifier(feature) {
        return Err(format!("not a feature name: \"{}\"", feature));
    }
    Ok(FeatureSpec {
        feature: feature.to_string(),
        cond,
    })
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
    errors: Vec<String>,
}

/// Parse a template, collecting all syntax errors
pub fn parse(text: &str) -> Result<Template, Vec<String>> {
    let lines = text
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let content = raw.trim();
            if content.is_empty() || content.starts_with('%') {
                return None;
            }
            let indent = raw.len() - raw.trim_start().len();
            Some(Line {
                number: i + 1,
                indent,
                text: content.to_string(),
            })
        })
        .collect();
    let mut parser = Parser {
        lines,
        pos: 0,
        errors: Vec::new(),
    };
    let template = parser.block(None);
    if let Some(line) = parser.lines.get(parser.pos) {
        parser
            .errors
            .push(format!("line {}: unexpected {}", line.number, line.text));
    }
    if template.atoms.is_empty() && parser.errors.is_empty() {
        parser.errors.push("template has no atoms".to_string());
    }
    if parser.errors.is_empty() {
        Ok(template)
    } else {
        Err(parser.errors)
    }
}

impl Parser {
    fn error(&mut self, line: usize, message: impl AsRef<str>) {
        self.errors.push(format!("line {}: {}", line, message.as_ref()));
    }

    /// Parse lines until a closing keyword or the end. `quantifier` is the
    /// indentation of the enclosing quantifier keyword.
    fn block(&mut self, quantifier: Option<usize>) -> Template {
        let mut template = Template::default();
        let mut stack: Vec<(usize, usize)> = Vec::new();
        while let Some(line) = self.lines.get(self.pos).cloned() {
            match keyword(&line.text) {
                Some(Keyword::Have | Keyword::Or | Keyword::End) => break,
                Some(Keyword::Without) => {
                    self.pos += 1;
                    self.quantifier(QuantifierKind::Without, &line, &mut template);
                    continue;
                }
                Some(Keyword::Where) => {
                    self.pos += 1;
                    self.quantifier(QuantifierKind::Where, &line, &mut template);
                    continue;
                }
                Some(Keyword::With) => {
                    self.pos += 1;
                    self.quantifier(QuantifierKind::With, &line, &mut template);
                    continue;
                }
                None => {}
            }
            self.pos += 1;
            let tokens = tokenize(&line.text);
            if tokens.len() == 3 && is_name(&tokens[0]) && is_name(&tokens[2]) {
                if let Some(op) = parse_op(&tokens[1]) {
                    let to_ref = |name: &str| match name {
                        PARENT => AtomRef::Parent,
                        other => AtomRef::Name(other.to_string()),
                    };
                    template.relations.push(RelationSpec {
                        line: line.number,
                        left: to_ref(&tokens[0]),
                        op,
                        right: to_ref(&tokens[2]),
                    });
                    continue;
                }
            }
            self.atom(&line, &tokens, quantifier, &mut stack, &mut template);
        }
        template
    }

    fn atom(
        &mut self,
        line: &Line,
        tokens: &[String],
        quantifier: Option<usize>,
        stack: &mut Vec<(usize, usize)>,
        template: &mut Template,
    ) {
        let (prefix, rest) = match tokens.split_first() {
            Some((first, rest)) if !rest.is_empty() => match parse_op(first) {
                Some(op) => (Some(op), rest),
                None => (None, tokens),
            },
            _ => (None, tokens),
        };
        let Some((head, specs)) = rest.split_first() else {
            self.error(line.number, "empty atom");
            return;
        };
        let (mut name, kind) = match head.split_once(':') {
            Some((name, kind)) => (Some(name.to_string()), kind.to_string()),
            None => (None, head.to_string()),
        };
        let mut specs = specs;
        if name.is_none() {
            if let Some((first, rest)) = specs.split_first() {
                if is_identifier(first) {
                    name = Some(first.clone());
                    specs = rest;
                }
            }
        }
        if let Some(name) = &name {
            if !is_identifier(name) {
                self.error(line.number, format!("invalid atom name \"{}\"", name));
            }
        }
        if kind.is_empty() {
            self.error(line.number, "atom without a node type");
            return;
        }
        let mut features = Vec::new();
        for spec in specs {
            match parse_feature_spec(spec) {
                Ok(spec) => features.push(spec),
                Err(message) => self.error(line.number, message),
            }
        }

        let index = template.atoms.len();
        let mut sibling = None;
        while let Some(&(indent, atom)) = stack.last() {
            if indent < line.indent {
                break;
            }
            if indent == line.indent {
                sibling = Some(atom);
            }
            stack.pop();
        }
        match stack.last() {
            Some(&(_, parent)) => template.relations.push(RelationSpec {
                line: line.number,
                left: AtomRef::Local(parent),
                op: OpSpec::Basic("[[".to_string()),
                right: AtomRef::Local(index),
            }),
            None => {
                if quantifier.is_some_and(|q| line.indent > q) {
                    template.relations.push(RelationSpec {
                        line: line.number,
                        left: AtomRef::Parent,
                        op: OpSpec::Basic("[[".to_string()),
                        right: AtomRef::Local(index),
                    });
                }
            }
        }
        if let Some(op) = prefix {
            match sibling {
                Some(sibling) => template.relations.push(RelationSpec {
                    line: line.number,
                    left: AtomRef::Local(sibling),
                    op,
                    right: AtomRef::Local(index),
                }),
                None => self.error(
                    line.number,
                    "relation operator without a preceding atom at the same level",
                ),
            }
        }
        stack.push((line.indent, index));
        template.atoms.push(AtomSpec {
            line: line.number,
            indent: line.indent,
            name,
            kind,
            features,
        });
    }

    fn expect(&mut self, wanted: Keyword, opened: usize) -> bool {
        match self.lines.get(self.pos) {
            Some(line) if keyword(&line.text) == Some(wanted) => {
                self.pos += 1;
                true
            }
            Some(line) => {
                let number = line.number;
                let text = line.text.clone();
                self.error(
                    number,
                    format!("unexpected {} in quantifier of line {}", text, opened),
                );
                false
            }
            None => {
                self.error(opened, "quantifier is not closed with /-/");
                false
            }
        }
    }

    fn quantifier(&mut self, kind: QuantifierKind, line: &Line, template: &mut Template) {
        let parent = template.atoms.iter().rposition(|a| a.indent <= line.indent);
        let mut blocks = vec![self.block(Some(line.indent))];
        match kind {
            QuantifierKind::Without => {
                self.expect(Keyword::End, line.number);
            }
            QuantifierKind::Where => {
                if self.expect(Keyword::Have, line.number) {
                    blocks.push(self.block(Some(line.indent)));
                    self.expect(Keyword::End, line.number);
                }
            }
            QuantifierKind::With => loop {
                match self.lines.get(self.pos).map(|l| keyword(&l.text)) {
                    Some(Some(Keyword::Or)) => {
                        self.pos += 1;
                        blocks.push(self.block(Some(line.indent)));
                    }
                    _ => {
                        self.expect(Keyword::End, line.number);
                        break;
                    }
                }
            },
        }
        if blocks.iter().any(|b| b.atoms.is_empty() && b.relations.is_empty()) {
            self.error(line.number, format!("empty block in {}", kind.keyword()));
        }
        match parent {
            Some(parent) => template.quantifiers.push(QuantifierSpec {
                line: line.number,
                parent,
                kind,
                blocks,
            }),
            None => self.error(
                line.number,
                format!("{} has no atom to apply to", kind.keyword()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ops() {
        assert_eq!(parse_op("[["), Some(OpSpec::Basic("[[".to_string())));
        assert_eq!(
            parse_op("<3:"),
            Some(OpSpec::Near {
                kind: NearKind::Before,
                k: 3
            })
        );
        assert_eq!(
            parse_op(".lex."),
            Some(OpSpec::Feature {
                left: "lex".to_string(),
                cmp: Comparison::Equal,
                right: "lex".to_string()
            })
        );
        assert_eq!(
            parse_op(".g<h."),
            Some(OpSpec::Feature {
                left: "g".to_string(),
                cmp: Comparison::Less,
                right: "h".to_string()
            })
        );
        assert_eq!(
            parse_op("<mother-"),
            Some(OpSpec::Edge {
                feature: "mother".to_string(),
                direction: EdgeDirection::Backward,
                values: None
            })
        );
        assert_eq!(
            parse_op("-crossref#60|70>"),
            Some(OpSpec::Edge {
                feature: "crossref".to_string(),
                direction: EdgeDirection::Forward,
                values: Some((true, vec!["60".to_string(), "70".to_string()]))
            })
        );
        assert_eq!(parse_op("<>"), None);
        assert_eq!(parse_op("lex"), None);
        assert_eq!(parse_op("=x:"), None);
    }

    #[test]
    fn test_feature_specs() {
        let spec = parse_feature_spec("pos=noun|verb").unwrap();
        assert_eq!(
            spec.cond,
            FeatureCond::Equals(vec!["noun".to_string(), "verb".to_string()])
        );
        assert_eq!(parse_feature_spec("gloss#").unwrap().cond, FeatureCond::Absent);
        assert_eq!(parse_feature_spec("gloss").unwrap().cond, FeatureCond::Present);
        assert_eq!(parse_feature_spec("freq>10").unwrap().cond, FeatureCond::Greater(10));
        assert_eq!(
            parse_feature_spec("lex~^be").unwrap().cond,
            FeatureCond::Matches("^be".to_string())
        );
        assert!(parse_feature_spec("freq<ten").is_err());
        assert!(parse_feature_spec("pos=").is_err());
    }

    #[test]
    fn test_atom_names() {
        let template = parse("sentence s\nw:word gloss\nword lex gloss\n").unwrap();
        let names: Vec<Option<&str>> = template.atoms.iter().map(|a| a.name.as_deref()).collect();
        assert_eq!(names, vec![Some("s"), Some("w"), Some("lex")]);
        assert!(template.atoms[0].features.is_empty());
        assert_eq!(template.atoms[1].features[0].cond, FeatureCond::Present);
        assert_eq!(template.atoms[2].features[0].feature, "gloss");
    }

    #[test]
    fn test_escaped_space() {
        let template = parse("word gloss=in\\ the").unwrap();
        assert_eq!(
            template.atoms[0].features[0].cond,
            FeatureCond::Equals(vec!["in the".to_string()])
        );
    }

    #[test]
    fn test_nesting_and_siblings() {
        let template = parse(
            "% verses with two adjacent words\n\
             verse\n  \
               w1:word pos=art\n  \
               <: word\n\
             w1 < verse\n",
        )
        .unwrap();
        assert_eq!(template.atoms.len(), 3);
        assert_eq!(template.atoms[1].name.as_deref(), Some("w1"));
        assert_eq!(template.atoms[1].line, 3);
        let rels: Vec<(AtomRef, AtomRef)> = template
            .relations
            .iter()
            .map(|r| (r.left.clone(), r.right.clone()))
            .collect();
        assert_eq!(
            rels,
            vec![
                (AtomRef::Local(0), AtomRef::Local(1)),
                (AtomRef::Local(0), AtomRef::Local(2)),
                (AtomRef::Local(1), AtomRef::Local(2)),
                (
                    AtomRef::Name("w1".to_string()),
                    AtomRef::Name("verse".to_string())
                ),
            ]
        );
        assert_eq!(template.relations[2].op, OpSpec::Basic("<:".to_string()));
        assert_eq!(template.features(), BTreeSet::from(["pos".to_string()]));
    }

    #[test]
    fn test_quantifiers() {
        let template = parse(
            "chapter\n\
             \x20 phrase\n\
             \x20 /without/\n\
             \x20   word pos=verb\n\
             \x20 /-/\n\
             \x20 /where/\n\
             \x20   w:word\n\
             \x20 /have/\n\
             \x20 w -subject> ..\n\
             \x20 /-/\n\
             /with/\n\
             .. [[ verse\n\
             /or/\n\
             .. [[ phrase function=Pred\n\
             /-/\n",
        )
        .unwrap();
        assert_eq!(template.atoms.len(), 2);
        assert_eq!(template.quantifiers.len(), 3);
        let without = &template.quantifiers[0];
        assert_eq!(without.kind, QuantifierKind::Without);
        assert_eq!(without.parent, 1);
        assert_eq!(without.blocks[0].relations[0].left, AtomRef::Parent);
        let where_ = &template.quantifiers[1];
        assert_eq!(where_.blocks.len(), 2);
        assert_eq!(where_.blocks[1].relations[0].right, AtomRef::Parent);
        let with = &template.quantifiers[2];
        assert_eq!(with.parent, 0);
        assert_eq!(with.blocks.len(), 2);
        assert!(template.features().contains("subject"));
        assert!(template.features().contains("function"));
    }

    #[test]
    fn test_errors_are_collected() {
        let errors = parse("word pos=\n<: verse\n/without/\nword\n").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("line 1:"));
        assert!(errors[1].starts_with("line 2:"));
        assert!(errors[2].contains("not closed"));
        assert!(parse("% nothing\n\n").is_err());
        assert!(parse("word\n/-/\n").is_err());
    }
}
