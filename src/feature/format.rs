//! Text format of feature files
//!
//! ```text
//! @node
//! @valueType=str
//! @description=part of speech
//!
//! 5*\tnoun
//! verb
//! 9\tadj
//! 11-12\tnoun
//! ```
//!
//! The header consists of `@` lines: the feature kind (`@node`, `@edge`,
//! `@config`), the `@edgeValues` flag and `@key=value` entries. It ends at
//! the first blank line or at an `@@` line.
//!
//! Each data line is `[nodespec<TAB>]value` for node features and
//! `[nodespec<TAB>]targets[<TAB>value]` for edge features. A nodespec is
//! either a run prefix `N*` (the next N nodes) or a comma separated list of
//! nodes and ranges `a-b`. Without a nodespec the line is about the node
//! after the last node of the previous line.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::types::{
    EdgeMap, FeatureKind, FeatureMeta, Node, NodeMap, RawData, RawFeature, Value, ValueType,
    MAX_NODE,
};
use crate::error::{Result, TapestryError};

/// File extension of feature files
pub const FEATURE_EXT: &str = "tf";

/// Read and parse a feature file
pub fn read_feature(path: &Path) -> Result<RawFeature> {
    let text = fs::read_to_string(path)?;
    parse_feature(&text).map_err(|(line, message)| TapestryError::FeatureFormat {
        path: path.to_path_buf(),
        line,
        message,
    })
}

/// Read only the header of a feature file
pub fn read_meta(path: &Path) -> Result<FeatureMeta> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();
    parse_header(&lines)
        .map(|(meta, _)| meta)
        .map_err(|(line, message)| TapestryError::FeatureFormat {
            path: path.to_path_buf(),
            line,
            message,
        })
}

type ParseResult<T> = std::result::Result<T, (usize, String)>;

/// Parse the text of a feature file; errors carry a 1-based line number
pub fn parse_feature(text: &str) -> ParseResult<RawFeature> {
    let lines: Vec<&str> = text.lines().collect();
    let (meta, start) = parse_header(&lines)?;
    let data = match meta.kind {
        FeatureKind::Config => RawData::Config,
        FeatureKind::Node => RawData::Node(parse_node_lines(&lines, start, meta.value_type)?),
        FeatureKind::Edge => RawData::Edge(parse_edge_lines(
            &lines,
            start,
            meta.edge_values,
            meta.value_type,
        )?),
    };
    Ok(RawFeature { meta, data })
}

fn parse_header(lines: &[&str]) -> ParseResult<(FeatureMeta, usize)> {
    let mut kind = None;
    let mut value_type = ValueType::Str;
    let mut edge_values = false;
    let mut entries = BTreeMap::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            break;
        }
        let Some(body) = line.strip_prefix('@') else {
            break;
        };
        i += 1;
        if body.starts_with('@') {
            break;
        }
        match body.trim_end() {
            "node" => kind = Some(FeatureKind::Node),
            "edge" => kind = Some(FeatureKind::Edge),
            "config" => kind = Some(FeatureKind::Config),
            "edgeValues" => edge_values = true,
            _ => {
                let (key, value) = split_meta(body);
                if key.is_empty() {
                    return Err((i, format!("empty metadata key in \"{}\"", line)));
                }
                if key == "valueType" {
                    value_type = ValueType::parse(&value)
                        .ok_or_else(|| (i, format!("unknown value type \"{}\"", value)))?;
                } else {
                    entries.insert(key, value);
                }
            }
        }
    }

    let kind = kind.ok_or_else(|| (1, "missing @node, @edge or @config line".to_string()))?;
    Ok((
        FeatureMeta {
            kind,
            value_type,
            edge_values,
            entries,
        },
        i,
    ))
}

fn split_meta(body: &str) -> (String, String) {
    let sep = body.find(|c: char| c == '=' || c.is_whitespace());
    match sep {
        Some(pos) => (
            body[..pos].to_string(),
            unescape(body[pos + 1..].trim_start()),
        ),
        None => (body.to_string(), String::new()),
    }
}

fn node_number(text: &str) -> std::result::Result<Node, String> {
    let n: Node = text.parse().map_err(|_| format!("bad node \"{}\"", text))?;
    match n {
        0 => Err("node 0 does not exist".to_string()),
        n if n > MAX_NODE => Err(format!("node {} is beyond node {}", n, MAX_NODE)),
        n => Ok(n),
    }
}

/// The node after `last`
fn following(last: Node) -> std::result::Result<Node, String> {
    last.checked_add(1).ok_or_else(|| format!("no node after {}", last))
}

/// The implicit node of a line without nodespec
fn implicit(next: Node) -> std::result::Result<Node, String> {
    if next > MAX_NODE {
        return Err(format!("no node after {}", MAX_NODE));
    }
    Ok(next)
}

/// Resolve a nodespec against the implicit next node
fn parse_node_spec(spec: &str, next: Node) -> std::result::Result<Vec<Node>, String> {
    if let Some(count) = spec.strip_suffix('*') {
        let count: Node = count
            .parse()
            .map_err(|_| format!("bad run length \"{}\"", spec))?;
        if count == 0 {
            return Err("run length must be positive".to_string());
        }
        let last = next
            .checked_add(count - 1)
            .filter(|&n| n <= MAX_NODE)
            .ok_or_else(|| format!("run of {} from node {} is beyond node {}", count, next, MAX_NODE))?;
        return Ok((next..=last).collect());
    }
    let mut nodes = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (node_number(a)?, node_number(b)?);
                if b < a {
                    return Err(format!("bad node range \"{}\"", part));
                }
                nodes.extend(a..=b);
            }
            None => nodes.push(node_number(part)?),
        }
    }
    Ok(nodes)
}

fn parse_node_lines(lines: &[&str], start: usize, value_type: ValueType) -> ParseResult<NodeMap> {
    let mut data = NodeMap::new();
    let mut next: Node = 1;
    for (i, line) in lines.iter().enumerate().skip(start) {
        let lineno = i + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        let (nodes, raw) = match fields.as_slice() {
            [value] => (vec![implicit(next).map_err(|e| (lineno, e))?], *value),
            [spec, value] => (
                parse_node_spec(spec, next).map_err(|e| (lineno, e))?,
                *value,
            ),
            _ => return Err((lineno, format!("expected 1 or 2 fields, got {}", fields.len()))),
        };
        if let Some(&last) = nodes.last() {
            next = following(last).map_err(|e| (lineno, e))?;
        }
        let text = unescape(raw);
        if value_type == ValueType::Int && text.is_empty() {
            continue;
        }
        let value = Value::parse(&text, value_type)
            .ok_or_else(|| (lineno, format!("not an integer: \"{}\"", text)))?;
        for n in nodes {
            data.insert(n, value.clone());
        }
    }
    Ok(data)
}

fn parse_edge_lines(
    lines: &[&str],
    start: usize,
    edge_values: bool,
    value_type: ValueType,
) -> ParseResult<EdgeMap> {
    let mut data = EdgeMap::new();
    let mut next: Node = 1;
    for (i, line) in lines.iter().enumerate().skip(start) {
        let lineno = i + 1;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let (spec, targets, raw) = match (fields.as_slice(), edge_values) {
            ([targets], _) => (None, *targets, None),
            ([targets, value], true) => (None, *targets, Some(*value)),
            ([spec, targets], false) => (Some(*spec), *targets, None),
            ([spec, targets, value], _) => (Some(*spec), *targets, Some(*value)),
            _ => return Err((lineno, format!("expected 1 to 3 fields, got {}", fields.len()))),
        };
        let sources = match spec {
            Some(spec) => parse_node_spec(spec, next).map_err(|e| (lineno, e))?,
            None => vec![implicit(next).map_err(|e| (lineno, e))?],
        };
        if let Some(&last) = sources.last() {
            next = following(last).map_err(|e| (lineno, e))?;
        }
        let targets = parse_node_spec(targets, 1).map_err(|e| (lineno, e))?;
        let value = match raw.map(unescape) {
            Some(text) if edge_values && !text.is_empty() => Some(
                Value::parse(&text, value_type)
                    .ok_or_else(|| (lineno, format!("not an integer: \"{}\"", text)))?,
            ),
            _ => None,
        };
        for source in sources {
            let entry = data.entry(source).or_default();
            for &t in &targets {
                entry.insert(t, value.clone());
            }
        }
    }
    Ok(data)
}

/// Serialize a feature to the text format
pub fn format_feature(feature: &RawFeature) -> String {
    let mut out = String::new();
    let meta = &feature.meta;
    out.push_str(&format!("@{}\n", meta.kind.as_str()));
    if meta.kind == FeatureKind::Edge && meta.edge_values {
        out.push_str("@edgeValues\n");
    }
    if meta.kind != FeatureKind::Config {
        out.push_str(&format!("@valueType={}\n", meta.value_type.as_str()));
    }
    for (key, value) in &meta.entries {
        out.push_str(&format!("@{}={}\n", key, escape(value)));
    }
    out.push('\n');

    match &feature.data {
        RawData::Config => {}
        RawData::Node(data) => write_node_lines(&mut out, data),
        RawData::Edge(data) => write_edge_lines(&mut out, data, meta.edge_values),
    }
    out
}

/// Write a feature file, creating parent directories as needed
pub fn write_feature(path: &Path, feature: &RawFeature) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(format_feature(feature).as_bytes())?;
    file.flush()?;
    Ok(())
}

fn write_node_lines(out: &mut String, data: &NodeMap) {
    let mut next: Node = 1;
    let mut iter = data.iter().peekable();
    while let Some((&start, value)) = iter.next() {
        let mut end = start;
        while let Some((&n, v)) = iter.peek() {
            if n == end + 1 && *v == value {
                end = n;
                iter.next();
            } else {
                break;
            }
        }
        let rep = escape(&value.to_string());
        let len = end - start + 1;
        match (start == next, len > 1) {
            (true, true) => out.push_str(&format!("{}*\t{}\n", len, rep)),
            (true, false) => out.push_str(&format!("{}\n", rep)),
            (false, true) => out.push_str(&format!("{}-{}\t{}\n", start, end, rep)),
            (false, false) => out.push_str(&format!("{}\t{}\n", start, rep)),
        }
        next = end + 1;
    }
}

fn write_edge_lines(out: &mut String, data: &EdgeMap, edge_values: bool) {
    let mut next: Node = 1;
    for (&source, targets) in data {
        let mut groups: BTreeMap<Option<&Value>, Vec<Node>> = BTreeMap::new();
        for (&t, v) in targets {
            let key = if edge_values { v.as_ref() } else { None };
            groups.entry(key).or_default().push(t);
        }
        for (value, nodes) in groups {
            let spec = if source == next {
                String::new()
            } else {
                format!("{}\t", source)
            };
            let targets = compress_nodes(&nodes);
            if edge_values {
                let rep = value.map(|v| escape(&v.to_string())).unwrap_or_default();
                out.push_str(&format!("{}{}\t{}\n", spec, targets, rep));
            } else {
                out.push_str(&format!("{}{}\n", spec, targets));
            }
            next = source + 1;
        }
    }
}

/// `[1,2,3,5]` -> `1-3,5`
pub fn compress_nodes(nodes: &[Node]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        let start = nodes[i];
        let mut end = start;
        while i + 1 < nodes.len() && nodes[i + 1] == end + 1 {
            end = nodes[i + 1];
            i += 1;
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
        i += 1;
    }
    parts.join(",")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runs_ranges_and_implicit_nodes() {
        let text = "@node\n@valueType=str\n@description=pos\n\n3*\tnoun\nverb\n9\tadj\n11-12\tnoun\n";
        let feature = parse_feature(text).unwrap();
        assert_eq!(feature.meta.kind, FeatureKind::Node);
        assert_eq!(feature.meta.get("description"), Some("pos"));
        let RawData::Node(data) = feature.data else {
            panic!("expected node data");
        };
        assert_eq!(data.len(), 7);
        assert_eq!(data[&1], Value::from("noun"));
        assert_eq!(data[&3], Value::from("noun"));
        assert_eq!(data[&4], Value::from("verb"));
        assert_eq!(data[&9], Value::from("adj"));
        assert_eq!(data[&12], Value::from("noun"));
        assert!(!data.contains_key(&5));
    }

    #[test]
    fn test_header_variants() {
        let text = "@edge\n@edgeValues\n@valueType int\n@@\n1\t2-3\t7\n";
        let feature = parse_feature(text).unwrap();
        assert!(feature.meta.edge_values);
        assert_eq!(feature.meta.value_type, ValueType::Int);
        let RawData::Edge(data) = feature.data else {
            panic!("expected edge data");
        };
        assert_eq!(data[&1][&2], Some(Value::Int(7)));
        assert_eq!(data[&1][&3], Some(Value::Int(7)));
    }

    #[test]
    fn test_edge_fields_without_values() {
        let text = "@edge\n\n2,4\n5\t1\n";
        let RawData::Edge(data) = parse_feature(text).unwrap().data else {
            panic!("expected edge data");
        };
        assert_eq!(data[&1].keys().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(data[&5].keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_bad_lines_report_line_numbers() {
        let err = parse_feature("@node\n@valueType=int\n\n1\n2\tx\n").unwrap_err();
        assert_eq!(err.0, 5);
        let err = parse_feature("@node\n\n0\tx\n").unwrap_err();
        assert_eq!(err.0, 3);
        assert!(parse_feature("no header\n").is_err());
    }

    #[test]
    fn test_node_feature_survives_writing_and_reading() {
        let mut data = NodeMap::new();
        for n in 1..=5 {
            data.insert(n, Value::from("w"));
        }
        data.insert(6, Value::from("tab\there"));
        data.insert(10, Value::from("back\\slash"));
        data.insert(11, Value::from("x"));
        let feature = RawFeature {
            meta: FeatureMeta::new(FeatureKind::Node).with_entry("about", "line\nbreak"),
            data: RawData::Node(data),
        };
        let text = format_feature(&feature);
        assert!(text.contains("5*\tw\n"));
        assert!(text.contains("10\tback\\\\slash\n"));
        assert_eq!(parse_feature(&text).unwrap(), feature);
    }

    #[test]
    fn test_valued_edges_survive_writing_and_reading() {
        let mut data = EdgeMap::new();
        data.entry(1).or_default().insert(4, Some(Value::Int(2)));
        data.entry(1).or_default().insert(5, Some(Value::Int(3)));
        data.entry(3).or_default().insert(6, None);
        let feature = RawFeature {
            meta: FeatureMeta::new(FeatureKind::Edge)
                .with_edge_values(true)
                .with_value_type(ValueType::Int),
            data: RawData::Edge(data),
        };
        let text = format_feature(&feature);
        assert_eq!(parse_feature(&text).unwrap(), feature);
    }

    #[test]
    fn test_node_numbers_beyond_the_node_space() {
        for text in [
            "@node\n\n4294967295*\tx\n",
            "@node\n\n4294967295\tx\ny\n",
            "@edge\n\n1\t4294967295*\n",
            "@node\n\n1-4294967295\tx\n",
        ] {
            let (line, _) = parse_feature(text).unwrap_err();
            assert_eq!(line, 3, "{:?}", text);
        }
        let last = format!("@node\n\n{}\tx\n", MAX_NODE);
        let RawData::Node(data) = parse_feature(&last).unwrap().data else {
            panic!("expected node data");
        };
        assert_eq!(data.get(&MAX_NODE), Some(&Value::Str("x".to_string())));
        let after = format!("@node\n\n{}\tx\ny\n", MAX_NODE);
        assert_eq!(parse_feature(&after).unwrap_err().0, 4);
    }

    #[test]
    fn test_compress_nodes() {
        assert_eq!(compress_nodes(&[1, 2, 3, 5, 7, 8]), "1-3,5,7-8");
        assert_eq!(compress_nodes(&[]), "");
    }
}
