//! Property value parsing
//!
//! Encoding rules:
//! - one argument → scalar
//! - several arguments → list
//! - child block → map
//! - child block made only of `-` nodes → list
//! - `(ref)"res.attr"` → reference, `(var)"name"` → variable use

use crate::error::{CoreError, Result};
use crate::model::{PropertyValue, Reference};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde_json::Value;

/// Node name marking a list item inside a block
const LIST_ITEM: &str = "-";

/// Convert a KDL scalar to JSON
pub(crate) fn kdl_to_json(value: &KdlValue) -> Value {
    if let Some(s) = value.as_string() {
        Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if let Some(b) = value.as_bool() {
        Value::Bool(b)
    } else {
        Value::Null
    }
}

/// Positional arguments of a node (named properties excluded)
pub(crate) fn arguments(node: &KdlNode) -> Vec<&KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none()).collect()
}

/// Named property of a node, e.g. `default="x"`
pub(crate) fn named<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlEntry> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
}

/// String arguments of a node, in order
pub(crate) fn string_arguments(node: &KdlNode) -> Vec<&str> {
    arguments(node)
        .into_iter()
        .filter_map(|e| e.value().as_string())
        .collect()
}

/// Convert a single argument, honoring `(ref)` and `(var)` annotations
pub(crate) fn parse_entry(entry: &KdlEntry) -> Result<PropertyValue> {
    match entry.ty().map(|t| t.value()) {
        Some("ref") => {
            let text = entry.value().as_string().ok_or_else(|| {
                CoreError::InvalidConfig("(ref) must annotate a string".to_string())
            })?;
            Reference::parse(text)
                .map(PropertyValue::Reference)
                .ok_or_else(|| CoreError::InvalidReference(text.to_string()))
        }
        Some("var") => entry
            .value()
            .as_string()
            .map(|name| PropertyValue::Variable(name.to_string()))
            .ok_or_else(|| CoreError::InvalidConfig("(var) must annotate a string".to_string())),
        Some(other) => Err(CoreError::InvalidConfig(format!(
            "unknown type annotation ({other})"
        ))),
        None => Ok(PropertyValue::Literal(kdl_to_json(entry.value()))),
    }
}

/// Convert a property node to a value
pub(crate) fn parse_node_value(node: &KdlNode) -> Result<PropertyValue> {
    let args = arguments(node);
    match (node.children(), args.len()) {
        (Some(children), 0) => parse_block(children),
        (Some(_), _) => Err(CoreError::InvalidConfig(format!(
            "'{}' cannot have both arguments and a block",
            node.name().value()
        ))),
        (None, 0) => Ok(PropertyValue::Literal(Value::Null)),
        (None, 1) => parse_entry(args[0]),
        (None, _) => args
            .into_iter()
            .map(parse_entry)
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
    }
}

fn parse_block(children: &KdlDocument) -> Result<PropertyValue> {
    let nodes = children.nodes();

    if !nodes.is_empty() && nodes.iter().all(|n| n.name().value() == LIST_ITEM) {
        return nodes
            .iter()
            .map(parse_node_value)
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List);
    }

    let mut map = std::collections::BTreeMap::new();
    for node in nodes {
        let key = node.name().value();
        if key == LIST_ITEM {
            return Err(CoreError::InvalidConfig(
                "list items ('-') cannot be mixed with named entries".to_string(),
            ));
        }
        map.insert(key.to_string(), parse_node_value(node)?);
    }
    Ok(PropertyValue::Map(map))
}
