//! Property values
//!
//! A resource's properties form a tree of literals, references to other
//! resources' outputs and variable uses. References stay deferred until the
//! referenced resource has been applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Properties of a resource, keyed by property name
pub type Properties = BTreeMap<String, PropertyValue>;

/// Deferred pointer to an output attribute of another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Logical name of the referenced resource
    pub resource: String,

    /// Dotted attribute path into the resource's outputs (e.g. "id", "tags.Name")
    pub attribute: String,
}

impl Reference {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// Parse the textual form `"<resource>.<attribute path>"`
    pub fn parse(text: &str) -> Option<Self> {
        let (resource, attribute) = text.split_once('.')?;
        if resource.is_empty() || attribute.is_empty() || attribute.split('.').any(str::is_empty)
        {
            return None;
        }
        Some(Self::new(resource, attribute))
    }

    /// Look the attribute up in a resource's outputs
    pub fn select<'a>(&self, outputs: &'a serde_json::Map<String, Value>) -> Option<&'a Value> {
        let mut segments = self.attribute.split('.');
        let first = segments.next()?;
        let mut current = outputs.get(first)?;
        for segment in segments {
            current = select_segment(current, segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

fn select_segment<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// A property value as declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Plain JSON value
    Literal(Value),
    /// Output attribute of another resource, known only once it is applied
    Reference(Reference),
    /// Use of a declared variable, substituted at load time
    Variable(String),
    /// List whose items may contain references
    List(Vec<PropertyValue>),
    /// Map whose values may contain references
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Reference(Reference::new(resource, attribute))
    }

    /// All references contained in this value, depth first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Reference(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(map) => map.values().for_each(|v| v.collect_references(out)),
            Self::Literal(_) | Self::Variable(_) => {}
        }
    }

    /// Names of all variables used in this value
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Self::Variable(name) => vec![name.as_str()],
            Self::List(items) => items.iter().flat_map(|v| v.variables()).collect(),
            Self::Map(map) => map.values().flat_map(|v| v.variables()).collect(),
            Self::Literal(_) | Self::Reference(_) => Vec::new(),
        }
    }

    /// Replace variable uses with their values
    ///
    /// Returns the name of the first variable the lookup could not provide.
    pub fn substitute<F>(self, lookup: &F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<Value>,
    {
        Ok(match self {
            Self::Variable(name) => match lookup(&name) {
                Some(value) => Self::Literal(value),
                None => return Err(name),
            },
            Self::List(items) => Self::List(
                items
                    .into_iter()
                    .map(|v| v.substitute(lookup))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Self::Map(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| v.substitute(lookup).map(|v| (k, v)))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            other => other,
        })
    }

    /// Resolve into a plain JSON value
    ///
    /// Returns `None` when any reference cannot be resolved yet, or when a
    /// variable is still unsubstituted.
    pub fn resolve<F>(&self, lookup: &mut F) -> Option<Value>
    where
        F: FnMut(&Reference) -> Option<Value>,
    {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Reference(r) => lookup(r),
            Self::Variable(_) => None,
            Self::List(items) => items
                .iter()
                .map(|v| v.resolve(lookup))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| v.resolve(lookup).map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<Reference> for PropertyValue {
    fn from(reference: Reference) -> Self {
        Self::Reference(reference)
    }
}
