//! Resource descriptors

use super::value::{Properties, PropertyValue, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Desired state of a single resource
///
/// Immutable once a run has started. The logical name identifies the
/// resource across runs; the provider-assigned id lives in state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Provider resource type (e.g. "aws:ec2:Subnet")
    pub resource_type: String,

    /// Logical name, unique within a project
    pub name: String,

    /// Declared properties
    #[serde(default)]
    pub properties: Properties,

    /// Explicit dependencies in addition to the ones implied by references
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            properties: Properties::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// All references in this resource's properties
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .flat_map(PropertyValue::references)
            .collect()
    }

    /// Logical names this resource depends on, explicit and implied
    pub fn dependency_names(&self) -> BTreeSet<&str> {
        self.references()
            .into_iter()
            .map(|r| r.resource.as_str())
            .chain(self.depends_on.iter().map(String::as_str))
            .collect()
    }
}

/// Named value exported after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    /// Exported name (e.g. "vpcId")
    pub name: String,

    /// Resource attribute the value is read from
    pub reference: Reference,
}

impl OutputBinding {
    pub fn new(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            reference,
        }
    }
}
