//! Resource schemas
//!
//! A schema tells the differ which property changes force a replacement and
//! in which order a replacement runs.

use crate::action::ReplaceOrder;
use crate::error::ConfigurationError;
use crate::graph::ResourceGraph;
use crate::provider::ResourceProvider;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Per-type capabilities declared by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Properties whose change requires a new instance
    pub replace_on: BTreeSet<String>,

    /// Create the new instance before deleting the old one on replacement
    pub create_before_delete: bool,
}

impl ResourceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replace_on<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_on.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn with_create_before_delete(mut self, enabled: bool) -> Self {
        self.create_before_delete = enabled;
        self
    }

    pub fn requires_replacement(&self, property: &str) -> bool {
        self.replace_on.contains(property)
    }

    pub fn replace_order(&self) -> ReplaceOrder {
        if self.create_before_delete {
            ReplaceOrder::CreateBeforeDelete
        } else {
            ReplaceOrder::DeleteBeforeCreate
        }
    }
}

/// Schemas for every resource type used by a graph
#[derive(Debug, Clone)]
pub struct SchemaSet {
    /// Name of the provider the schemas came from
    provider: String,
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaSet {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            schemas: HashMap::new(),
        }
    }

    /// Ask the provider for the schema of each type in the graph
    pub fn collect(
        graph: &ResourceGraph,
        provider: &dyn ResourceProvider,
    ) -> Result<Self, ConfigurationError> {
        let mut schemas = HashMap::new();
        for descriptor in graph.descriptors() {
            if schemas.contains_key(&descriptor.resource_type) {
                continue;
            }
            let schema = provider.schema(&descriptor.resource_type).ok_or_else(|| {
                ConfigurationError::UnknownResourceType {
                    name: descriptor.name.clone(),
                    resource_type: descriptor.resource_type.clone(),
                    provider: provider.name().to_string(),
                }
            })?;
            schemas.insert(descriptor.resource_type.clone(), schema);
        }
        Ok(Self {
            provider: provider.name().to_string(),
            schemas,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn insert(&mut self, resource_type: impl Into<String>, schema: ResourceSchema) {
        self.schemas.insert(resource_type.into(), schema);
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.schemas.get(resource_type)
    }
}
