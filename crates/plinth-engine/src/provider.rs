//! Resource provider trait definition

use crate::error::ProviderError;
use crate::schema::ResourceSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fully resolved properties handed to a provider
pub type ResolvedProperties = serde_json::Map<String, serde_json::Value>;

/// Output attributes reported by a provider
pub type Outputs = serde_json::Map<String, serde_json::Value>;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Created {
    /// Identifier assigned by the provider
    pub provider_id: String,

    /// Attributes of the new instance (ids, addresses, ...)
    pub outputs: Outputs,
}

/// Resource provider abstraction
///
/// The engine calls a provider concurrently from several tasks; every
/// implementation must be safe to share.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name (e.g. "sim")
    fn name(&self) -> &str;

    /// Schema for a resource type, or `None` if the type is not supported
    fn schema(&self, resource_type: &str) -> Option<ResourceSchema>;

    /// Create a new instance
    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Created>;

    /// Update an existing instance in place and return its new outputs
    async fn update(
        &self,
        resource_type: &str,
        name: &str,
        provider_id: &str,
        properties: &ResolvedProperties,
    ) -> ProviderResult<Outputs>;

    /// Delete an instance
    async fn delete(&self, resource_type: &str, name: &str, provider_id: &str)
    -> ProviderResult<()>;
}
