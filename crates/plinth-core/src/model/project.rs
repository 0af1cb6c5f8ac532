//! Project definition

use super::resource::{OutputBinding, ResourceDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A loaded project: the desired resources plus run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    /// Project name
    pub name: String,

    /// Engine settings
    #[serde(default)]
    pub settings: Settings,

    /// Declared input variables
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,

    /// Resources in declaration order
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,

    /// Exported outputs in declaration order
    #[serde(default)]
    pub outputs: Vec<OutputBinding>,
}

impl Project {
    pub fn resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputBinding> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// Declared input variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    /// Value used when no override is given; `None` makes the variable required
    pub default: Option<serde_json::Value>,

    pub description: Option<String>,
}

/// Engine settings from the `settings` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum number of resources processed concurrently
    pub jobs: usize,

    /// Attempts per provider call (first try included)
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    pub backoff_multiplier: f64,

    /// Timeout for a single provider call
    pub action_timeout_secs: u64,

    /// Directory holding state.json and lock.json, relative to the project root
    pub state_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: 4,
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            action_timeout_secs: 600,
            state_dir: PathBuf::from(".plinth"),
        }
    }
}
