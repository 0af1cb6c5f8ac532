//! Output export
//!
//! Reads the declared output bindings from committed state after a run.

use crate::error::MissingOutputError;
use crate::scheduler::{NodeStatus, RunReport};
use crate::state::StateSnapshot;
use plinth_core::OutputBinding;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Exported output values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSet {
    /// Output name -> value
    pub values: BTreeMap<String, Value>,

    /// Bindings that could not be read, in declaration order
    pub missing: Vec<MissingOutputError>,
}

impl OutputSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Values as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Resolve output bindings against state
///
/// With a report, resources that did not succeed in that run are treated
/// as unavailable even if an older record exists.
pub fn export_outputs(
    bindings: &[OutputBinding],
    snapshot: &StateSnapshot,
    report: Option<&RunReport>,
) -> OutputSet {
    let mut outputs = OutputSet::default();

    for binding in bindings {
        let resource = &binding.reference.resource;
        let not_applied = report
            .and_then(|r| r.status_of(resource))
            .is_some_and(|status| status != NodeStatus::Succeeded);

        let result = if not_applied {
            Err(MissingOutputError::NotApplied {
                output: binding.name.clone(),
                resource: resource.clone(),
            })
        } else {
            match snapshot.get(resource) {
                None => Err(MissingOutputError::NotInState {
                    output: binding.name.clone(),
                    resource: resource.clone(),
                }),
                Some(record) => binding
                    .reference
                    .select(&record.outputs)
                    .cloned()
                    .ok_or_else(|| MissingOutputError::NoAttribute {
                        output: binding.name.clone(),
                        resource: resource.clone(),
                        attribute: binding.reference.attribute.clone(),
                    }),
            }
        };

        match result {
            Ok(value) => {
                outputs.values.insert(binding.name.clone(), value);
            }
            Err(e) => {
                warn!(output = %binding.name, error = %e, "Output not available");
                outputs.missing.push(e);
            }
        }
    }
    outputs
}
