//! Project loader
//!
//! Reads the project file, parses it and substitutes variables.
//!
//! Variable precedence (highest first):
//! 1. explicit overrides (`--var name=value`)
//! 2. environment variable `PLINTH_VAR_<name>`
//! 3. the declared default

use crate::error::{CoreError, Result};
use crate::model::{Project, Variable};
use crate::parser::parse_kdl_file;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Prefix of environment variables that set project variables
pub const VARIABLE_ENV_PREFIX: &str = "PLINTH_VAR_";

/// Variable values supplied by the caller, as raw strings
pub type VariableOverrides = BTreeMap<String, String>;

/// Load a project file and substitute its variables
#[instrument(skip(overrides), fields(path = %path.display()))]
pub fn load_project(path: &Path, overrides: &VariableOverrides) -> Result<Project> {
    debug!("Parsing project file");
    let mut project = parse_kdl_file(path)?;

    resolve_variables(&mut project, overrides, |name| {
        std::env::var(format!("{VARIABLE_ENV_PREFIX}{name}")).ok()
    })?;

    info!(
        project = %project.name,
        resources = project.resources.len(),
        outputs = project.outputs.len(),
        "Project loaded"
    );
    Ok(project)
}

/// Substitute every variable use in the project's resources
///
/// `env` looks up the environment-provided value of a variable by name.
pub fn resolve_variables<E>(
    project: &mut Project,
    overrides: &VariableOverrides,
    env: E,
) -> Result<()>
where
    E: Fn(&str) -> Option<String>,
{
    for name in overrides.keys() {
        if !project.variables.contains_key(name) {
            return Err(CoreError::UndeclaredVariable(name.clone()));
        }
    }

    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    for (name, variable) in &project.variables {
        let raw = overrides.get(name).cloned().or_else(|| env(name));
        let value = match raw {
            Some(raw) => coerce(variable, &raw),
            None => variable
                .default
                .clone()
                .ok_or_else(|| CoreError::MissingVariable(name.clone()))?,
        };
        values.insert(name.clone(), value);
    }

    for resource in &mut project.resources {
        let properties = std::mem::take(&mut resource.properties);
        for (key, value) in properties {
            let value = value
                .substitute(&|name: &str| values.get(name).cloned())
                .map_err(CoreError::UndeclaredVariable)?;
            resource.properties.insert(key, value);
        }
    }

    Ok(())
}

/// Interpret a raw override with the type of the variable's default
fn coerce(variable: &Variable, raw: &str) -> Value {
    match &variable.default {
        Some(Value::Bool(_)) | Some(Value::Number(_)) => {
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => Value::String(raw.to_string()),
    }
}
