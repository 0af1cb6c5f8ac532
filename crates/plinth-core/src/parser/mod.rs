//! KDL parser
//!
//! Parses a Plinth project file. Node types:
//! `project`, `settings`, `variable`, `resource`, `output`.

mod resource;
mod settings;
mod value;

pub use resource::{parse_output, parse_resource, parse_variable};
pub use settings::parse_settings;

use crate::error::{CoreError, Result};
use crate::model::Project;
use kdl::KdlDocument;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parse a project file
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Project> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CoreError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// Parse project content
///
/// Variable uses are left in place; see [`crate::loader::resolve_variables`].
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Project> {
    let doc: KdlDocument = content.parse()?;

    let mut project = Project {
        name: default_name,
        ..Default::default()
    };
    let mut output_names = HashSet::new();

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                if let Some(name) = node.entries().first().and_then(|e| e.value().as_string()) {
                    project.name = name.to_string();
                }
            }
            "settings" => parse_settings(node, &mut project.settings)?,
            "variable" => {
                let variable = parse_variable(node)?;
                project.variables.insert(variable.name.clone(), variable);
            }
            "resource" => project.resources.push(parse_resource(node)?),
            "output" => {
                let output = parse_output(node)?;
                if !output_names.insert(output.name.clone()) {
                    return Err(CoreError::DuplicateOutput(output.name));
                }
                project.outputs.push(output);
            }
            other => {
                tracing::debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(project)
}
