//! resource / output / variable node parsing

use super::value::{arguments, kdl_to_json, named, parse_entry, parse_node_value, string_arguments};
use crate::error::{CoreError, Result};
use crate::model::{OutputBinding, PropertyValue, Reference, ResourceDescriptor, Variable};

/// Child node names reserved for explicit dependencies
const DEPENDS_ON: [&str; 2] = ["depends-on", "depends_on"];

/// Parse a `resource "<type>" "<name>" { ... }` node
pub fn parse_resource(node: &kdl::KdlNode) -> Result<ResourceDescriptor> {
    let args = string_arguments(node);
    let (resource_type, name) = match args.as_slice() {
        [resource_type, name] => (*resource_type, *name),
        _ => {
            return Err(CoreError::InvalidConfig(
                "resource requires a type and a name: resource \"<type>\" \"<name>\"".to_string(),
            ));
        }
    };

    let mut descriptor = ResourceDescriptor::new(resource_type, name);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value();

            if DEPENDS_ON.contains(&key) {
                for entry in arguments(child) {
                    let dep = entry.value().as_string().ok_or_else(|| CoreError::InvalidValue {
                        resource: name.to_string(),
                        key: key.to_string(),
                        message: "dependencies must be resource names".to_string(),
                    })?;
                    descriptor.depends_on.insert(dep.to_string());
                }
                continue;
            }

            let value = parse_node_value(child).map_err(|e| CoreError::InvalidValue {
                resource: name.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

            if descriptor.properties.insert(key.to_string(), value).is_some() {
                return Err(CoreError::InvalidValue {
                    resource: name.to_string(),
                    key: key.to_string(),
                    message: "property is set more than once".to_string(),
                });
            }
        }
    }

    Ok(descriptor)
}

/// Parse an `output` node
///
/// Accepted forms:
/// - `output "vpcId" (ref)"my-vpc.id"`
/// - `output "vpcId" "my-vpc.id"`
/// - `output "vpcId" resource="my-vpc" attribute="id"`
pub fn parse_output(node: &kdl::KdlNode) -> Result<OutputBinding> {
    let args = arguments(node);
    let name = args
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| CoreError::InvalidConfig("output requires a name".to_string()))?;

    let reference = match args.get(1) {
        Some(entry) => match parse_entry(entry) {
            Ok(PropertyValue::Reference(r)) => r,
            Ok(PropertyValue::Literal(serde_json::Value::String(text))) => Reference::parse(&text)
                .ok_or_else(|| CoreError::InvalidReference(text.clone()))?,
            Ok(_) => {
                return Err(CoreError::InvalidConfig(format!(
                    "output '{name}' must point at a resource attribute"
                )));
            }
            Err(e) => return Err(e),
        },
        None => {
            let resource = named(node, "resource").and_then(|e| e.value().as_string());
            let attribute = named(node, "attribute").and_then(|e| e.value().as_string());
            match (resource, attribute) {
                (Some(resource), Some(attribute)) => Reference::new(resource, attribute),
                _ => {
                    return Err(CoreError::InvalidConfig(format!(
                        "output '{name}' requires a reference"
                    )));
                }
            }
        }
    };

    Ok(OutputBinding::new(name, reference))
}

/// Parse a `variable "<name>" default=... description="..."` node
pub fn parse_variable(node: &kdl::KdlNode) -> Result<Variable> {
    let name = string_arguments(node)
        .first()
        .copied()
        .ok_or_else(|| CoreError::InvalidConfig("variable requires a name".to_string()))?;

    Ok(Variable {
        name: name.to_string(),
        default: named(node, "default").map(|e| kdl_to_json(e.value())),
        description: named(node, "description")
            .and_then(|e| e.value().as_string())
            .map(str::to_string),
    })
}
