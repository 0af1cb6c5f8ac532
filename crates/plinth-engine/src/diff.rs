//! Differ: compares the desired graph with the recorded state

use crate::action::{ChangeAction, ChangePlan, DeposedCleanup, PlannedChange, ReplaceOrder};
use crate::error::ConfigurationError;
use crate::graph::ResourceGraph;
use crate::schema::SchemaSet;
use crate::state::{StateRecord, StateSnapshot};
use plinth_core::{Reference, ResourceDescriptor};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Compute the change plan for a graph against a state snapshot
pub fn diff(
    graph: &ResourceGraph,
    snapshot: &StateSnapshot,
    schemas: &SchemaSet,
) -> Result<ChangePlan, ConfigurationError> {
    let mut planned: HashMap<&str, PlannedChange> = HashMap::new();
    let mut changes = Vec::with_capacity(graph.len());

    for descriptor in graph.topological_order() {
        let schema = schemas.get(&descriptor.resource_type).ok_or_else(|| {
            ConfigurationError::UnknownResourceType {
                name: descriptor.name.clone(),
                resource_type: descriptor.resource_type.clone(),
                provider: schemas.provider().to_string(),
            }
        })?;
        let change_for =
            |action| PlannedChange::new(&descriptor.name, &descriptor.resource_type, action);

        let change = match snapshot.get(&descriptor.name) {
            None => change_for(ChangeAction::Create).with_reason("not in state"),
            Some(record) if record.resource_type != descriptor.resource_type => {
                change_for(ChangeAction::Replace)
                    .with_reason(format!(
                        "type changed from {} to {}",
                        record.resource_type, descriptor.resource_type
                    ))
                    .with_replace_order(schema.replace_order())
            }
            Some(record) => {
                let changed = changed_properties(descriptor, record, snapshot, &planned);
                let forcing: Vec<&str> = changed
                    .iter()
                    .map(String::as_str)
                    .filter(|p| schema.requires_replacement(p))
                    .collect();

                if changed.is_empty() {
                    change_for(ChangeAction::NoOp)
                } else if forcing.is_empty() {
                    change_for(ChangeAction::Update)
                        .with_reason(format!("changed: {}", changed.join(", ")))
                        .with_changed(changed)
                } else {
                    change_for(ChangeAction::Replace)
                        .with_reason(format!("replacement forced by: {}", forcing.join(", ")))
                        .with_replace_order(schema.replace_order())
                        .with_changed(changed)
                }
            }
        };

        planned.insert(descriptor.name.as_str(), change.clone());
        changes.push(change);
    }

    // the old instance of a resource that live dependents still use is kept
    // until the delete phase, where dependents' old instances go first
    for change in &mut changes {
        if change.replace_order != Some(ReplaceOrder::DeleteBeforeCreate) {
            continue;
        }
        let users: Vec<&str> = graph
            .dependents_of(&change.name)
            .into_iter()
            .filter(|d| planned.get(d).is_some_and(|c| c.action != ChangeAction::Create))
            .collect();
        if !users.is_empty() {
            change.replace_order = Some(ReplaceOrder::CreateBeforeDelete);
            let reason = change.reason.take().unwrap_or_default();
            change.reason = Some(format!("{reason}; old instance used by {}", users.join(", ")));
        }
    }

    changes.extend(delete_order(graph, snapshot).into_iter().map(|record| {
        PlannedChange::new(&record.name, &record.resource_type, ChangeAction::Delete)
            .with_reason("no longer declared")
    }));

    let deposed = snapshot
        .deposed
        .iter()
        .map(|d| DeposedCleanup {
            name: d.name.clone(),
            resource_type: d.resource_type.clone(),
            provider_id: d.provider_id.clone(),
        })
        .collect();

    Ok(ChangePlan { changes, deposed })
}

/// Properties that differ from the record, are unknown until apply, or were removed
fn changed_properties(
    descriptor: &ResourceDescriptor,
    record: &StateRecord,
    snapshot: &StateSnapshot,
    planned: &HashMap<&str, PlannedChange>,
) -> Vec<String> {
    let mut lookup = |reference: &Reference| -> Option<Value> {
        if planned
            .get(reference.resource.as_str())
            .is_some_and(|c| c.leaves_unknown(&reference.attribute))
        {
            return None;
        }
        snapshot
            .get(&reference.resource)
            .and_then(|r| reference.select(&r.outputs))
            .cloned()
    };

    let mut changed = Vec::new();
    for (key, value) in &descriptor.properties {
        match value.resolve(&mut lookup) {
            Some(desired) if record.properties.get(key) == Some(&desired) => {}
            _ => changed.push(key.clone()),
        }
    }
    for key in record.properties.keys() {
        if !descriptor.properties.contains_key(key) {
            changed.push(key.clone());
        }
    }
    changed.sort();
    changed
}

/// Records no longer declared, each after every record that depended on it
fn delete_order<'a>(graph: &ResourceGraph, snapshot: &'a StateSnapshot) -> Vec<&'a StateRecord> {
    let doomed: BTreeMap<&str, &StateRecord> = snapshot
        .resources
        .iter()
        .filter(|(name, _)| !graph.contains(name))
        .map(|(name, record)| (name.as_str(), record))
        .collect();

    // remaining doomed records that depend on each doomed record
    let mut users: BTreeMap<&str, usize> = doomed.keys().map(|name| (*name, 0)).collect();
    for record in doomed.values() {
        for dependency in record.dependencies.iter().filter(|d| **d != record.name) {
            if let Some(count) = users.get_mut(dependency.as_str()) {
                *count += 1;
            }
        }
    }

    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut order = Vec::with_capacity(doomed.len());
    while done.len() < doomed.len() {
        let mut left = users.iter().filter(|(name, _)| !done.contains(*name));
        // a cycle in recorded dependencies falls back to name order
        let next = left
            .clone()
            .find(|(_, count)| **count == 0)
            .or_else(|| left.next())
            .map(|(name, _)| *name);
        let Some(next) = next else { break };

        done.insert(next);
        let record = doomed[next];
        order.push(record);
        for dependency in record.dependencies.iter().filter(|d| **d != record.name) {
            if let Some(count) = users.get_mut(dependency.as_str()) {
                *count = count.saturating_sub(1);
            }
        }
    }
    order
}
