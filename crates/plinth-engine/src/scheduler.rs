//! Scheduler: executes a change plan against a provider
//!
//! Every resource runs as its own task. A task waits on the completion
//! signals of its dependencies, takes a worker permit, calls the provider
//! and commits the result to state before signalling its own completion.
//!
//! The run has two phases. The forward phase creates, updates and replaces
//! declared resources. The delete phase removes undeclared resources and the
//! old instances of create-before-delete replacements, dependents first.

use crate::action::{ChangeAction, ChangePlan, PlannedChange, ReplaceOrder};
use crate::cancel::CancelToken;
use crate::error::{EngineError, ProviderError};
use crate::graph::ResourceGraph;
use crate::provider::{ResolvedProperties, ResourceProvider};
use crate::retry::{RetryConfig, RetryDecision, RetryState};
use crate::state::{DeposedInstance, StateRecord, StateSnapshot, StateStore};
use chrono::Utc;
use plinth_core::{Reference, ResourceDescriptor, Settings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// Execution settings of a run
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOptions {
    /// Maximum number of provider calls in flight
    pub jobs: usize,

    pub retry: RetryConfig,

    /// Timeout for a single provider call
    pub action_timeout: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            retry: RetryConfig::default(),
            action_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&Settings> for ExecuteOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            jobs: settings.jobs.max(1),
            retry: RetryConfig {
                max_attempts: settings.max_attempts.max(1),
                initial_delay: Duration::from_millis(settings.initial_backoff_ms),
                max_delay: Duration::from_millis(settings.max_backoff_ms),
                backoff_multiplier: settings.backoff_multiplier,
            },
            action_timeout: Duration::from_secs(settings.action_timeout_secs),
        }
    }
}

/// Lifecycle of one node: `Pending -> Running -> Succeeded | Failed`, or
/// `Pending -> Skipped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Pending => write!(f, "pending"),
            NodeStatus::Running => write!(f, "running"),
            NodeStatus::Succeeded => write!(f, "succeeded"),
            NodeStatus::Failed => write!(f, "failed"),
            NodeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub name: String,

    pub action: ChangeAction,

    /// Provider id of the old instance, for deposed cleanups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposed: Option<String>,

    pub status: NodeStatus,

    /// Provider calls made, retries included
    pub attempts: u32,

    /// Failure message, or the reason a node was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeOutcome {
    fn new(name: &str, action: ChangeAction) -> Self {
        Self {
            name: name.to_string(),
            action,
            deposed: None,
            status: NodeStatus::Pending,
            attempts: 0,
            error: None,
        }
    }

    fn succeeded(mut self) -> Self {
        self.status = NodeStatus::Succeeded;
        self
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = NodeStatus::Failed;
        self.error = Some(error.into());
        self
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = NodeStatus::Skipped;
        self.error = Some(reason.into());
        self
    }
}

/// Result of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Forward nodes in dependency order, then deletes
    pub outcomes: Vec<NodeOutcome>,

    /// Nodes that called the provider and succeeded
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub no_op: usize,
}

impl RunReport {
    pub fn from_outcomes(outcomes: Vec<NodeOutcome>) -> Self {
        let tally = |status: NodeStatus| outcomes.iter().filter(|o| o.status == status).count();
        let no_op = outcomes
            .iter()
            .filter(|o| o.action == ChangeAction::NoOp && o.status == NodeStatus::Succeeded)
            .count();
        let succeeded = tally(NodeStatus::Succeeded) - no_op;
        let failed = tally(NodeStatus::Failed);
        let skipped = tally(NodeStatus::Skipped);
        Self {
            outcomes,
            succeeded,
            failed,
            skipped,
            no_op,
        }
    }

    /// Every node succeeded or had nothing to do
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Outcome of a resource's own node (not of its deposed instances)
    pub fn get(&self, name: &str) -> Option<&NodeOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.name == name && o.deposed.is_none())
    }

    pub fn status_of(&self, name: &str) -> Option<NodeStatus> {
        self.get(name).map(|o| o.status)
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == NodeStatus::Failed)
    }
}

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("state commit failed: {0}")]
    State(#[from] EngineError),

    #[error("unresolved reference '{0}'")]
    Unresolved(String),

    #[error("resource is not in state")]
    NotInState,
}

/// Executes change plans
pub struct Scheduler {
    provider: Arc<dyn ResourceProvider>,
    store: StateStore,
    options: ExecuteOptions,
    cancel: CancelToken,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        store: StateStore,
        options: ExecuteOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            provider,
            store,
            options,
            cancel,
        }
    }

    /// Run both phases of a plan to completion
    pub async fn run(&self, graph: &ResourceGraph, plan: &ChangePlan) -> RunReport {
        let worker = Arc::new(Worker {
            provider: Arc::clone(&self.provider),
            store: self.store.clone(),
            options: self.options.clone(),
            cancel: self.cancel.clone(),
            permits: Arc::new(Semaphore::new(self.options.jobs.max(1))),
        });

        let mut outcomes = Arc::clone(&worker).forward_phase(graph, plan).await;
        let forward: HashMap<String, NodeStatus> = outcomes
            .iter()
            .map(|o| (o.name.clone(), o.status))
            .collect();
        outcomes.extend(worker.delete_phase(graph, &forward).await);

        let report = RunReport::from_outcomes(outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            unchanged = report.no_op,
            "Run finished"
        );
        report
    }
}

type Signal = watch::Receiver<NodeStatus>;

struct Worker {
    provider: Arc<dyn ResourceProvider>,
    store: StateStore,
    options: ExecuteOptions,
    cancel: CancelToken,
    permits: Arc<Semaphore>,
}

/// Deletion of one provider instance
#[derive(Debug, Clone)]
struct DeleteOp {
    name: String,
    resource_type: String,
    provider_id: String,
    dependencies: BTreeSet<String>,
    deposed: bool,
}

impl DeleteOp {
    fn current(record: &StateRecord) -> Self {
        Self {
            name: record.name.clone(),
            resource_type: record.resource_type.clone(),
            provider_id: record.provider_id.clone(),
            dependencies: record.dependencies.clone(),
            deposed: false,
        }
    }

    fn deposed(instance: &DeposedInstance) -> Self {
        Self {
            name: instance.name.clone(),
            resource_type: instance.resource_type.clone(),
            provider_id: instance.provider_id.clone(),
            dependencies: instance.dependencies.clone(),
            deposed: true,
        }
    }

    /// Whether this op's instance used the other op's resource
    fn uses(&self, other: &DeleteOp) -> bool {
        self.name != other.name && self.dependencies.contains(&other.name)
    }
}

impl Worker {
    async fn forward_phase(
        self: Arc<Self>,
        graph: &ResourceGraph,
        plan: &ChangePlan,
    ) -> Vec<NodeOutcome> {
        let mut signals: HashMap<&str, Signal> = HashMap::new();
        let mut handles = Vec::with_capacity(graph.len());

        for descriptor in graph.topological_order() {
            let (done, signal) = watch::channel(NodeStatus::Pending);
            let dependencies: Vec<(String, Signal)> = graph
                .dependencies_of(&descriptor.name)
                .into_iter()
                .filter_map(|dep| signals.get(dep).map(|rx| (dep.to_string(), rx.clone())))
                .collect();
            signals.insert(descriptor.name.as_str(), signal);

            let change = plan.get(&descriptor.name).cloned().unwrap_or_else(|| {
                PlannedChange::new(&descriptor.name, &descriptor.resource_type, ChangeAction::NoOp)
            });
            let action = change.action;
            let worker = Arc::clone(&self);
            let descriptor = descriptor.clone();
            let name = descriptor.name.clone();
            let handle = tokio::spawn(async move {
                let outcome = worker
                    .drive_forward(&descriptor, &change, dependencies, &done)
                    .await;
                // the record is committed by now; dependents may read it
                done.send_replace(outcome.status);
                outcome
            });
            handles.push((name, action, handle));
        }

        join_all(handles).await
    }

    async fn drive_forward(
        &self,
        descriptor: &ResourceDescriptor,
        change: &PlannedChange,
        dependencies: Vec<(String, Signal)>,
        done: &watch::Sender<NodeStatus>,
    ) -> NodeOutcome {
        let name = descriptor.name.as_str();
        let mut outcome = NodeOutcome::new(name, change.action);

        for (dependency, mut signal) in dependencies {
            let status = wait_terminal(&mut signal).await;
            if status != NodeStatus::Succeeded {
                info!(resource = name, dependency = %dependency, "Skipping");
                return outcome.skipped(format!("dependency '{dependency}' {status}"));
            }
        }

        if matches!(change.action, ChangeAction::NoOp | ChangeAction::Delete) {
            return outcome.succeeded();
        }

        let Some(permit) = self.acquire().await else {
            return outcome.skipped("cancelled");
        };
        let mut permit = Some(permit);
        done.send_replace(NodeStatus::Running);
        info!(resource = name, action = %change.action, "Applying");

        let result = match self.resolve_properties(descriptor).await {
            Ok(properties) => {
                let attempts = &mut outcome.attempts;
                match (change.action, change.replace_order) {
                    (ChangeAction::Update, _) => {
                        self.update(descriptor, &properties, &mut permit, attempts)
                            .await
                    }
                    (ChangeAction::Replace, Some(ReplaceOrder::CreateBeforeDelete)) => {
                        self.replace_create_first(descriptor, &properties, &mut permit, attempts)
                            .await
                    }
                    (ChangeAction::Replace, _) => {
                        self.replace_delete_first(descriptor, &properties, &mut permit, attempts)
                            .await
                    }
                    _ => {
                        self.create(descriptor, &properties, &mut permit, attempts)
                            .await
                    }
                }
            }
            Err(e) => Err(e),
        };
        drop(permit);

        match result {
            Ok(()) => {
                info!(resource = name, action = %change.action, attempts = outcome.attempts, "Applied");
                outcome.succeeded()
            }
            Err(e) => {
                warn!(resource = name, action = %change.action, error = %e, "Failed");
                outcome.failed(e.to_string())
            }
        }
    }

    /// Resolve references from the committed outputs of dependencies
    async fn resolve_properties(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ResolvedProperties, StepError> {
        let snapshot = self.store.snapshot_all().await;
        let mut resolved = ResolvedProperties::new();

        for (key, value) in &descriptor.properties {
            let mut unresolved = None;
            let mut lookup = |reference: &Reference| {
                let found = snapshot
                    .get(&reference.resource)
                    .and_then(|record| reference.select(&record.outputs))
                    .cloned();
                if found.is_none() && unresolved.is_none() {
                    unresolved = Some(reference.to_string());
                }
                found
            };
            match value.resolve(&mut lookup) {
                Some(value) => {
                    resolved.insert(key.clone(), value);
                }
                None => {
                    return Err(StepError::Unresolved(
                        unresolved.unwrap_or_else(|| format!("{}.{}", descriptor.name, key)),
                    ));
                }
            }
        }
        Ok(resolved)
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        properties: &ResolvedProperties,
        permit: &mut Option<OwnedSemaphorePermit>,
        attempts: &mut u32,
    ) -> Result<(), StepError> {
        let provider = &self.provider;
        let (resource_type, name) = (descriptor.resource_type.as_str(), descriptor.name.as_str());
        let created = self
            .call(name, permit, attempts, move || {
                provider.create(resource_type, name, properties)
            })
            .await?;

        let record = StateRecord::new(name, resource_type, created.provider_id)
            .with_properties(properties.clone())
            .with_outputs(created.outputs)
            .with_dependencies(descriptor.dependency_names());
        self.store.commit(record).await?;
        Ok(())
    }

    async fn update(
        &self,
        descriptor: &ResourceDescriptor,
        properties: &ResolvedProperties,
        permit: &mut Option<OwnedSemaphorePermit>,
        attempts: &mut u32,
    ) -> Result<(), StepError> {
        let current = self
            .store
            .get(&descriptor.name)
            .await
            .ok_or(StepError::NotInState)?;

        let provider = &self.provider;
        let (resource_type, name) = (descriptor.resource_type.as_str(), descriptor.name.as_str());
        let provider_id = current.provider_id.as_str();
        let outputs = self
            .call(name, permit, attempts, move || {
                provider.update(resource_type, name, provider_id, properties)
            })
            .await?;

        let record = StateRecord {
            properties: properties.clone(),
            outputs,
            dependencies: descriptor
                .dependency_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            updated_at: Utc::now(),
            ..current
        };
        self.store.commit(record).await?;
        Ok(())
    }

    /// Create the new instance and depose the old one in a single commit
    async fn replace_create_first(
        &self,
        descriptor: &ResourceDescriptor,
        properties: &ResolvedProperties,
        permit: &mut Option<OwnedSemaphorePermit>,
        attempts: &mut u32,
    ) -> Result<(), StepError> {
        let Some(current) = self.store.get(&descriptor.name).await else {
            return self.create(descriptor, properties, permit, attempts).await;
        };

        let provider = &self.provider;
        let (resource_type, name) = (descriptor.resource_type.as_str(), descriptor.name.as_str());
        let created = self
            .call(name, permit, attempts, move || {
                provider.create(resource_type, name, properties)
            })
            .await?;

        let record = StateRecord::new(name, resource_type, created.provider_id)
            .with_properties(properties.clone())
            .with_outputs(created.outputs)
            .with_dependencies(descriptor.dependency_names());
        let mut tx = self.store.begin_transaction();
        tx.depose(DeposedInstance::from_record(&current)).put(record);
        tx.commit().await?;
        Ok(())
    }

    async fn replace_delete_first(
        &self,
        descriptor: &ResourceDescriptor,
        properties: &ResolvedProperties,
        permit: &mut Option<OwnedSemaphorePermit>,
        attempts: &mut u32,
    ) -> Result<(), StepError> {
        if let Some(current) = self.store.get(&descriptor.name).await {
            let provider = &self.provider;
            let name = descriptor.name.as_str();
            let (resource_type, provider_id) =
                (current.resource_type.as_str(), current.provider_id.as_str());
            self.call(name, permit, attempts, move || {
                provider.delete(resource_type, name, provider_id)
            })
            .await?;
            self.store.remove(name).await?;
        }
        self.create(descriptor, properties, permit, attempts).await
    }

    async fn delete_phase(
        self: Arc<Self>,
        graph: &ResourceGraph,
        forward: &HashMap<String, NodeStatus>,
    ) -> Vec<NodeOutcome> {
        let snapshot = self.store.snapshot_all().await;
        let ops: Vec<DeleteOp> = snapshot
            .resources
            .values()
            .filter(|record| !graph.contains(&record.name))
            .map(DeleteOp::current)
            .chain(snapshot.deposed.iter().map(DeleteOp::deposed))
            .collect();
        let ops = order_deletes(ops);

        let mut signals: Vec<Signal> = Vec::with_capacity(ops.len());
        let mut handles = Vec::with_capacity(ops.len());
        for (i, op) in ops.iter().enumerate() {
            let (done, signal) = watch::channel(NodeStatus::Pending);
            // ops are ordered users first, so only earlier ops are awaited
            let users: Vec<(String, Signal)> = ops[..i]
                .iter()
                .zip(&signals)
                .filter(|(user, _)| user.uses(op))
                .map(|(user, rx)| (user.name.clone(), rx.clone()))
                .collect();
            signals.push(signal);

            let hold = if op.deposed && graph.contains(&op.name) {
                held_by(graph, forward, &op.name)
            } else if op.deposed {
                None
            } else {
                still_used_by(graph, &snapshot, forward, &op.name)
            };

            let worker = Arc::clone(&self);
            let op = op.clone();
            let name = op.name.clone();
            let handle = tokio::spawn(async move {
                let outcome = worker.drive_delete(&op, users, hold).await;
                done.send_replace(outcome.status);
                outcome
            });
            handles.push((name, ChangeAction::Delete, handle));
        }

        join_all(handles).await
    }

    async fn drive_delete(
        &self,
        op: &DeleteOp,
        users: Vec<(String, Signal)>,
        hold: Option<String>,
    ) -> NodeOutcome {
        let mut outcome = NodeOutcome::new(&op.name, ChangeAction::Delete);
        if op.deposed {
            outcome.deposed = Some(op.provider_id.clone());
        }

        if let Some(reason) = hold {
            info!(resource = %op.name, provider_id = %op.provider_id, "Keeping deposed instance");
            return outcome.skipped(reason);
        }
        for (user, mut signal) in users {
            let status = wait_terminal(&mut signal).await;
            if status != NodeStatus::Succeeded {
                return outcome.skipped(format!("'{user}' still uses it ({status})"));
            }
        }

        let Some(permit) = self.acquire().await else {
            return outcome.skipped("cancelled");
        };
        let mut permit = Some(permit);
        info!(resource = %op.name, provider_id = %op.provider_id, deposed = op.deposed, "Deleting");

        let provider = &self.provider;
        let (resource_type, name, provider_id) = (
            op.resource_type.as_str(),
            op.name.as_str(),
            op.provider_id.as_str(),
        );
        let result = self
            .call(name, &mut permit, &mut outcome.attempts, move || {
                provider.delete(resource_type, name, provider_id)
            })
            .await
            .map_err(StepError::from);
        drop(permit);

        let result = match result {
            Ok(()) if op.deposed => {
                let mut tx = self.store.begin_transaction();
                tx.forget_deposed(name, provider_id);
                tx.commit().await.map_err(StepError::from)
            }
            Ok(()) => self.store.remove(name).await.map_err(StepError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(resource = name, attempts = outcome.attempts, "Deleted");
                outcome.succeeded()
            }
            Err(e) => {
                warn!(resource = name, error = %e, "Delete failed");
                outcome.failed(e.to_string())
            }
        }
    }

    /// Take a worker permit unless the run is cancelled
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(permit)
    }

    /// Run a provider call with timeout and retries
    ///
    /// The permit is given back while waiting out a backoff.
    async fn call<T, F, Fut>(
        &self,
        name: &str,
        permit: &mut Option<OwnedSemaphorePermit>,
        attempts: &mut u32,
        mut operation: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = RetryState::new();
        loop {
            if permit.is_none() {
                *permit = Some(self.acquire().await.ok_or_else(|| {
                    ProviderError::permanent("cancelled while waiting to retry")
                })?);
            }

            retry.begin_attempt();
            *attempts += 1;
            let error = match tokio::time::timeout(self.options.action_timeout, operation()).await
            {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => ProviderError::retryable(format!(
                    "timed out after {:?}",
                    self.options.action_timeout
                )),
            };

            match retry.on_failure(&self.options.retry, &error, Instant::now()) {
                RetryDecision::RetryAt(at) => {
                    warn!(
                        resource = name,
                        attempt = retry.attempt,
                        error = %error,
                        "Provider call failed, retrying"
                    );
                    permit.take();
                    tokio::time::sleep_until(at).await;
                }
                RetryDecision::GiveUp => return Err(error),
            }
        }
    }
}

/// First forward node blocking the cleanup of a deposed instance
fn held_by(
    graph: &ResourceGraph,
    forward: &HashMap<String, NodeStatus>,
    name: &str,
) -> Option<String> {
    std::iter::once(name)
        .chain(graph.transitive_dependents_of(name))
        .find_map(|node| match forward.get(node) {
            Some(NodeStatus::Succeeded) => None,
            Some(status) => Some(format!("'{node}' {status}; old instance kept")),
            None => Some(format!("'{node}' did not run; old instance kept")),
        })
}

/// First declared resource whose recorded dependencies still name an
/// undeclared one
///
/// A declared resource that succeeded this run has dropped the reference
/// from its record; any other still points at the resource.
fn still_used_by(
    graph: &ResourceGraph,
    snapshot: &StateSnapshot,
    forward: &HashMap<String, NodeStatus>,
    name: &str,
) -> Option<String> {
    snapshot
        .resources
        .values()
        .filter(|record| record.name != name && graph.contains(&record.name))
        .filter(|record| record.dependencies.contains(name))
        .find_map(|record| match forward.get(&record.name) {
            Some(NodeStatus::Succeeded) => None,
            Some(status) => Some(format!("'{}' still uses it ({status})", record.name)),
            None => Some(format!("'{}' still uses it", record.name)),
        })
}

/// Order delete ops so that every op comes after the ops whose instances used it
fn order_deletes(ops: Vec<DeleteOp>) -> Vec<DeleteOp> {
    let mut users: Vec<usize> = ops
        .iter()
        .map(|op| ops.iter().filter(|other| other.uses(op)).count())
        .collect();
    let mut done = vec![false; ops.len()];
    let mut order = Vec::with_capacity(ops.len());

    while order.len() < ops.len() {
        // a cycle in recorded dependencies falls back to list order
        let next = (0..ops.len())
            .find(|&i| !done[i] && users[i] == 0)
            .or_else(|| (0..ops.len()).find(|&i| !done[i]));
        let Some(next) = next else {
            break;
        };

        done[next] = true;
        order.push(next);
        for (i, op) in ops.iter().enumerate() {
            if !done[i] && ops[next].uses(op) {
                users[i] = users[i].saturating_sub(1);
            }
        }
    }

    let mut slots: Vec<Option<DeleteOp>> = ops.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

async fn wait_terminal(signal: &mut Signal) -> NodeStatus {
    match signal.wait_for(|status| status.is_terminal()).await {
        Ok(status) => *status,
        Err(_) => NodeStatus::Failed,
    }
}

async fn join_all(handles: Vec<(String, ChangeAction, JoinHandle<NodeOutcome>)>) -> Vec<NodeOutcome> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, action, handle) in handles {
        outcomes.push(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => NodeOutcome::new(&name, action).failed(format!("task failed: {e}")),
        });
    }
    outcomes
}
