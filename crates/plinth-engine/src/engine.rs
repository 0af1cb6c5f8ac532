//! Engine facade: build, plan, apply and destroy

use crate::action::ChangePlan;
use crate::cancel::CancelToken;
use crate::diff::diff;
use crate::error::{ConfigurationError, Result};
use crate::graph::ResourceGraph;
use crate::output::{OutputSet, export_outputs};
use crate::provider::ResourceProvider;
use crate::scheduler::{ExecuteOptions, RunReport, Scheduler};
use crate::schema::SchemaSet;
use crate::state::{StateSnapshot, StateStore};
use plinth_core::Project;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of an apply or destroy run
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Plan the run executed
    pub plan: ChangePlan,
    pub report: RunReport,
    /// Exported outputs (empty after destroy)
    pub outputs: OutputSet,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Drives a provider from a project description
pub struct Engine {
    provider: Arc<dyn ResourceProvider>,
    options: ExecuteOptions,
}

impl Engine {
    pub fn new(provider: Arc<dyn ResourceProvider>, options: ExecuteOptions) -> Self {
        Self { provider, options }
    }

    /// Build and validate the resource graph of a project
    ///
    /// Checks references, cycles, output bindings and provider support for
    /// every resource type without touching state.
    pub fn build_graph(&self, project: &Project) -> Result<ResourceGraph> {
        let graph = ResourceGraph::build(project.resources.clone())?;

        if let Some(output) = project
            .outputs
            .iter()
            .find(|o| !graph.contains(&o.reference.resource))
        {
            return Err(ConfigurationError::UnknownOutputResource {
                output: output.name.clone(),
                resource: output.reference.resource.clone(),
            }
            .into());
        }

        SchemaSet::collect(&graph, self.provider.as_ref())?;
        Ok(graph)
    }

    /// Compute the change plan of a graph against a snapshot
    pub fn plan(&self, graph: &ResourceGraph, snapshot: &StateSnapshot) -> Result<ChangePlan> {
        let schemas = SchemaSet::collect(graph, self.provider.as_ref())?;
        Ok(diff(graph, snapshot, &schemas)?)
    }

    /// Bring the provider in line with the project
    #[instrument(skip_all, fields(project = %project.name))]
    pub async fn apply(
        &self,
        project: &Project,
        store: &StateStore,
        cancel: &CancelToken,
    ) -> Result<ApplyOutcome> {
        let graph = self.build_graph(project)?;
        let plan = self.plan(&graph, &store.snapshot_all().await)?;
        info!(summary = %plan.summary(), "Applying plan");

        let report = self.execute(&graph, &plan, store, cancel).await;
        let outputs = export_outputs(&project.outputs, &store.snapshot_all().await, Some(&report));
        Ok(ApplyOutcome {
            plan,
            report,
            outputs,
        })
    }

    /// Delete every resource recorded in state
    #[instrument(skip_all)]
    pub async fn destroy(&self, store: &StateStore, cancel: &CancelToken) -> Result<ApplyOutcome> {
        let graph = ResourceGraph::empty();
        let plan = self.plan(&graph, &store.snapshot_all().await)?;
        info!(summary = %plan.summary(), "Destroying");

        let report = self.execute(&graph, &plan, store, cancel).await;
        Ok(ApplyOutcome {
            plan,
            report,
            outputs: OutputSet::default(),
        })
    }

    /// Execute a previously computed plan
    pub async fn execute(
        &self,
        graph: &ResourceGraph,
        plan: &ChangePlan,
        store: &StateStore,
        cancel: &CancelToken,
    ) -> RunReport {
        Scheduler::new(
            Arc::clone(&self.provider),
            store.clone(),
            self.options.clone(),
            cancel.clone(),
        )
        .run(graph, plan)
        .await
    }
}
