//! Plinth engine
//!
//! Turns a set of resource descriptors into provider calls.
//!
//! ```text
//! Project ──► ResourceGraph ──► diff(graph, state) ──► ChangePlan
//!                                                          │
//!                     ┌────────────────────────────────────┘
//!                     ▼
//!               Scheduler ──► ResourceProvider (create / update / delete)
//!                     │
//!                     ▼
//!               StateStore (state.json, one commit per finished resource)
//! ```
//!
//! The graph is validated (references, cycles, provider schemas) before
//! anything touches state. The scheduler runs independent resources
//! concurrently, retries transient provider failures with backoff and
//! skips every resource whose dependency did not succeed.

pub mod action;
pub mod cancel;
pub mod diff;
pub mod engine;
pub mod error;
pub mod graph;
pub mod output;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod schema;
pub mod state;

// Re-exports
pub use action::{ChangeAction, ChangePlan, DeposedCleanup, PlanSummary, PlannedChange, ReplaceOrder};
pub use cancel::CancelToken;
pub use diff::diff;
pub use engine::{ApplyOutcome, Engine};
pub use error::{ConfigurationError, EngineError, MissingOutputError, ProviderError, Result};
pub use graph::ResourceGraph;
pub use output::{OutputSet, export_outputs};
pub use provider::{Created, Outputs, ProviderResult, ResolvedProperties, ResourceProvider};
pub use retry::{RetryConfig, RetryDecision, RetryState};
pub use scheduler::{ExecuteOptions, NodeOutcome, NodeStatus, RunReport, Scheduler};
pub use schema::{ResourceSchema, SchemaSet};
pub use state::{
    DeposedInstance, LockInfo, StateDocument, StateLock, StateManager, StateRecord, StateSnapshot,
    StateStore, Transaction,
};
