//! Planned changes for resources

use serde::{Deserialize, Serialize};

/// What the engine will do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and recreate the resource
    Replace,
    /// Delete a resource that is no longer declared
    Delete,
    /// No changes needed
    NoOp,
}

impl ChangeAction {
    /// Whether references into this resource stay unknown until apply
    pub fn makes_outputs_unknown(self) -> bool {
        matches!(self, Self::Create | Self::Replace)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Replace => write!(f, "replace"),
            ChangeAction::Delete => write!(f, "delete"),
            ChangeAction::NoOp => write!(f, "no-op"),
        }
    }
}

/// Order of the two halves of a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceOrder {
    /// New instance first; the old one is deleted in the cleanup phase
    CreateBeforeDelete,
    /// Old instance first, in place
    DeleteBeforeCreate,
}

impl std::fmt::Display for ReplaceOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplaceOrder::CreateBeforeDelete => write!(f, "create before delete"),
            ReplaceOrder::DeleteBeforeCreate => write!(f, "delete before create"),
        }
    }
}

/// Planned change for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Logical resource name
    pub name: String,

    /// Resource type (the recorded type for deletes)
    pub resource_type: String,

    pub action: ChangeAction,

    /// Human readable reason for the action
    pub reason: Option<String>,

    /// Properties that differ from the last applied state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,

    /// Set for replacements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_order: Option<ReplaceOrder>,
}

impl PlannedChange {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            action,
            reason: None,
            changed: Vec::new(),
            replace_order: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_changed(mut self, changed: Vec<String>) -> Self {
        self.changed = changed;
        self
    }

    pub fn with_replace_order(mut self, order: ReplaceOrder) -> Self {
        self.replace_order = Some(order);
        self
    }

    /// Whether a reference to `attribute` of this resource has no known
    /// value until the change is applied
    ///
    /// An update only invalidates attributes rooted at a changed property.
    pub fn leaves_unknown(&self, attribute: &str) -> bool {
        if self.action.makes_outputs_unknown() {
            return true;
        }
        let root = attribute.split('.').next().unwrap_or(attribute);
        self.action == ChangeAction::Update && self.changed.iter().any(|p| p == root)
    }
}

/// Old instance left over from a create-before-delete replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeposedCleanup {
    pub name: String,
    pub resource_type: String,
    pub provider_id: String,
}

/// Plan containing every change of a run
///
/// Forward changes come first in dependency order, then deletes in reverse
/// dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePlan {
    pub changes: Vec<PlannedChange>,

    /// Deposed instances left by earlier runs
    #[serde(default)]
    pub deposed: Vec<DeposedCleanup>,
}

impl ChangePlan {
    pub fn new(changes: Vec<PlannedChange>) -> Self {
        Self {
            changes,
            deposed: Vec::new(),
        }
    }

    /// Whether running the plan would call the provider
    pub fn has_changes(&self) -> bool {
        !self.deposed.is_empty() || self.changes.iter().any(|c| c.action != ChangeAction::NoOp)
    }

    pub fn get(&self, name: &str) -> Option<&PlannedChange> {
        self.changes
            .iter()
            .find(|c| c.name == name && c.action != ChangeAction::Delete)
            .or_else(|| self.changes.iter().find(|c| c.name == name))
    }

    /// Get changes by action
    pub fn changes_by_action(&self, action: ChangeAction) -> Vec<&PlannedChange> {
        self.changes.iter().filter(|c| c.action == action).collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.changes_by_action(ChangeAction::Create).len(),
            update: self.changes_by_action(ChangeAction::Update).len(),
            replace: self.changes_by_action(ChangeAction::Replace).len(),
            delete: self.changes_by_action(ChangeAction::Delete).len() + self.deposed.len(),
            no_change: self.changes_by_action(ChangeAction::NoOp).len(),
        }
    }
}

/// Summary of planned changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
