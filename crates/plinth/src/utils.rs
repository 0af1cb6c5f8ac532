use anyhow::Context;
use colored::Colorize;
use plinth_core::{Project, VariableOverrides};
use plinth_engine::{CancelToken, Engine, ExecuteOptions, StateManager};
use plinth_provider_sim::SimProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Exit code of a run where some resources failed or were skipped
pub const EXIT_PARTIAL: i32 = 2;

/// Loaded project plus where it lives
pub struct Workspace {
    pub file: PathBuf,
    pub root: PathBuf,
    pub project: Project,
}

impl Workspace {
    /// Find the project file, then load it with variable overrides
    pub fn load(file: Option<&Path>, vars: &[(String, String)]) -> anyhow::Result<Self> {
        let file = plinth_config::find_project_file(file)?;
        let root = plinth_config::project_root(&file);
        let overrides: VariableOverrides = vars.iter().cloned().collect();

        let project = plinth_core::load_project(&file, &overrides)
            .with_context(|| format!("failed to load {}", file.display()))?;
        tracing::debug!(file = %file.display(), resources = project.resources.len(), "Loaded project");

        Ok(Self {
            file,
            root,
            project,
        })
    }

    pub fn state_manager(&self) -> StateManager {
        StateManager::new(self.root.join(&self.project.settings.state_dir))
    }

    /// Engine backed by the simulated provider
    pub fn engine(&self, jobs: Option<usize>) -> Engine {
        let mut options = ExecuteOptions::from(&self.project.settings);
        if let Some(jobs) = jobs {
            options.jobs = jobs.max(1);
        }
        Engine::new(Arc::new(SimProvider::from_env()), options)
    }
}

/// Parse a `NAME=VALUE` argument
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

/// Cancellation token set by Ctrl-C
///
/// Resources not yet started are skipped; calls in flight finish and are
/// recorded.
pub fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupted; waiting for running operations to finish...".yellow()
            );
            token.cancel();
        }
    });
    cancel
}
