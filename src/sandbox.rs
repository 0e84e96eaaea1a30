//! The sandbox facade: script text + optional dataset in, artifact or
//! classified failure out.

use crate::artifact::{self, Artifact};
use crate::capability::CapabilityRegistry;
use crate::config::{RenderPolicy, ResourceBudget, SandboxConfig};
use crate::dataset::Table;
use crate::environment::Environment;
use crate::errors::{Result, SandboxError};
use crate::executor;
use crate::validator;
use crate::workspace::InvocationWorkspace;
use std::path::PathBuf;
use tracing::info;

pub struct SandboxBuilder {
    python_path: Option<PathBuf>,
    workspace_base: Option<PathBuf>,
    keep_workspaces: bool,
    budget: ResourceBudget,
    render: RenderPolicy,
}

impl SandboxBuilder {
    pub fn new() -> Self {
        Self {
            python_path: None,
            workspace_base: None,
            keep_workspaces: false,
            budget: ResourceBudget::default(),
            render: RenderPolicy::default(),
        }
    }

    /// Use an explicit interpreter instead of discovering one in PATH.
    pub fn python_path(mut self, path: PathBuf) -> Self {
        self.python_path = Some(path);
        self
    }

    pub fn workspace_base(mut self, base: PathBuf) -> Self {
        self.workspace_base = Some(base);
        self
    }

    pub fn keep_workspaces(mut self, keep: bool) -> Self {
        self.keep_workspaces = keep;
        self
    }

    pub fn budget(mut self, budget: ResourceBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn render(mut self, render: RenderPolicy) -> Self {
        self.render = render;
        self
    }

    pub fn build(self) -> Result<Sandbox> {
        let python_path = match self.python_path {
            Some(path) => path,
            None => which::which("python3")
                .or_else(|_| which::which("python"))
                .map_err(|_| SandboxError::PythonNotFound)?,
        };
        let mut config = SandboxConfig::with_python(python_path);
        if let Some(base) = self.workspace_base {
            config.workspace_base = base;
        }
        config.keep_workspaces = self.keep_workspaces;
        config.budget = self.budget;
        config.render = self.render;
        std::fs::create_dir_all(&config.workspace_base)?;
        Ok(Sandbox {
            config,
            registry: CapabilityRegistry::standard(),
        })
    }
}

impl Default for SandboxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes validation, environment construction, budgeted execution and
/// artifact capture into a single call. The capability registry is fixed at
/// construction and immutable for the life of the sandbox.
pub struct Sandbox {
    config: SandboxConfig,
    registry: CapabilityRegistry,
}

impl Sandbox {
    /// Sandbox with a PATH-discovered interpreter and default budgets.
    pub fn new() -> Result<Self> {
        SandboxBuilder::new().build()
    }

    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::new()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Run one script to completion. Stages run strictly in order and the
    /// first failure wins; a script that fails validation is never executed.
    pub async fn render(&self, script: &str, dataset: Option<&Table>) -> Result<Artifact> {
        let invocation = uuid::Uuid::new_v4();
        info!(
            "[SANDBOX] invocation {}: script {} bytes, dataset: {}",
            invocation,
            script.len(),
            dataset.is_some()
        );
        let outcome = self.run_stages(script, dataset).await;
        match &outcome {
            Ok(artifact) => info!(
                "[SANDBOX] invocation {}: artifact {} bytes",
                invocation,
                artifact.len()
            ),
            Err(err) => info!(
                "[SANDBOX] invocation {}: {:?}: {}",
                invocation,
                err.kind(),
                err
            ),
        }
        outcome
    }

    async fn run_stages(&self, script: &str, dataset: Option<&Table>) -> Result<Artifact> {
        validator::validate(script, &self.registry)?;
        let env = Environment::build(&self.registry, dataset, &self.config.render)?;
        let mut workspace = InvocationWorkspace::new(&self.config.workspace_base)?;
        if self.config.keep_workspaces {
            workspace.keep();
        }
        let argv = workspace.materialize(&env, script)?;
        let report = executor::execute(
            &self.config.python_path,
            &workspace,
            &argv,
            &self.config.budget,
        )
        .await?;
        artifact::capture(report, &self.config.render)
    }
}
