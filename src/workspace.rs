//! Per-invocation scratch directory.
//!
//! Each run materializes its bootstrap, script and optional dataset into a
//! uuid-named directory under the configured base, and the directory is
//! removed when the invocation is dropped. Nothing from one invocation is
//! ever visible to another.

use crate::environment::Environment;
use crate::errors::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BOOTSTRAP_FILE: &str = "bootstrap.py";
const SCRIPT_FILE: &str = "script.py";
const DATASET_FILE: &str = "dataset.json";

pub struct InvocationWorkspace {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl InvocationWorkspace {
    pub fn new(base: &Path) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let path = base.join(id);
        std::fs::create_dir_all(&path)?;
        info!("[SANDBOX] created workspace: {:?}", path);
        Ok(Self {
            path,
            cleanup_on_drop: true,
        })
    }

    /// Write the environment and script into the workspace. Returns the
    /// argv tail for the interpreter: bootstrap, script, optional dataset.
    pub fn materialize(&self, env: &Environment, script: &str) -> Result<Vec<PathBuf>> {
        let bootstrap = self.path.join(BOOTSTRAP_FILE);
        std::fs::write(&bootstrap, env.bootstrap())?;

        let script_path = self.path.join(SCRIPT_FILE);
        std::fs::write(&script_path, script)?;

        let mut argv = vec![bootstrap, script_path];
        if let Some(dataset) = env.dataset_json() {
            let dataset_path = self.path.join(DATASET_FILE);
            std::fs::write(&dataset_path, dataset)?;
            argv.push(dataset_path);
        }
        Ok(argv)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the workspace on disk after the run (debugging aid).
    pub fn keep(&mut self) {
        self.cleanup_on_drop = false;
    }
}

impl Drop for InvocationWorkspace {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            if let Err(err) = std::fs::remove_dir_all(&self.path) {
                warn!("[SANDBOX] failed to clean up workspace {:?}: {}", self.path, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::config::RenderPolicy;
    use crate::dataset::Table;
    use serde_json::json;

    fn env(dataset: Option<&Table>) -> Environment {
        Environment::build(
            &CapabilityRegistry::standard(),
            dataset,
            &RenderPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn materializes_bootstrap_and_script() {
        let base = tempfile::tempdir().unwrap();
        let workspace = InvocationWorkspace::new(base.path()).unwrap();
        let argv = workspace.materialize(&env(None), "plt.plot([1, 2])").unwrap();
        assert_eq!(argv.len(), 2);
        assert!(argv[0].ends_with(BOOTSTRAP_FILE));
        assert!(argv[1].ends_with(SCRIPT_FILE));
        let script = std::fs::read_to_string(&argv[1]).unwrap();
        assert_eq!(script, "plt.plot([1, 2])");
    }

    #[test]
    fn dataset_file_appears_only_when_supplied() {
        let base = tempfile::tempdir().unwrap();
        let workspace = InvocationWorkspace::new(base.path()).unwrap();
        let table = Table::new(vec!["x".into()], vec![vec![json!(1)]]).unwrap();
        let argv = workspace.materialize(&env(Some(&table)), "pass").unwrap();
        assert_eq!(argv.len(), 3);
        assert!(argv[2].ends_with(DATASET_FILE));
    }

    #[test]
    fn workspace_is_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let workspace = InvocationWorkspace::new(base.path()).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn kept_workspace_survives_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let mut workspace = InvocationWorkspace::new(base.path()).unwrap();
            workspace.keep();
            workspace.path().to_path_buf()
        };
        assert!(path.exists());
    }

    #[test]
    fn two_workspaces_never_collide() {
        let base = tempfile::tempdir().unwrap();
        let a = InvocationWorkspace::new(base.path()).unwrap();
        let b = InvocationWorkspace::new(base.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
