use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Resource budget applied to one script execution.
///
/// The wall-clock timeout is enforced by the executor; the memory, CPU and
/// process ceilings become `setrlimit` calls in the child on Unix. The thread
/// cap is passed to the numeric libraries through their environment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Wall-clock timeout for the whole run
    pub timeout: Duration,
    /// Maximum address space in MB
    pub memory_mb: usize,
    /// Maximum CPU time in seconds
    pub cpu_seconds: u64,
    /// Maximum number of processes the invocation may hold
    pub max_processes: u64,
    /// Thread cap for BLAS/OpenMP backends
    pub max_threads: u32,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            memory_mb: 1024,
            cpu_seconds: 20,
            max_processes: 256,
            max_threads: 2,
        }
    }
}

/// Fixed output policy for captured charts. The format is always PNG; the
/// knobs cover resolution, framing and an upper bound on artifact size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPolicy {
    /// Raster resolution passed to the serializer
    pub dpi: u32,
    /// Trim surrounding whitespace when serializing the figure
    pub tight_bbox: bool,
    /// Reject artifacts larger than this many bytes
    pub max_artifact_bytes: usize,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            dpi: 100,
            tight_bbox: true,
            max_artifact_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Process-wide sandbox configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter to run scripts with
    pub python_path: PathBuf,
    /// Base directory for per-invocation workspaces
    pub workspace_base: PathBuf,
    /// Leave workspaces on disk after the run (debugging aid)
    pub keep_workspaces: bool,
    /// Per-invocation resource budget
    pub budget: ResourceBudget,
    /// Artifact capture policy
    pub render: RenderPolicy,
}

impl SandboxConfig {
    pub fn with_python(python_path: PathBuf) -> Self {
        Self {
            python_path,
            workspace_base: std::env::temp_dir().join("plotbox-workspaces"),
            keep_workspaces: false,
            budget: ResourceBudget::default(),
            render: RenderPolicy::default(),
        }
    }
}
