use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Everything that can go wrong between receiving a script and handing back
/// an artifact. Script-attributable failures carry the message the caller is
/// expected to surface; host-side faults are kept separate so they are never
/// blamed on the script.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Python not installed or not found in PATH")]
    PythonNotFound,

    #[error("syntax error in script: {0}")]
    Syntax(String),

    #[error("import of '{0}' is not allowed")]
    Security(String),

    #[error("script raised an error: {0}")]
    Runtime(String),

    #[error("execution exceeded the time budget")]
    Timeout,

    #[error("memory limit exceeded")]
    MemoryLimitExceeded,

    #[error("execution process killed by signal")]
    ProcessKilled,

    #[error("script completed but produced no drawable content")]
    NoArtifact,

    #[error("rendered artifact is {bytes} bytes, limit is {limit}")]
    ArtifactTooLarge { bytes: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Classified failure kind, for callers that route on category rather than
/// on the concrete error. Exactly one kind per failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The script text does not parse; nothing was executed.
    Syntax,
    /// A disallowed module reference was detected statically; nothing was
    /// executed.
    Security,
    /// The script executed and raised an error of its own.
    Runtime,
    /// The script exhausted its resource budget and was forcibly cancelled.
    Timeout,
    /// The script completed cleanly without drawing anything.
    NoArtifact,
    /// A host-side fault unrelated to the script.
    Internal,
}

impl SandboxError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SandboxError::Syntax(_) => FailureKind::Syntax,
            SandboxError::Security(_) => FailureKind::Security,
            SandboxError::Runtime(_) | SandboxError::ArtifactTooLarge { .. } => {
                FailureKind::Runtime
            }
            SandboxError::Timeout
            | SandboxError::MemoryLimitExceeded
            | SandboxError::ProcessKilled => FailureKind::Timeout,
            SandboxError::NoArtifact => FailureKind::NoArtifact,
            SandboxError::PythonNotFound
            | SandboxError::Io(_)
            | SandboxError::Json(_)
            | SandboxError::Internal(_) => FailureKind::Internal,
        }
    }
}
