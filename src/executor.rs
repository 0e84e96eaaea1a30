//! Budgeted execution of the materialized invocation.
//!
//! One fresh interpreter process per call, in its own process group, with
//! rlimit ceilings applied before exec and a wall-clock timeout enforced
//! from the host. A timed-out run is killed at the group level, so the
//! rendering context dies with it and nothing leaks into later invocations.

use crate::config::ResourceBudget;
use crate::environment::{PAYLOAD_BEGIN, PAYLOAD_END};
use crate::errors::{Result, SandboxError};
use crate::workspace::InvocationWorkspace;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Structured result emitted by the bootstrap between the stdout sentinels.
#[derive(Debug, Deserialize)]
struct WirePayload {
    error: Option<String>,
    image: Option<String>,
    drew: bool,
    stdout: Option<String>,
}

/// Outcome of a clean run: the script completed without raising. Whether it
/// drew anything is decided later by the capture stage.
#[derive(Debug)]
pub struct ExecutionReport {
    pub image_base64: Option<String>,
    pub drew: bool,
    pub stdout: Option<String>,
}

pub async fn execute(
    python: &Path,
    workspace: &InvocationWorkspace,
    argv: &[PathBuf],
    budget: &ResourceBudget,
) -> Result<ExecutionReport> {
    let mut cmd = Command::new(python);
    // Isolated mode: no site-packages surprises, no env injection, no
    // bytecode droppings. -E (implied by -I) ignores PYTHON* variables,
    // so the encoding is forced by flag.
    cmd.args(["-I", "-B", "-X", "utf8"]);
    cmd.args(argv);
    cmd.current_dir(workspace.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("MPLBACKEND", "Agg")
        .env("MPLCONFIGDIR", workspace.path())
        .env("OMP_NUM_THREADS", budget.max_threads.to_string())
        .env("OPENBLAS_NUM_THREADS", budget.max_threads.to_string())
        .env("MKL_NUM_THREADS", budget.max_threads.to_string());

    apply_resource_limits(&mut cmd, budget);

    let child = cmd.spawn()?;
    let pid = child.id();

    match tokio::time::timeout(budget.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => classify(output),
        Ok(Err(err)) => Err(SandboxError::Io(err)),
        Err(_) => {
            kill_process_group(pid);
            Err(SandboxError::Timeout)
        }
    }
}

#[cfg(unix)]
fn apply_resource_limits(cmd: &mut Command, budget: &ResourceBudget) {
    let cpu_seconds = budget.cpu_seconds;
    #[cfg(not(target_os = "macos"))]
    let memory_bytes = budget.memory_mb * 1024 * 1024;
    #[cfg(not(target_os = "macos"))]
    let max_processes = budget.max_processes;

    unsafe {
        cmd.pre_exec(move || {
            // Own process group, so a timeout can kill everything at once.
            libc::setpgid(0, 0);

            // macOS does not honor RLIMIT_AS or RLIMIT_NPROC sensibly.
            #[cfg(not(target_os = "macos"))]
            {
                let rlimit = libc::rlimit {
                    rlim_cur: memory_bytes as libc::rlim_t,
                    rlim_max: memory_bytes as libc::rlim_t,
                };
                if libc::setrlimit(libc::RLIMIT_AS, &rlimit) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }

            let rlimit = libc::rlimit {
                rlim_cur: cpu_seconds as libc::rlim_t,
                rlim_max: cpu_seconds as libc::rlim_t,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &rlimit) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            #[cfg(not(target_os = "macos"))]
            {
                let rlimit = libc::rlimit {
                    rlim_cur: max_processes as libc::rlim_t,
                    rlim_max: max_processes as libc::rlim_t,
                };
                if libc::setrlimit(libc::RLIMIT_NPROC, &rlimit) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }

            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn apply_resource_limits(_cmd: &mut Command, _budget: &ResourceBudget) {
    // Non-Unix hosts rely on the wall-clock timeout only.
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if let Some(pid) = pid {
        if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!("[SANDBOX] failed to kill process group {}: {}", pid, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn classify(output: std::process::Output) -> Result<ExecutionReport> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if let Some(parsed) = extract_payload(&stdout) {
        let payload = parsed?;
        if let Some(error) = payload.error {
            // An rlimit-induced allocation failure surfaces as the script's
            // MemoryError; classify it as budget exhaustion, not script logic.
            if error.starts_with("MemoryError") {
                return Err(SandboxError::MemoryLimitExceeded);
            }
            return Err(SandboxError::Runtime(error));
        }
        if let Some(text) = payload.stdout.as_deref() {
            debug!("[SANDBOX] script stdout: {}", text.trim_end());
        }
        return Ok(ExecutionReport {
            image_base64: payload.image,
            drew: payload.drew,
            stdout: payload.stdout,
        });
    }

    // No structured payload: the bootstrap itself did not finish.
    if killed_by_signal(&output.status) {
        return Err(SandboxError::ProcessKilled);
    }
    if stderr.contains("MemoryError") {
        return Err(SandboxError::MemoryLimitExceeded);
    }
    warn!("[SANDBOX] interpreter exited without a payload: {}", stderr.trim_end());
    Err(SandboxError::Internal(format!(
        "interpreter produced no result payload: {}",
        stderr.trim()
    )))
}

#[cfg(unix)]
fn killed_by_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn killed_by_signal(_status: &std::process::ExitStatus) -> bool {
    false
}

fn extract_payload(stdout: &str) -> Option<Result<WirePayload>> {
    let start = stdout.find(PAYLOAD_BEGIN)?;
    let rest = &stdout[start + PAYLOAD_BEGIN.len()..];
    // Captured script output travels inside the payload, so the end
    // sentinel may also appear JSON-escaped within it; the real one is last.
    let end = rest.rfind(PAYLOAD_END)?;
    Some(serde_json::from_str(rest[..end].trim()).map_err(SandboxError::from))
}
