//! Runs a source worker as an isolated subprocess.
//!
//! The worker contract: invoked with its configured args (with `{query}` and
//! `{limit}` placeholders rendered), it writes one JSON `RawPayload` to
//! stdout and exits zero. Anything else is a categorized failure:
//!
//! - missed deadline → the whole worker process tree is killed
//!   unconditionally and the run is `Timeout`; partial output is discarded;
//! - non-zero exit → `WorkerFailure` with a stderr-derived message;
//! - exit zero but unparseable stdout → `MalformedOutput`.
//!
//! On unix the child is placed in its own process group so descendant
//! processes die with it at the deadline.

use std::process::Stdio;

use tokio::process::Command;

use pollharvest_core::error::JobError;
use pollharvest_core::models::{RawPayload, SourceDescriptor};
use pollharvest_core::traits::SourceRunner;

const STDERR_MESSAGE_LIMIT: usize = 512;

/// Subprocess-backed [`SourceRunner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl SourceRunner for ProcessRunner {
    async fn run(
        &self,
        source: &SourceDescriptor,
        query: &str,
        result_cap: usize,
    ) -> Result<RawPayload, JobError> {
        let args = render_args(&source.worker.args, query, result_cap);
        tracing::debug!(
            source_id = %source.id,
            program = %source.worker.program,
            ?args,
            "Launching worker"
        );

        let mut cmd = Command::new(&source.worker.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| JobError::worker_failure(format!("failed to launch worker: {e}")))?;
        let child_pid = child.id();

        let output = match tokio::time::timeout(source.timeout(), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(JobError::worker_failure(format!(
                    "failed waiting for worker: {e}"
                )));
            }
            Err(_elapsed) => {
                // The dropped child is killed via kill_on_drop; the group
                // kill sweeps up any descendants it spawned.
                kill_process_group(child_pid);
                tracing::warn!(
                    source_id = %source.id,
                    timeout_secs = source.timeout_secs,
                    "Worker deadline hit, process tree killed"
                );
                return Err(JobError::Timeout {
                    timeout_secs: source.timeout_secs,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr_message(&stderr, output.status.code());
            return Err(JobError::worker_failure(message));
        }

        serde_json::from_slice::<RawPayload>(&output.stdout)
            .map_err(|e| JobError::malformed_output(e.to_string()))
    }
}

/// Substitute `{query}` and `{limit}` placeholders in worker args.
fn render_args(args: &[String], query: &str, result_cap: usize) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{query}", query)
                .replace("{limit}", &result_cap.to_string())
        })
        .collect()
}

fn stderr_message(stderr: &str, exit_code: Option<i32>) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        match exit_code {
            Some(code) => format!("worker exited with code {code}"),
            None => "worker terminated by signal".to_string(),
        }
    } else {
        let mut message: String = trimmed.chars().take(STDERR_MESSAGE_LIMIT).collect();
        if trimmed.chars().count() > STDERR_MESSAGE_LIMIT {
            message.push('…');
        }
        message
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    // The child may already be reaped; ESRCH is fine.
    if let Some(pid) = pid {
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
