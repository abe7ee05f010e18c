/// Spawns the capture pipeline in its own process group.
use crate::pipeline::PipelineSpec;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Handle to the spawned pipeline.
///
/// The pid is recorded at spawn time because `Child::id()` returns `None`
/// once the child has been reaped, and shutdown still needs it. The child
/// is spawned as a process-group leader, so the group id equals the pid.
#[derive(Debug)]
pub struct ChildHandle {
    pub child: Child,
    pub pid: i32,
}

impl ChildHandle {
    pub fn pgid(&self) -> i32 {
        self.pid
    }
}

/// Failed to start the capture pipeline.
#[derive(Debug)]
pub struct LaunchError {
    pub command: String,
    pub source: std::io::Error,
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to spawn {}: {}", self.command, self.source)
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Spawn the pipeline configured to write continuously to `output_path`.
///
/// The subprocess is spawned in its own process group (via
/// `process_group(0)`) so shutdown can later signal the entire group —
/// pipelines may fork helper processes of their own. Returns immediately;
/// readiness is the prober's job.
pub fn launch(output_path: &Path, spec: &PipelineSpec) -> Result<ChildHandle, LaunchError> {
    let args = spec.resolved_args(output_path);
    tracing::info!(
        command = %spec.command,
        args = ?args,
        output = %output_path.display(),
        "spawning capture pipeline"
    );

    // The supervisor's own stdout carries the status protocol, so the
    // child's streams must not leak into it.
    let child = Command::new(&spec.command)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0) // New process group for clean kill
        .spawn()
        .map_err(|e| LaunchError {
            command: spec.command.clone(),
            source: e,
        })?;

    let pid = child.id().unwrap_or(0) as i32;
    tracing::info!(pid, "pipeline started");

    Ok(ChildHandle { child, pid })
}
