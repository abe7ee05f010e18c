/// Tiered teardown of the pipeline process group.
///
/// Three time-boxed tiers: SIGTERM to the group, SIGKILL to the group,
/// then direct-by-pid kills (leader plus children found via ppid) for
/// platforms or states where group signaling does not apply. A process
/// that is already gone (ESRCH) is a benign race at every tier. Nothing
/// in this module returns an error or panics; shutdown may run after a
/// termination signal and must always complete.
use crate::launcher::ChildHandle;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

/// How long to wait for the leader to die after a SIGKILL.
const KILL_REAP_WAIT: Duration = Duration::from_millis(500);

/// Terminate the child's process group: SIGTERM, bounded grace wait,
/// SIGKILL escalation, direct-by-pid fallback.
pub async fn terminate_group(handle: &mut ChildHandle, grace: Duration) {
    let pgid = Pid::from_raw(handle.pgid());

    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) => {
            tracing::debug!(pgid = pgid.as_raw(), "sent SIGTERM to process group");
        }
        Err(Errno::ESRCH) => {
            tracing::debug!(pgid = pgid.as_raw(), "process group already gone");
            reap(handle).await;
            return;
        }
        Err(e) => {
            tracing::warn!(pgid = pgid.as_raw(), error = %e, "group signal unavailable, falling back to direct kill");
            kill_directly(handle.pid);
            reap(handle).await;
            return;
        }
    }

    if timeout(grace, handle.child.wait()).await.is_ok() {
        tracing::debug!("pipeline exited gracefully");
        return;
    }

    tracing::debug!(pgid = pgid.as_raw(), "grace period elapsed, sending SIGKILL");
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            tracing::warn!(pgid = pgid.as_raw(), error = %e, "group SIGKILL failed, falling back to direct kill");
            kill_directly(handle.pid);
        }
    }
    reap(handle).await;
}

/// Bounded wait for the leader so it does not linger as a zombie.
async fn reap(handle: &mut ChildHandle) {
    match timeout(KILL_REAP_WAIT, handle.child.wait()).await {
        Ok(Ok(status)) => tracing::debug!(?status, "pipeline reaped"),
        Ok(Err(e)) => tracing::debug!(error = %e, "pipeline wait failed"),
        Err(_) => tracing::warn!(pid = handle.pid, "pipeline did not exit after SIGKILL"),
    }
}

/// Last-resort tier: SIGKILL the leader and any process whose parent is
/// the leader, by pid.
fn kill_directly(pid: i32) {
    for child in children_of(pid) {
        match kill(Pid::from_raw(child), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(pid = child, error = %e, "direct child kill failed"),
        }
    }
    match kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::debug!(pid, error = %e, "direct kill failed"),
    }
}

/// Pids whose parent is `pid`, from procfs. Empty on non-Linux platforms.
#[cfg(target_os = "linux")]
pub fn children_of(pid: i32) -> Vec<i32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    let mut children = Vec::new();
    for entry in entries.flatten() {
        let Ok(candidate) = entry.file_name().to_string_lossy().parse::<i32>() else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{candidate}/stat")) else {
            continue;
        };
        // Field 4 of /proc/<pid>/stat is the ppid; the comm field before
        // it is parenthesized and may contain spaces, so split after ')'.
        let Some(after_comm) = stat.rsplit_once(')').map(|(_, rest)| rest) else {
            continue;
        };
        if let Some(ppid) = after_comm.split_whitespace().nth(1) {
            if ppid.parse::<i32>() == Ok(pid) {
                children.push(candidate);
            }
        }
    }
    children
}

#[cfg(not(target_os = "linux"))]
pub fn children_of(_pid: i32) -> Vec<i32> {
    Vec::new()
}

/// Best-effort removal of the shared output artifact. The child wrote it;
/// deleting it on shutdown is a courtesy to the parent, not a contract.
pub fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed output artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove output artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::launch;
    use crate::pipeline::PipelineSpec;

    fn spec(command: &str, args: &[&str]) -> PipelineSpec {
        PipelineSpec {
            name: "test",
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn process_gone(pid: i32) -> bool {
        matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
    }

    #[tokio::test]
    async fn sigterm_tier_kills_a_cooperative_child() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.jpg");

        let mut handle = launch(&output, &spec("sleep", &["30"])).unwrap();
        let pid = handle.pid;

        terminate_group(&mut handle, Duration::from_millis(500)).await;
        assert!(process_gone(pid));
    }

    #[tokio::test]
    async fn sigkill_tier_kills_a_term_ignoring_child() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.jpg");

        let mut handle = launch(
            &output,
            &spec("sh", &["-c", "trap '' TERM; sleep 30"]),
        )
        .unwrap();
        let pid = handle.pid;

        // Give the shell a moment to install its trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        terminate_group(&mut handle, Duration::from_millis(200)).await;
        assert!(process_gone(pid));
    }

    #[tokio::test]
    async fn group_kill_reaches_forked_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.jpg");
        let marker = dir.path().join("helper.alive");

        // The shell forks a helper into the same group; both must die.
        let script = format!(
            "sleep 30 & echo $! > {}; wait",
            marker.display()
        );
        let mut handle = launch(&output, &spec("sh", &["-c", &script])).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let helper_pid: i32 = std::fs::read_to_string(&marker)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        terminate_group(&mut handle, Duration::from_millis(500)).await;
        // The helper may need a scheduler beat to be reaped by init.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(process_gone(handle.pid));
        assert!(process_gone(helper_pid));
    }

    #[tokio::test]
    async fn terminating_an_exited_child_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.jpg");

        let mut handle = launch(&output, &spec("true", &[])).unwrap();
        handle.child.wait().await.unwrap();

        // Already reaped; ESRCH path must be silent.
        terminate_group(&mut handle, Duration::from_millis(100)).await;
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn children_of_sees_a_direct_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .unwrap();
        let own_pid = std::process::id() as i32;

        let children = children_of(own_pid);
        assert!(children.contains(&(child.id() as i32)));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn remove_artifact_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        remove_artifact(&dir.path().join("never-existed.jpg"));
    }

    #[test]
    fn remove_artifact_deletes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");
        std::fs::write(&path, b"frame").unwrap();

        remove_artifact(&path);
        assert!(!path.exists());
    }
}
