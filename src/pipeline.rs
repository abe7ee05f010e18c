/// Capture-backend selection: an ordered list of pipeline candidates per
/// platform, tried first-available. No state, no retries — the supervisor
/// in `session.rs` owns everything that can fail after launch.
use std::path::Path;
use std::time::Duration;

/// A capture pipeline invocation. `args` may contain `{output}`
/// placeholders substituted with the output path at launch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub name: &'static str,
    pub command: String,
    pub args: Vec<String>,
}

impl PipelineSpec {
    /// Resolve `{output}` placeholders against the actual output path.
    pub fn resolved_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{output}", &output))
            .collect()
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Ordered candidates for continuous preview on the current platform.
///
/// Each pipeline overwrites `{output}` in place for every frame
/// (multifilesink max-files=1, ffmpeg `-update 1`), so the supervisor can
/// detect frames from the file's modification time alone.
pub fn candidates() -> Vec<PipelineSpec> {
    if cfg!(target_os = "linux") {
        vec![
            PipelineSpec {
                name: "gstreamer-pipewire",
                command: "gst-launch-1.0".to_string(),
                args: strings(&[
                    "-q",
                    "pipewiresrc",
                    "!",
                    "queue",
                    "max-size-buffers=2",
                    "leaky=downstream",
                    "!",
                    "videoconvert",
                    "!",
                    "video/x-raw,width=640,height=480",
                    "!",
                    "videorate",
                    "!",
                    "video/x-raw,framerate=20/1",
                    "!",
                    "jpegenc",
                    "quality=85",
                    "!",
                    "multifilesink",
                    "location={output}",
                    "max-files=1",
                ]),
            },
            PipelineSpec {
                name: "gstreamer-v4l2",
                command: "gst-launch-1.0".to_string(),
                args: strings(&[
                    "-q",
                    "v4l2src",
                    "!",
                    "videoconvert",
                    "!",
                    "video/x-raw,width=640,height=480",
                    "!",
                    "jpegenc",
                    "quality=85",
                    "!",
                    "multifilesink",
                    "location={output}",
                    "max-files=1",
                ]),
            },
            PipelineSpec {
                name: "ffmpeg-v4l2",
                command: "ffmpeg".to_string(),
                args: strings(&[
                    "-loglevel",
                    "quiet",
                    "-f",
                    "v4l2",
                    "-i",
                    "/dev/video0",
                    "-vf",
                    "fps=10,scale=640:480",
                    "-update",
                    "1",
                    "-y",
                    "{output}",
                ]),
            },
        ]
    } else if cfg!(target_os = "macos") {
        vec![PipelineSpec {
            name: "ffmpeg-avfoundation",
            command: "ffmpeg".to_string(),
            args: strings(&[
                "-loglevel",
                "quiet",
                "-f",
                "avfoundation",
                "-framerate",
                "30",
                "-i",
                "0",
                "-vf",
                "fps=10,scale=640:480",
                "-update",
                "1",
                "-y",
                "{output}",
            ]),
        }]
    } else {
        vec![PipelineSpec {
            name: "ffmpeg-dshow",
            command: "ffmpeg".to_string(),
            args: strings(&[
                "-loglevel",
                "quiet",
                "-f",
                "dshow",
                "-i",
                "video=Integrated Camera",
                "-vf",
                "fps=10,scale=640:480",
                "-update",
                "1",
                "-y",
                "{output}",
            ]),
        }]
    }
}

/// True if `command` resolves to an executable file on PATH.
pub fn command_exists(command: &str) -> bool {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(command).is_file();
    }
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(command).is_file())
}

/// First candidate whose command is installed, or `None` if no capture
/// backend is available on this machine.
pub fn select() -> Option<PipelineSpec> {
    for spec in candidates() {
        if command_exists(&spec.command) {
            tracing::info!(backend = spec.name, command = %spec.command, "selected capture backend");
            return Some(spec);
        }
        tracing::debug!(backend = spec.name, "capture backend not installed");
    }
    None
}

/// Single-frame pipeline for `--capture-only` mode, one per platform.
fn snapshot_spec() -> Option<PipelineSpec> {
    let mut specs = if cfg!(target_os = "linux") {
        vec![
            PipelineSpec {
                name: "gstreamer-snapshot",
                command: "gst-launch-1.0".to_string(),
                args: strings(&[
                    "-q",
                    "pipewiresrc",
                    "num-buffers=1",
                    "!",
                    "videoconvert",
                    "!",
                    "video/x-raw,width=640,height=480",
                    "!",
                    "jpegenc",
                    "quality=95",
                    "!",
                    "filesink",
                    "location={output}",
                ]),
            },
            PipelineSpec {
                name: "ffmpeg-snapshot",
                command: "ffmpeg".to_string(),
                args: strings(&[
                    "-loglevel",
                    "quiet",
                    "-f",
                    "v4l2",
                    "-i",
                    "/dev/video0",
                    "-frames:v",
                    "1",
                    "-q:v",
                    "2",
                    "-y",
                    "{output}",
                ]),
            },
        ]
    } else if cfg!(target_os = "macos") {
        vec![PipelineSpec {
            name: "ffmpeg-snapshot",
            command: "ffmpeg".to_string(),
            args: strings(&[
                "-loglevel",
                "quiet",
                "-f",
                "avfoundation",
                "-framerate",
                "30",
                "-i",
                "0",
                "-frames:v",
                "1",
                "-q:v",
                "2",
                "-y",
                "{output}",
            ]),
        }]
    } else {
        vec![PipelineSpec {
            name: "ffmpeg-snapshot",
            command: "ffmpeg".to_string(),
            args: strings(&[
                "-loglevel",
                "quiet",
                "-f",
                "dshow",
                "-i",
                "video=Integrated Camera",
                "-frames:v",
                "1",
                "-q:v",
                "2",
                "-y",
                "{output}",
            ]),
        }]
    };
    specs.retain(|spec| command_exists(&spec.command));
    specs.into_iter().next()
}

/// Capture a single high-quality frame to `output`, bounded by `timeout`.
///
/// Returns true iff the pipeline exited cleanly and the file is non-empty.
pub async fn snapshot(output: &Path, timeout: Duration) -> bool {
    let Some(spec) = snapshot_spec() else {
        tracing::warn!("no snapshot backend installed");
        return false;
    };
    tracing::info!(backend = spec.name, "capturing single frame");

    let mut child = match tokio::process::Command::new(&spec.command)
        .args(spec.resolved_args(output))
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(error = %e, "snapshot spawn failed");
            return false;
        }
    };

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "snapshot wait failed");
            return false;
        }
        Err(_) => {
            tracing::warn!("snapshot timed out");
            let _ = child.kill().await;
            return false;
        }
    };

    status.success()
        && std::fs::metadata(output)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
}
