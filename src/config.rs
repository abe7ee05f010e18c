use serde::Deserialize;
use std::path::Path;

/// Top-level configuration loaded from preview.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PreviewConfig {
    pub timing: TimingConfig,
    pub monitor: MonitorConfig,
    pub pipeline: PipelineConfig,
}

/// Warm-up, tick, and shutdown timing, all in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sleep after spawn before the readiness probe, to let the pipeline
    /// negotiate with the capture device.
    pub warmup_ms: u64,
    /// Fixed monitor tick period.
    pub tick_ms: u64,
    /// Grace period after SIGTERM before escalating to SIGKILL.
    pub grace_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Emit `FRAME:<n>` every this many frames.
    pub report_every: u64,
    /// Ticks without an mtime change before a liveness warning.
    pub stale_after: u32,
}

/// Explicit pipeline override. When `command` is set, backend selection
/// is skipped and this command runs instead; args may contain `{output}`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

// --- Default implementations ---

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 1500,
            tick_ms: 100,
            grace_ms: 1000,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            report_every: 20,
            stale_after: 100,
        }
    }
}

/// Load configuration from a TOML file, or defaults if the file is absent.
pub fn load(path: &Path) -> Result<PreviewConfig, String> {
    if !path.exists() {
        return Ok(PreviewConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    toml::from_str(&text).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}
