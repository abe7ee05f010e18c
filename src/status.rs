use std::io::Write;

/// Line-protocol emitter for the parent controller.
///
/// Protocol events go to the `out` stream, diagnostic `WARNING:`/`ERROR:`
/// lines to the `err` stream. Every line is newline-terminated and flushed
/// immediately — the parent reacts to unbuffered, line-delimited delivery.
/// Write failures are swallowed: the emitter may run during shutdown after
/// the parent has already closed its end of the pipe.
pub struct StatusEmitter<O: Write, E: Write> {
    pub(crate) out: O,
    pub(crate) err: E,
}

impl StatusEmitter<std::io::Stdout, std::io::Stderr> {
    /// Production emitter: protocol on stdout, diagnostics on stderr.
    pub fn stdio() -> Self {
        StatusEmitter::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> StatusEmitter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        StatusEmitter { out, err }
    }

    /// Child process group spawned.
    pub fn starting(&mut self) {
        self.emit_out("PREVIEW_STARTING");
    }

    /// Readiness probe succeeded.
    pub fn ready(&mut self) {
        self.emit_out("PREVIEW_READY");
    }

    /// Cumulative frame count reached `n`.
    pub fn frame(&mut self, n: u64) {
        self.emit_out(&format!("FRAME:{n}"));
    }

    /// Terminal event: clean stop with final frame count.
    pub fn stopped(&mut self, frames: u64) {
        self.emit_out(&format!("PREVIEW_STOPPED ({frames} frames)"));
    }

    /// Terminal event: shutdown triggered by an external signal.
    pub fn interrupted(&mut self) {
        self.emit_out("PREVIEW_INTERRUPTED");
    }

    /// Non-fatal liveness warning.
    pub fn warning(&mut self, text: &str) {
        self.emit_err(&format!("WARNING: {text}"));
    }

    /// Fatal condition during startup or monitoring.
    pub fn error(&mut self, text: &str) {
        self.emit_err(&format!("ERROR: {text}"));
    }

    fn emit_out(&mut self, line: &str) {
        // Single write so no event line is split, then flush.
        if let Err(e) = self
            .out
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|()| self.out.flush())
        {
            tracing::debug!(error = %e, line, "status write failed");
        }
    }

    fn emit_err(&mut self, line: &str) {
        if let Err(e) = self
            .err
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|()| self.err.flush())
        {
            tracing::debug!(error = %e, line, "diagnostic write failed");
        }
    }
}
