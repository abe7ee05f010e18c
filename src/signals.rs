/// Signal handling for graceful shutdown.
///
/// SIGINT (Ctrl-C) and SIGTERM (what the parent controller sends) both
/// raise the injected stop flag; the monitor loop observes it at the next
/// tick boundary and the normal control flow runs the full shutdown
/// sequence. The listeners close over the flag rather than touching any
/// process-global state, and a second delivery is a no-op because the
/// flag is already set.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(unix)]
pub fn install(stop_flag: Arc<AtomicBool>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn({
        let stop_flag = Arc::clone(&stop_flag);
        async move {
            interrupt.recv().await;
            tracing::debug!("received SIGINT");
            stop_flag.store(true, Ordering::SeqCst);
        }
    });
    tokio::spawn(async move {
        terminate.recv().await;
        tracing::debug!("received SIGTERM");
        stop_flag.store(true, Ordering::SeqCst);
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn install(stop_flag: Arc<AtomicBool>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("received ctrl-c");
            stop_flag.store(true, Ordering::SeqCst);
        }
    });
    Ok(())
}
