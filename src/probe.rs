/// One-shot readiness probe for the output artifact.
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

/// Sleep out the warm-up interval, then check that the output artifact
/// exists with non-zero size.
///
/// Deliberately not a retry loop: camera negotiation time is bounded and
/// well-known for the target hardware class, so a fixed warm-up beats
/// adaptive backoff. On `NotReady` the caller must still run shutdown to
/// avoid leaking the child.
pub async fn probe_ready(output_path: &Path, warmup: Duration) -> Readiness {
    tokio::time::sleep(warmup).await;

    match std::fs::metadata(output_path) {
        Ok(meta) if meta.len() > 0 => {
            tracing::info!(bytes = meta.len(), "pipeline producing output");
            Readiness::Ready
        }
        Ok(_) => {
            tracing::warn!(path = %output_path.display(), "output file exists but is empty");
            Readiness::NotReady
        }
        Err(e) => {
            tracing::warn!(path = %output_path.display(), error = %e, "output file not found after warm-up");
            Readiness::NotReady
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_when_file_has_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        assert_eq!(
            probe_ready(&path, Duration::ZERO).await,
            Readiness::Ready
        );
    }

    #[tokio::test]
    async fn not_ready_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");

        assert_eq!(
            probe_ready(&path, Duration::ZERO).await,
            Readiness::NotReady
        );
    }

    #[tokio::test]
    async fn not_ready_when_file_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(
            probe_ready(&path, Duration::ZERO).await,
            Readiness::NotReady
        );
    }

    #[tokio::test]
    async fn probe_waits_out_the_warmup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.jpg");

        // File appears during the warm-up window.
        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                std::fs::write(&path, b"late frame").unwrap();
            })
        };

        let readiness = probe_ready(&path, Duration::from_millis(100)).await;
        writer.await.unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }
}
