use std::future::Future;

use tracing::{debug, error};

/// Run a fire-and-forget job on the runtime. The HTTP response never waits
/// for it; failures land in the log and nothing retries.
pub fn spawn_logged<F>(label: &'static str, job: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match job.await {
            Ok(()) => debug!(task = label, "background task finished"),
            Err(e) => error!(task = label, error = %e, "background task failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spawned_job_runs_detached() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn_logged("test", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        tokio::task::yield_now().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_job_does_not_panic_the_runtime() {
        spawn_logged("test-failure", async { anyhow::bail!("smtp unreachable") });
        tokio::task::yield_now().await;
    }
}
