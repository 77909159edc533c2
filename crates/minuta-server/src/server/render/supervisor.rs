//! Render job supervision.
//!
//! One [`RenderSupervisor::render`] call drives one [`RenderJob`] end to end:
//! acquire an engine lease, run the blocking render on the blocking thread
//! pool, and release the lease before the job reaches a terminal state. The
//! supervisor owns every timeout; cleanup is never deferred to the caller.
//!
//! Failures are surfaced verbatim — no automatic retries, since re-rendering
//! is not idempotent in resource cost. Cancellation is cooperative: a caller
//! dropping the in-flight future drops the [`Lease`], which releases the
//! instance as faulted.

use super::job::{JobState, RenderJob};
use crate::server::config::PdfSettings;
use crate::server::error::{Error, Result};
use crate::server::pool::manager::{BrowserPool, Lease, ReleaseOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;

/// Orchestrates render requests through the pool and the PDF renderer.
pub struct RenderSupervisor {
    pool: BrowserPool,
    pdf: PdfSettings,
    render_timeout: Duration,
    next_job_id: AtomicU64,
}

impl RenderSupervisor {
    pub fn new(pool: BrowserPool, pdf: PdfSettings, render_timeout: Duration) -> Self {
        Self {
            pool,
            pdf,
            render_timeout,
            next_job_id: AtomicU64::new(0),
        }
    }

    /// Renders a resolved document body to PDF bytes.
    ///
    /// The whole job — waiting for an engine plus the render itself — shares
    /// one deadline. An engine abandoned at the deadline is discarded, never
    /// reused, because its internal state after a forced abort is unknown.
    ///
    /// # Errors
    ///
    /// Every failure from the pool and renderer taxonomy: pool rejection or
    /// acquire timeout, quiescence/render timeout, engine fault, export
    /// failure, shutdown.
    pub async fn render(&self, body: String) -> Result<Vec<u8>> {
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut job = RenderJob::new(id, body, self.render_timeout);

        job.transition(JobState::Acquiring);
        let lease = match timeout(job.remaining(), self.pool.acquire()).await {
            Ok(Ok(lease)) => lease,
            Ok(Err(err)) => {
                job.transition(match err {
                    Error::AcquireTimeout => JobState::TimedOut,
                    _ => JobState::Failed,
                });
                return Err(err);
            }
            Err(_) => {
                job.transition(JobState::TimedOut);
                return Err(Error::AcquireTimeout);
            }
        };

        job.transition(JobState::Rendering);
        self.drive_render(&mut job, lease).await
    }

    /// Runs the leased render and settles the job into a terminal state. The
    /// lease is always released before this returns.
    async fn drive_render(&self, job: &mut RenderJob, lease: Lease) -> Result<Vec<u8>> {
        let engine = lease.engine();
        let document = job.body().to_owned();
        let settings = self.pdf.clone();
        let render = task::spawn_blocking(move || engine.render_pdf(&document, &settings));

        match timeout(job.remaining(), render).await {
            Ok(Ok(Ok(bytes))) => {
                lease.release(ReleaseOutcome::Healthy);
                job.transition(JobState::Succeeded);
                tracing::info!(
                    job = job.id(),
                    bytes = bytes.len(),
                    elapsed_ms = job.age().as_millis() as u64,
                    "render complete"
                );
                Ok(bytes)
            }
            Ok(Ok(Err(engine_err))) => {
                lease.release(ReleaseOutcome::Faulted);
                let err = Error::from(engine_err);
                job.transition(match err {
                    Error::RenderTimeout { .. } => JobState::TimedOut,
                    _ => JobState::Failed,
                });
                tracing::warn!(job = job.id(), state = ?job.state(), error = %err, "render failed");
                Err(err)
            }
            Ok(Err(join_err)) => {
                // The render panicked on the blocking pool.
                lease.release(ReleaseOutcome::Faulted);
                job.transition(JobState::Failed);
                tracing::warn!(job = job.id(), error = %join_err, "render task died");
                Err(Error::RenderEngineFault {
                    context: join_err.to_string(),
                })
            }
            Err(_) => {
                // Deadline hit mid-render. The abandoned blocking task still
                // holds an engine handle; releasing the lease as faulted
                // removes the instance from the pool, and the external
                // process dies once that last handle drops.
                lease.release(ReleaseOutcome::Faulted);
                job.transition(JobState::TimedOut);
                tracing::warn!(job = job.id(), "render exceeded its deadline");
                Err(Error::RenderTimeout {
                    context: format!("deadline of {:?} exceeded", self.render_timeout),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{AdmissionPolicy, PoolConfig};
    use crate::server::pool::mock::{MockBehavior, MockLauncher};
    use std::sync::Arc;

    fn pdf_settings() -> PdfSettings {
        PdfSettings {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.79,
            print_background: true,
        }
    }

    fn pool(launcher: Arc<MockLauncher>, max: usize) -> BrowserPool {
        BrowserPool::new(
            launcher,
            PoolConfig {
                max_instances: max,
                queue_depth: 4,
                admission: AdmissionPolicy::Reject,
                acquire_timeout: Duration::from_millis(250),
                idle_ttl: Duration::from_secs(60),
                reap_interval: Duration::from_secs(60),
                shutdown_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_render_returns_bytes_and_reuses_the_engine() {
        let launcher = MockLauncher::new();
        let pool = pool(launcher.clone(), 1);
        let supervisor = RenderSupervisor::new(pool.clone(), pdf_settings(), Duration::from_secs(5));

        let first = supervisor.render("<p>Olá</p>".into()).await.expect("renders");
        assert!(first.starts_with(b"%PDF"));
        let second = supervisor.render("<p>de novo</p>".into()).await.expect("renders");
        assert!(second.starts_with(b"%PDF"));

        assert_eq!(
            launcher.metrics.launched.load(std::sync::atomic::Ordering::SeqCst),
            1,
            "a healthy engine is reused"
        );
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn export_failure_discards_the_engine() {
        let launcher = MockLauncher::with_behaviors(&[MockBehavior::FailExport]);
        let pool = pool(launcher.clone(), 1);
        let supervisor = RenderSupervisor::new(pool.clone(), pdf_settings(), Duration::from_secs(5));

        let failed = supervisor.render("<p/>".into()).await;
        assert!(matches!(failed, Err(Error::ExportFailure { .. })));

        // The faulted engine was discarded; the next render gets a fresh one.
        let ok = supervisor.render("<p/>".into()).await.expect("renders");
        assert!(ok.starts_with(b"%PDF"));
        assert_eq!(
            launcher.metrics.launched.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hung_render_times_out_and_its_engine_is_never_reused() {
        let launcher =
            MockLauncher::with_behaviors(&[MockBehavior::Hang(Duration::from_millis(500))]);
        let pool = pool(launcher.clone(), 1);
        let supervisor =
            RenderSupervisor::new(pool.clone(), pdf_settings(), Duration::from_millis(100));

        let timed_out = supervisor.render("<p/>".into()).await;
        match timed_out {
            Err(err @ Error::RenderTimeout { .. }) => assert_eq!(err.kind(), "render_timeout"),
            other => panic!("expected a render timeout, got {other:?}"),
        }

        // The abandoned engine was discarded; a fresh launch serves the next job.
        let ok = supervisor.render("<p/>".into()).await.expect("renders");
        assert!(ok.starts_with(b"%PDF"));
        assert_eq!(
            launcher.metrics.launched.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pool_rejection_fails_the_job() {
        let launcher = MockLauncher::new();
        let pool = pool(launcher.clone(), 1);
        let supervisor = RenderSupervisor::new(pool.clone(), pdf_settings(), Duration::from_secs(5));

        let held = pool.acquire().await.expect("within capacity");
        let rejected = supervisor.render("<p/>".into()).await;
        assert!(matches!(rejected, Err(Error::PoolExhausted)));

        held.release(ReleaseOutcome::Healthy);
        pool.shutdown().await;
    }
}
