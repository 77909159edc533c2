//! Render backend pool: bounded ownership of rendering-engine processes.
//!
//! ## Structure
//!
//! - [`instance`] - engine traits and per-instance bookkeeping.
//! - [`manager`] - the pool itself: admission, leases, retirement, shutdown.

pub mod instance;
pub mod manager;

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted engines for pool and supervisor tests, so neither needs a
    //! Chromium binary on the machine.

    use super::instance::{EngineError, EngineLauncher, RenderEngine};
    use crate::server::config::PdfSettings;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// What a mock engine does when asked to render.
    #[derive(Clone, Copy, Debug)]
    pub enum MockBehavior {
        Succeed,
        FailExport,
        Hang(Duration),
    }

    #[derive(Default)]
    pub struct MockMetrics {
        /// Engines launched over the pool's lifetime.
        pub launched: AtomicUsize,
        /// Engines currently alive (launched minus dropped).
        pub live: AtomicUsize,
        /// High-water mark of `live`.
        pub peak_live: AtomicUsize,
    }

    pub struct MockEngine {
        behavior: MockBehavior,
        healthy: Arc<AtomicBool>,
        metrics: Arc<MockMetrics>,
    }

    impl RenderEngine for MockEngine {
        fn ping(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }

        fn render_pdf(&self, body: &str, _settings: &PdfSettings) -> Result<Vec<u8>, EngineError> {
            match self.behavior {
                MockBehavior::Succeed => Ok(format!("%PDF {body}").into_bytes()),
                MockBehavior::FailExport => Err(EngineError::Export("mock export failure".into())),
                MockBehavior::Hang(pause) => {
                    std::thread::sleep(pause);
                    Ok(b"%PDF late".to_vec())
                }
            }
        }
    }

    impl Drop for MockEngine {
        fn drop(&mut self) {
            self.metrics.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub struct MockLauncher {
        behaviors: Mutex<VecDeque<MockBehavior>>,
        /// Flipping this off makes every engine fail its liveness probe.
        pub healthy: Arc<AtomicBool>,
        pub fail_launch: AtomicBool,
        pub metrics: Arc<MockMetrics>,
    }

    impl MockLauncher {
        pub fn new() -> Arc<Self> {
            Self::with_behaviors(&[])
        }

        /// Engines take the scripted behaviors in launch order, then default
        /// to `Succeed`.
        pub fn with_behaviors(script: &[MockBehavior]) -> Arc<Self> {
            Arc::new(Self {
                behaviors: Mutex::new(script.iter().copied().collect()),
                healthy: Arc::new(AtomicBool::new(true)),
                fail_launch: AtomicBool::new(false),
                metrics: Arc::new(MockMetrics::default()),
            })
        }
    }

    impl EngineLauncher for MockLauncher {
        fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
            if self.fail_launch.load(Ordering::SeqCst) {
                return Err(EngineError::Launch("mock launch failure".into()));
            }
            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(MockBehavior::Succeed);
            self.metrics.launched.fetch_add(1, Ordering::SeqCst);
            let live = self.metrics.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.metrics.peak_live.fetch_max(live, Ordering::SeqCst);
            Ok(Box::new(MockEngine {
                behavior,
                healthy: Arc::clone(&self.healthy),
                metrics: Arc::clone(&self.metrics),
            }))
        }
    }

    /// Polls until `check` holds or a second passes; engine teardown happens
    /// on the blocking pool, so counters settle asynchronously.
    pub async fn settled(check: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }
}
