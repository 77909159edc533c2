//! Rendering-engine abstraction.
//!
//! A rendering engine is one external browser process capable of loading a
//! document body and exporting it as a paginated PDF. The pool only ever
//! talks to engines through the [`RenderEngine`] and [`EngineLauncher`]
//! traits, so its lifecycle and admission logic is testable without a
//! Chromium binary on the machine.
//!
//! Engine lifecycle (Starting → Idle ⇄ Leased → Dead) is encoded in
//! ownership rather than a state field: an [`Instance`] sitting in the pool's
//! idle list is idle, an instance moved into a lease is leased, and a dropped
//! instance is dead — its engine handle tears the external process down with
//! it.

use crate::server::config::PdfSettings;
use std::time::{Duration, Instant};

pub type InstanceId = u64;

/// Failures originating inside a rendering engine.
#[derive(Clone, thiserror::Error, Debug)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to launch rendering engine: {0}")]
    Launch(String),

    /// The loaded document never reached a quiescent state within the bound.
    #[error("document not quiescent within {0:?}")]
    Quiescence(Duration),

    /// The engine crashed or stopped answering mid-render.
    #[error("rendering engine unresponsive: {0}")]
    Unresponsive(String),

    /// PDF export errored after the document loaded.
    #[error("export failed: {0}")]
    Export(String),
}

/// One external rendering-engine process.
///
/// Implementations are blocking; callers run them on the blocking thread
/// pool, never on an async worker.
pub trait RenderEngine: Send + Sync {
    /// Cheap liveness probe. `false` means the process is gone or wedged and
    /// the instance must be discarded.
    fn ping(&self) -> bool;

    /// Loads `body` as the engine's document content, waits for quiescence,
    /// and exports a single PDF with the fixed page geometry in `settings`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Quiescence`] when the document never settles within the
    /// engine's bound, [`EngineError::Unresponsive`] when the engine dies
    /// mid-render, [`EngineError::Export`] when export itself fails.
    fn render_pdf(&self, body: &str, settings: &PdfSettings) -> Result<Vec<u8>, EngineError>;
}

/// Starts new rendering-engine processes for the pool.
pub trait EngineLauncher: Send + Sync {
    /// Launches one engine. Expensive: this forks an external process.
    fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError>;
}

/// A live engine plus the pool's bookkeeping for it.
pub(crate) struct Instance {
    pub(crate) id: InstanceId,
    pub(crate) engine: std::sync::Arc<dyn RenderEngine>,
    pub(crate) idle_since: Instant,
}
