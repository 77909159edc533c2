//! Render job identity and state machine.

use std::time::{Duration, Instant};

pub type JobId = u64;

/// Lifecycle of one render request.
///
/// `Queued → Acquiring → Rendering → {Succeeded, Failed, TimedOut}`; the
/// terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet attempted.
    Queued,
    /// Waiting on the render backend pool.
    Acquiring,
    /// Holding a leased engine, render in flight.
    Rendering,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

/// One request's passage through substitution and PDF rendering.
pub struct RenderJob {
    id: JobId,
    body: String,
    state: JobState,
    created_at: Instant,
    deadline: Instant,
}

impl RenderJob {
    pub(crate) fn new(id: JobId, body: String, budget: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            id,
            body,
            state: JobState::Queued,
            created_at,
            deadline: created_at + budget,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// The fully resolved document body this job renders.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Budget left before the job's hard deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn transition(&mut self, next: JobState) {
        debug_assert!(!self.state.is_terminal(), "terminal job states are final");
        tracing::debug!(job = self.id, from = ?self.state, to = ?next, "render job transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_happy_path() {
        let mut job = RenderJob::new(1, "<p/>".into(), Duration::from_secs(1));
        assert_eq!(job.state(), JobState::Queued);

        job.transition(JobState::Acquiring);
        job.transition(JobState::Rendering);
        job.transition(JobState::Succeeded);
        assert!(job.state().is_terminal());
    }

    #[test]
    fn only_the_outcomes_are_terminal() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Acquiring.is_terminal());
        assert!(!JobState::Rendering.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
    }

    #[test]
    fn remaining_budget_runs_down_to_zero() {
        let job = RenderJob::new(2, String::new(), Duration::from_millis(20));
        assert!(job.remaining() <= Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(job.remaining(), Duration::ZERO);
    }
}
