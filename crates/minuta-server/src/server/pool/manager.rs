//! Bounded pool of rendering-engine processes.
//!
//! This module defines the [`BrowserPool`], which owns every rendering-engine
//! process the service may run and hands out exclusive, scoped [`Lease`]s.
//! The pool is the single shared, mutable resource in the render path: all
//! capacity accounting, queue admission, and instance reuse is serialized
//! through one internal lock, so concurrent callers always observe a
//! consistent instance count and no two callers are ever handed the same
//! idle instance.
//!
//! Admission beyond capacity either queues (bounded, first-queued
//! first-served) or rejects immediately, per configuration. Idle instances
//! are health-probed before reuse and retired after a configurable idle TTL
//! by a background reaper task. Shutdown is phased: refuse new work, fail
//! queued waiters, then drain in-flight leases within a bounded wait.

use super::instance::{EngineLauncher, Instance, InstanceId, RenderEngine};
use crate::server::config::{AdmissionPolicy, PoolConfig};
use crate::server::error::{Error, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// How a lease holder hands its instance back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The render completed and the engine is safe to reuse.
    Healthy,
    /// The engine faulted, timed out, or was abandoned; discard it.
    Faulted,
}

/// Point-in-time pool occupancy, reported by the health endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    /// Instances alive or starting (idle + leased + launching).
    pub live: usize,
    pub idle: usize,
    pub waiting: usize,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Result<Instance>>,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<Instance>,
    /// Instances that exist or are being launched. Never exceeds
    /// `max_instances`.
    live: usize,
    waiters: VecDeque<Waiter>,
    next_instance_id: InstanceId,
    next_waiter_id: u64,
}

pub(crate) struct PoolInner {
    launcher: Arc<dyn EngineLauncher>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    shutdown: CancellationToken,
}

/// Bounded pool of rendering engines. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BrowserPool {
    inner: Arc<PoolInner>,
}

/// What `acquire` decided to do while holding the state lock.
enum Plan {
    Reuse(Instance),
    Retire(Instance),
    Launch,
    Wait(u64, oneshot::Receiver<Result<Instance>>),
    Reject,
}

impl BrowserPool {
    /// Creates an empty pool and spawns its idle-retirement reaper.
    ///
    /// Instances are launched lazily on first demand, not warmed up front.
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: PoolConfig) -> Self {
        let shutdown = CancellationToken::new();
        let reap_interval = config.reap_interval;
        let inner = Arc::new(PoolInner {
            launcher,
            config,
            state: Mutex::new(PoolState::default()),
            shutdown: shutdown.clone(),
        });
        task::spawn(reap_loop(Arc::downgrade(&inner), shutdown, reap_interval));
        Self { inner }
    }

    /// Acquires an exclusive lease on a rendering engine.
    ///
    /// Reuses an idle instance when one passes its health probe, starts a new
    /// one below capacity, and otherwise queues or rejects per the admission
    /// policy. A dead idle instance found by the probe is discarded and
    /// replaced transparently.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolExhausted`] at capacity under `reject`, or when the
    ///   waiter queue is full.
    /// - [`Error::AcquireTimeout`] when a queued caller waits past the
    ///   configured bound.
    /// - [`Error::RenderEngineFault`] when a required launch fails.
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    pub async fn acquire(&self) -> Result<Lease> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        loop {
            let plan = {
                let mut state = self.inner.state();
                if let Some(instance) = state.idle.pop_front() {
                    if instance.idle_since.elapsed() >= self.inner.config.idle_ttl {
                        Plan::Retire(instance)
                    } else {
                        Plan::Reuse(instance)
                    }
                } else if state.live < self.inner.config.max_instances {
                    // Reserve the capacity slot before the (slow) launch so
                    // concurrent callers cannot oversubscribe the pool.
                    state.live += 1;
                    Plan::Launch
                } else if self.inner.config.admission == AdmissionPolicy::Queue {
                    state.waiters.retain(|waiter| !waiter.tx.is_closed());
                    if state.waiters.len() >= self.inner.config.queue_depth {
                        Plan::Reject
                    } else {
                        state.next_waiter_id += 1;
                        let id = state.next_waiter_id;
                        let (tx, rx) = oneshot::channel();
                        state.waiters.push_back(Waiter { id, tx });
                        Plan::Wait(id, rx)
                    }
                } else {
                    Plan::Reject
                }
            };

            match plan {
                Plan::Reuse(instance) => {
                    // The lease takes ownership before the probe so that a
                    // caller cancelled mid-probe still releases through Drop.
                    let lease = Lease::new(instance, Arc::clone(&self.inner));
                    let engine = lease.engine();
                    let alive = task::spawn_blocking(move || engine.ping())
                        .await
                        .unwrap_or(false);
                    if alive {
                        return Ok(lease);
                    }
                    tracing::debug!(
                        instance = lease.instance_id(),
                        "idle engine failed its liveness probe"
                    );
                    lease.release(ReleaseOutcome::Faulted);
                }
                Plan::Retire(instance) => {
                    self.inner.discard(instance, "idle past ttl");
                }
                Plan::Launch => {
                    let slot = SlotGuard::new(&self.inner);
                    let instance = self.inner.launch_instance().await?;
                    slot.disarm();
                    return Ok(Lease::new(instance, Arc::clone(&self.inner)));
                }
                Plan::Wait(waiter_id, rx) => {
                    return self.wait_for_instance(waiter_id, rx).await;
                }
                Plan::Reject => return Err(Error::PoolExhausted),
            }
        }
    }

    /// Waits for a queued slot, bounded by the configured acquire timeout.
    async fn wait_for_instance(
        &self,
        waiter_id: u64,
        mut rx: oneshot::Receiver<Result<Instance>>,
    ) -> Result<Lease> {
        let outcome = tokio::select! {
            outcome = &mut rx => Some(outcome),
            () = sleep(self.inner.config.acquire_timeout) => None,
        };

        let Some(outcome) = outcome else {
            // Deadline hit while queued: leave the queue.
            let still_queued = {
                let mut state = self.inner.state();
                let before = state.waiters.len();
                state.waiters.retain(|waiter| waiter.id != waiter_id);
                state.waiters.len() != before
            };
            if !still_queued {
                // Deliveries happen under the state lock, so a waiter no
                // longer queued already has its message in the channel.
                match rx.try_recv() {
                    Ok(Ok(instance)) => {
                        // Arrived right at the wire; hand it straight back so
                        // the next waiter benefits.
                        Lease::new(instance, Arc::clone(&self.inner))
                            .release(ReleaseOutcome::Healthy);
                    }
                    Ok(Err(err)) => return Err(err),
                    Err(_) => {}
                }
            }
            return Err(Error::AcquireTimeout);
        };

        match outcome {
            Ok(Ok(instance)) => Ok(Lease::new(instance, Arc::clone(&self.inner))),
            Ok(Err(err)) => Err(err),
            // Sender dropped without a message: the pool went away.
            Err(_) => Err(Error::ServiceShutdown),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state();
        PoolStats {
            live: state.live,
            idle: state.idle.len(),
            waiting: state.waiters.len(),
        }
    }

    /// Gracefully shuts the pool down.
    ///
    /// - Phase 1: refuse new acquires and stop the reaper.
    /// - Phase 2: fail queued waiters and retire idle engines.
    /// - Phase 3: wait (bounded) for in-flight leases to release; leases
    ///   released after the bound are still discarded on arrival.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down render backend pool");
        self.inner.shutdown.cancel();

        let (waiters, idle) = {
            let mut state = self.inner.state();
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.idle),
            )
        };
        for waiter in waiters {
            let _ = waiter.tx.send(Err(Error::ServiceShutdown));
        }
        for instance in idle {
            self.inner.discard(instance, "pool shutdown");
        }

        let drained = timeout(self.inner.config.shutdown_timeout, async {
            while self.inner.state().live > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("all leases drained"),
            Err(_) => tracing::warn!(
                live = self.inner.state().live,
                "graceful drain timed out; remaining leases are discarded on release"
            ),
        }
    }
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // A panicked holder cannot leave the state torn; recover the guard.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn launch_instance(self: &Arc<Self>) -> Result<Instance> {
        let launcher = Arc::clone(&self.launcher);
        match task::spawn_blocking(move || launcher.launch()).await {
            Ok(Ok(engine)) => {
                let id = {
                    let mut state = self.state();
                    state.next_instance_id += 1;
                    state.next_instance_id
                };
                tracing::info!(instance = id, "rendering engine started");
                Ok(Instance {
                    id,
                    engine: Arc::from(engine),
                    idle_since: Instant::now(),
                })
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "rendering engine failed to start");
                Err(err.into())
            }
            Err(join_err) => Err(Error::RenderEngineFault {
                context: join_err.to_string(),
            }),
        }
    }

    /// Returns an instance to whoever needs it: the oldest live waiter, or
    /// the idle list.
    fn deliver(self: &Arc<Self>, mut instance: Instance) {
        instance.idle_since = Instant::now();
        let mut state = self.state();
        let mut slot = instance;
        loop {
            let Some(waiter) = state.waiters.pop_front() else {
                state.idle.push_back(slot);
                return;
            };
            match waiter.tx.send(Ok(slot)) {
                Ok(()) => return,
                // The waiter timed out or disconnected; offer the instance to
                // the next one in line.
                Err(Ok(returned)) => slot = returned,
                // Only `Ok` is ever sent here; nothing to reclaim.
                Err(Err(_)) => return,
            }
        }
    }

    /// Removes an instance from the pool and tears its engine down.
    fn discard(self: &Arc<Self>, instance: Instance, reason: &str) {
        tracing::debug!(instance = instance.id, reason, "discarding rendering engine");
        self.state().live -= 1;
        // Engine teardown kills an external process; keep it off the async
        // workers.
        let engine = instance.engine;
        task::spawn_blocking(move || drop(engine));
        self.rebalance();
    }

    /// Hands a reserved-but-unused capacity slot back.
    fn abandon_slot(&self) {
        self.state().live -= 1;
    }

    /// Starts replacement launches when capacity frees up under queued
    /// waiters.
    fn rebalance(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        loop {
            {
                let mut state = self.state();
                state.waiters.retain(|waiter| !waiter.tx.is_closed());
                if state.waiters.is_empty() || state.live >= self.config.max_instances {
                    return;
                }
                state.live += 1;
            }
            let inner = Arc::clone(self);
            task::spawn(async move {
                match inner.launch_instance().await {
                    Ok(instance) => inner.deliver(instance),
                    Err(err) => {
                        // Do not retry here: the waiter gets the launch error
                        // and the slot goes back to the pool.
                        inner.abandon_slot();
                        inner.fail_one_waiter(err);
                    }
                }
            });
        }
    }

    fn fail_one_waiter(&self, err: Error) {
        let waiter = self.state().waiters.pop_front();
        if let Some(waiter) = waiter {
            let _ = waiter.tx.send(Err(err));
        }
    }

    pub(crate) fn release(self: &Arc<Self>, instance: Instance, outcome: ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Healthy if !self.shutdown.is_cancelled() => self.deliver(instance),
            ReleaseOutcome::Healthy => self.discard(instance, "released into shutdown"),
            ReleaseOutcome::Faulted => self.discard(instance, "released as faulted"),
        }
    }
}

/// Reserved capacity that has not yet materialized into an instance.
///
/// Dropping the guard without disarming (launch failure, cancelled caller)
/// hands the slot back and lets queued waiters compete for it.
struct SlotGuard<'a> {
    inner: &'a Arc<PoolInner>,
    armed: bool,
}

impl<'a> SlotGuard<'a> {
    fn new(inner: &'a Arc<PoolInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon_slot();
            self.inner.rebalance();
        }
    }
}

/// Exclusive, scoped ownership of one rendering engine.
///
/// A lease is released exactly once. Dropping it without an explicit
/// [`release`](Lease::release) means the holder bailed out early (error,
/// panic, cancelled request); the engine's state is then unknown, so it is
/// conservatively discarded rather than reused.
pub struct Lease {
    instance: Option<Instance>,
    pool: Arc<PoolInner>,
}

impl Lease {
    fn new(instance: Instance, pool: Arc<PoolInner>) -> Self {
        Self {
            instance: Some(instance),
            pool,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
            .as_ref()
            .expect("lease holds an instance until released")
            .id
    }

    /// Shared handle to the leased engine, for bridging onto the blocking
    /// thread pool.
    pub fn engine(&self) -> Arc<dyn RenderEngine> {
        Arc::clone(
            &self
                .instance
                .as_ref()
                .expect("lease holds an instance until released")
                .engine,
        )
    }

    /// Releases the lease with an explicit outcome.
    pub fn release(mut self, outcome: ReleaseOutcome) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance, outcome);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance, ReleaseOutcome::Faulted);
        }
    }
}

/// Retires instances idle past their TTL until the pool shuts down or is
/// dropped.
async fn reap_loop(inner: Weak<PoolInner>, shutdown: CancellationToken, interval: Duration) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            () = sleep(interval) => {}
        }
        let Some(inner) = inner.upgrade() else { return };
        let expired = {
            let mut state = inner.state();
            let mut keep = VecDeque::with_capacity(state.idle.len());
            let mut expired = Vec::new();
            while let Some(instance) = state.idle.pop_front() {
                if instance.idle_since.elapsed() >= inner.config.idle_ttl {
                    expired.push(instance);
                } else {
                    keep.push_back(instance);
                }
            }
            state.idle = keep;
            expired
        };
        for instance in expired {
            inner.discard(instance, "idle past ttl");
        }
    }
}
