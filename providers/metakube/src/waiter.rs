//! Convergence waiter
//!
//! Polls the API until a resource reaches a terminal state or a deadline
//! passes. Each tick issues one remote call and classifies the result:
//!
//! - converged: stop, return the value
//! - pending, or an error the policy deems transient: sleep, poll again
//! - an error the policy deems terminal: stop as converged (gone during
//!   delete) or failed
//! - deadline reached: stop as timed out, the last observation is reported
//!
//! Time comes from a [`Clock`] so tests can run the machine without sleeping.
//! A poll still in flight when the deadline passes is dropped.

use crate::backoff::FibonacciBackoff;
use crate::error::ProviderError;
use metakube_client::MetaKubeError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of time for the waiter
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on; sleeping returns immediately.
///
/// Makes waits deterministic in tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock at zero elapsed time
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Total time slept so far
    pub fn elapsed(&self) -> Duration {
        match self.elapsed.lock() {
            Ok(elapsed) => *elapsed,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move time forward without sleeping
    pub fn advance(&self, duration: Duration) {
        match self.elapsed.lock() {
            Ok(mut elapsed) => *elapsed += duration,
            Err(poisoned) => *poisoned.into_inner() += duration,
        }
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// State of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Between polls
    Polling,
    /// The resource reached the desired state
    Converged,
    /// A permanent error ended the wait
    Failed,
    /// The deadline passed first
    TimedOut,
    /// The caller cancelled
    Cancelled,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitState::Polling => "polling",
            WaitState::Converged => "converged",
            WaitState::Failed => "failed",
            WaitState::TimedOut => "timed out",
            WaitState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of one successful poll
#[derive(Debug, Clone, PartialEq)]
pub enum Tick<T> {
    /// Done, with the final observation
    Converged(T),
    /// Not there yet; `observed` describes what was seen
    Pending {
        /// Human readable progress, kept for the timeout error
        observed: String,
    },
}

impl<T> Tick<T> {
    /// Pending tick with a progress description
    pub fn pending(observed: impl Into<String>) -> Self {
        Tick::Pending {
            observed: observed.into(),
        }
    }
}

/// How a remote error affects the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling
    Retry,
    /// The resource is gone; counts as converged
    Gone,
    /// Stop and fail
    Fatal,
}

/// Error classification used by a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Waiting for a resource to become ready: a 404 means not created yet
    Readiness,
    /// Retrying a mutating call: only transient errors are retried
    Mutation,
    /// Waiting for a resource to disappear: 404 and 403 mean gone
    Deletion,
}

impl ErrorPolicy {
    /// Verdict for an error returned by a poll or a mutating call
    pub fn classify(&self, err: &MetaKubeError) -> Verdict {
        match self {
            ErrorPolicy::Readiness if err.is_transient() || err.is_not_found() => Verdict::Retry,
            ErrorPolicy::Deletion if err.is_not_found() || err.is_forbidden() => Verdict::Gone,
            _ if err.is_transient() => Verdict::Retry,
            _ => Verdict::Fatal,
        }
    }
}

enum Outcome<T> {
    Converged(T),
    /// The error that showed the resource is gone
    Gone(MetaKubeError),
}

/// Bounded polling state machine
#[derive(Clone)]
pub struct ConvergenceWaiter {
    clock: Arc<dyn Clock>,
    timeout: Duration,
    backoff: FibonacciBackoff,
    cancel: CancellationToken,
}

impl fmt::Debug for ConvergenceWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvergenceWaiter")
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ConvergenceWaiter {
    /// Waiter giving up after `timeout`, sleeping per `backoff` between polls
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration, backoff: FibonacciBackoff) -> Self {
        Self {
            clock,
            timeout,
            backoff,
            cancel: CancellationToken::new(),
        }
    }

    /// Waiter on the tokio clock with the default backoff
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Arc::new(TokioClock), timeout, FibonacciBackoff::default())
    }

    /// Abort waits when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deadline of every wait, measured from its start
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until `poll` reports convergence.
    ///
    /// Network errors, conflicts, 5xx and 404 (not created yet) are retried;
    /// anything else fails the wait.
    pub async fn wait<T, F, Fut>(&self, resource: &str, poll: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Tick<T>, MetaKubeError>>,
    {
        let deadline = self.clock.now() + self.timeout;
        let outcome = self.drive(resource, ErrorPolicy::Readiness, deadline, poll).await?;
        expect_converged(resource, outcome)
    }

    /// Retry a mutating call while it fails with a transient error
    pub async fn retry_transient<T, F, Fut>(&self, resource: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MetaKubeError>>,
    {
        let deadline = self.clock.now() + self.timeout;
        let attempt = || {
            let call = op();
            async move { call.await.map(Tick::Converged) }
        };
        let outcome = self.drive(resource, ErrorPolicy::Mutation, deadline, attempt).await?;
        expect_converged(resource, outcome)
    }

    /// Issue a delete once, then poll until the resource is gone.
    ///
    /// A 404 or 403 from either call counts as deleted. Transient errors of
    /// the delete call are retried without issuing it twice after success.
    pub async fn wait_deleted<D, DFut, P, PFut>(
        &self,
        resource: &str,
        mut issue_delete: D,
        probe: P,
    ) -> Result<(), ProviderError>
    where
        D: FnMut() -> DFut,
        DFut: Future<Output = Result<(), MetaKubeError>>,
        P: FnMut() -> PFut,
        PFut: Future<Output = Result<Tick<()>, MetaKubeError>>,
    {
        let deadline = self.clock.now() + self.timeout;
        let attempt = || {
            let call = issue_delete();
            async move { call.await.map(Tick::Converged) }
        };
        if let Outcome::Gone(_) = self.drive(resource, ErrorPolicy::Deletion, deadline, attempt).await? {
            info!("{} already gone, delete not needed", resource);
            return Ok(());
        }
        debug!("Delete issued for {}, waiting for it to disappear", resource);
        self.drive(resource, ErrorPolicy::Deletion, deadline, probe)
            .await
            .map(|_| ())
    }

    async fn drive<T, F, Fut>(
        &self,
        resource: &str,
        policy: ErrorPolicy,
        deadline: Instant,
        mut attempt: F,
    ) -> Result<Outcome<T>, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Tick<T>, MetaKubeError>>,
    {
        let mut backoff = self.backoff.clone();
        backoff.reset();
        let mut state = WaitState::Polling;
        let mut last_observed = String::from("no response yet");
        let mut polls: u32 = 0;

        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Err(self.timed_out(resource, &mut state, polls, last_observed));
            }

            polls += 1;
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(self.cancelled(resource, &mut state));
                }
                result = attempt() => Some(result),
                _ = self.clock.sleep(deadline - now) => None,
            };

            match result {
                None => {
                    warn!("Poll {} of {} still in flight at the deadline, abandoned", polls, resource);
                    return Err(self.timed_out(resource, &mut state, polls, last_observed));
                }
                Some(Ok(Tick::Converged(value))) => {
                    transition(resource, &mut state, WaitState::Converged);
                    debug!("{} converged after {} poll(s)", resource, polls);
                    return Ok(Outcome::Converged(value));
                }
                Some(Ok(Tick::Pending { observed })) => {
                    debug!("Waiting for {}: {}", resource, observed);
                    last_observed = observed;
                }
                Some(Err(err)) => match policy.classify(&err) {
                    Verdict::Retry => {
                        debug!("Transient error for {}, retrying: {}", resource, err);
                        last_observed = err.to_string();
                    }
                    Verdict::Gone => {
                        transition(resource, &mut state, WaitState::Converged);
                        debug!("{} is gone ({})", resource, err);
                        return Ok(Outcome::Gone(err));
                    }
                    Verdict::Fatal => {
                        transition(resource, &mut state, WaitState::Failed);
                        return Err(ProviderError::ConvergenceFailed {
                            resource: resource.to_string(),
                            source: err,
                        });
                    }
                },
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(self.timed_out(resource, &mut state, polls, last_observed));
            }
            let delay = backoff.next_backoff().min(deadline - now);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(self.cancelled(resource, &mut state));
                }
                _ = self.clock.sleep(delay) => {}
            }
        }
    }

    fn timed_out(
        &self,
        resource: &str,
        state: &mut WaitState,
        polls: u32,
        last_observed: String,
    ) -> ProviderError {
        transition(resource, state, WaitState::TimedOut);
        warn!(
            "Gave up on {} after {} poll(s) and {:?}, last observed: {}",
            resource, polls, self.timeout, last_observed
        );
        ProviderError::ConvergenceTimeout {
            resource: resource.to_string(),
            timeout: self.timeout,
            last_observed,
        }
    }

    fn cancelled(&self, resource: &str, state: &mut WaitState) -> ProviderError {
        transition(resource, state, WaitState::Cancelled);
        ProviderError::Cancelled {
            resource: resource.to_string(),
        }
    }
}

/// Only deletion waits accept a vanished resource
fn expect_converged<T>(resource: &str, outcome: Outcome<T>) -> Result<T, ProviderError> {
    match outcome {
        Outcome::Converged(value) => Ok(value),
        Outcome::Gone(source) => Err(ProviderError::ConvergenceFailed {
            resource: resource.to_string(),
            source,
        }),
    }
}

fn transition(resource: &str, state: &mut WaitState, next: WaitState) {
    debug!("Wait for {}: {} -> {}", resource, state, next);
    *state = next;
}
