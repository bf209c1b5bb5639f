//! Bounded convergence polling
//!
//! [`poll_until`] samples state on a fixed interval until an acceptance
//! predicate holds, the predicate reports a definitive mismatch, or the
//! timeout elapses. Fetch errors are treated as transient: the resource may
//! not exist yet. A mismatch is final, since a wrong but stable value does not
//! correct itself by waiting.
//!
//! The loop runs on the caller's task and spawns nothing. Its state between
//! ticks is an explicit [`PollState`], advanced by [`PollState::advance`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{ExposeError, Result};

/// Verdict of an acceptance predicate on a fetched snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acceptance {
    /// The expected state has been reached
    Converged,
    /// Not there yet, keep polling
    NotYet,
    /// Settled on an unexpected value; stop polling
    Mismatch(String),
}

/// Result of a single tick
#[derive(Debug)]
pub enum PollOutcome<S, E> {
    Converged(S),
    NotYetConverged,
    FetchFailed(E),
    Mismatched(String),
}

/// Terminal result of a poll
#[derive(Debug)]
pub enum PollResult<S, E> {
    /// The predicate accepted `value` on tick `ticks`
    Success { value: S, ticks: u32 },
    /// The predicate reported a mismatch on tick `ticks`
    FatalError { detail: String, ticks: u32 },
    /// The deadline passed while still waiting
    Timeout {
        ticks: u32,
        elapsed: Duration,
        last_fetch_error: Option<E>,
    },
}

impl<S, E> PollResult<S, E> {
    pub fn ticks(&self) -> u32 {
        match self {
            PollResult::Success { ticks, .. }
            | PollResult::FatalError { ticks, .. }
            | PollResult::Timeout { ticks, .. } => *ticks,
        }
    }
}

impl<S, E: Display> PollResult<S, E> {
    /// Collapse into a Result, keeping the last fetch error as timeout context
    pub fn into_result(self) -> Result<S> {
        match self {
            PollResult::Success { value, .. } => Ok(value),
            PollResult::FatalError { detail, .. } => Err(ExposeError::Mismatch(detail)),
            PollResult::Timeout {
                ticks,
                elapsed,
                last_fetch_error,
            } => Err(ExposeError::Timeout {
                ticks,
                elapsed,
                last_error: last_fetch_error.map(|e| e.to_string()),
            }),
        }
    }
}

/// State carried from one tick to the next
#[derive(Debug)]
pub struct PollState<E> {
    ticks: u32,
    last_fetch_error: Option<E>,
}

/// Where a tick left the poll
#[derive(Debug)]
pub enum Transition<S, E> {
    Waiting(PollState<E>),
    Done(PollResult<S, E>),
}

impl<E> PollState<E> {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            last_fetch_error: None,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn last_fetch_error(&self) -> Option<&E> {
        self.last_fetch_error.as_ref()
    }

    /// Fold one tick's outcome into the state
    ///
    /// A successful fetch clears any remembered fetch error.
    pub fn advance<S>(self, outcome: PollOutcome<S, E>) -> Transition<S, E> {
        let ticks = self.ticks + 1;
        match outcome {
            PollOutcome::Converged(value) => Transition::Done(PollResult::Success { value, ticks }),
            PollOutcome::Mismatched(detail) => {
                Transition::Done(PollResult::FatalError { detail, ticks })
            }
            PollOutcome::NotYetConverged => Transition::Waiting(PollState {
                ticks,
                last_fetch_error: None,
            }),
            PollOutcome::FetchFailed(e) => Transition::Waiting(PollState {
                ticks,
                last_fetch_error: Some(e),
            }),
        }
    }

    /// End the poll at the deadline
    pub fn time_out<S>(self, elapsed: Duration) -> PollResult<S, E> {
        PollResult::Timeout {
            ticks: self.ticks,
            elapsed,
            last_fetch_error: self.last_fetch_error,
        }
    }
}

impl<E> Default for PollState<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Longest deadline honoured; larger timeouts are clamped to it
pub const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Polling cadence
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Overall deadline, measured from the start of the poll
    pub timeout: Duration,
    /// Fire the first tick immediately instead of after one interval
    pub immediate: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(300),
            immediate: true,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ExposeError::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ExposeError::InvalidConfiguration(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn effective_timeout(&self) -> Duration {
        self.timeout.min(MAX_POLL_TIMEOUT)
    }
}

/// Poll `fetch` until `accept` converges, mismatches, or `config.timeout` elapses
///
/// A fetch still in flight at the deadline is abandoned and the poll times out.
/// Timeouts beyond [`MAX_POLL_TIMEOUT`] are clamped.
pub async fn poll_until<S, E, F, Fut, A>(
    config: &PollConfig,
    mut fetch: F,
    mut accept: A,
) -> PollResult<S, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<S, E>>,
    A: FnMut(&S) -> Acceptance,
{
    let start = Instant::now();
    let timeout = config.effective_timeout();
    let deadline = start + timeout;
    let mut state = PollState::new();
    let mut wait_first = !config.immediate;

    loop {
        if wait_first || state.ticks() > 0 {
            if start.elapsed().saturating_add(config.interval) >= timeout {
                time::sleep_until(deadline).await;
                return timed_out(state, start);
            }
            time::sleep(config.interval).await;
        }
        wait_first = false;

        let fetched = match time::timeout_at(deadline, fetch()).await {
            Ok(fetched) => fetched,
            Err(_) => return timed_out(state, start),
        };

        let outcome = match fetched {
            Ok(value) => match accept(&value) {
                Acceptance::Converged => PollOutcome::Converged(value),
                Acceptance::NotYet => PollOutcome::NotYetConverged,
                Acceptance::Mismatch(detail) => PollOutcome::Mismatched(detail),
            },
            Err(e) => {
                debug!("Fetch failed on tick {}: {}", state.ticks() + 1, e);
                PollOutcome::FetchFailed(e)
            }
        };

        state = match state.advance(outcome) {
            Transition::Waiting(next) => {
                debug!("Not converged after tick {}", next.ticks());
                next
            }
            Transition::Done(result) => {
                match &result {
                    PollResult::Success { ticks, .. } => {
                        info!("Converged after {} ticks in {:?}", ticks, start.elapsed())
                    }
                    PollResult::FatalError { detail, ticks } => {
                        warn!("Mismatch on tick {}: {}", ticks, detail)
                    }
                    PollResult::Timeout { .. } => {}
                }
                return result;
            }
        };
    }
}

fn timed_out<S, E: Display>(state: PollState<E>, start: Instant) -> PollResult<S, E> {
    let elapsed = start.elapsed();
    match state.last_fetch_error() {
        Some(e) => warn!(
            "Timed out after {} ticks in {:?}; last fetch error: {}",
            state.ticks(),
            elapsed,
            e
        ),
        None => warn!("Timed out after {} ticks in {:?}", state.ticks(), elapsed),
    }
    state.time_out(elapsed)
}
