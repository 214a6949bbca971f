//! Completion barriers that tell a run when every item is finished.
//!
//! Two flavours exist, one per strategy:
//!
//! - [`PollingCounter`] counts items. The caller sleeps a fixed interval
//!   between checks of the outstanding count.
//! - [`WaitGroup`] counts phases. The caller parks on a condvar and is woken
//!   the moment the count drops to zero.
//!
//! Both can be aborted with a fatal error, which `wait` then returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::core::PipelineError;

/// Default polling interval for [`PollingCounter::wait`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Join point for a pipeline run.
pub trait CompletionBarrier: Send + Sync {
    /// Register `n` more units of outstanding work.
    fn add(&self, n: usize);

    /// Mark one unit finished.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvariantViolation` if nothing is outstanding.
    fn done(&self) -> Result<(), PipelineError>;

    /// Record a fatal error and release any waiter. The first error wins.
    fn abort(&self, error: PipelineError);

    /// Block until nothing is outstanding.
    ///
    /// # Errors
    ///
    /// Returns the error passed to [`CompletionBarrier::abort`], if any.
    fn wait(&self) -> Result<(), PipelineError>;

    /// Units still outstanding.
    fn outstanding(&self) -> usize;
}

fn underflow(kind: &str) -> PipelineError {
    PipelineError::InvariantViolation(format!("{kind} finished more units than were added"))
}

/// Shared counter checked on a fixed interval.
#[derive(Debug)]
pub struct PollingCounter {
    outstanding: AtomicUsize,
    fault: Mutex<Option<PipelineError>>,
    interval: Duration,
}

impl PollingCounter {
    /// Counter whose `wait` rechecks every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            fault: Mutex::new(None),
            interval,
        }
    }
}

impl Default for PollingCounter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl CompletionBarrier for PollingCounter {
    fn add(&self, n: usize) {
        self.outstanding.fetch_add(n, Ordering::AcqRel);
    }

    fn done(&self) -> Result<(), PipelineError> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| underflow("polling counter"))
    }

    fn abort(&self, error: PipelineError) {
        self.fault.lock().get_or_insert(error);
    }

    fn wait(&self) -> Result<(), PipelineError> {
        loop {
            if let Some(err) = self.fault.lock().clone() {
                return Err(err);
            }
            if self.outstanding.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
            std::thread::sleep(self.interval);
        }
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct GroupState {
    outstanding: usize,
    fault: Option<PipelineError>,
}

/// Counted join over a mutex and condvar.
#[derive(Debug, Default)]
pub struct WaitGroup {
    state: Mutex<GroupState>,
    settled: Condvar,
}

impl WaitGroup {
    /// Empty wait group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionBarrier for WaitGroup {
    fn add(&self, n: usize) {
        self.state.lock().outstanding += n;
    }

    fn done(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        state.outstanding = state
            .outstanding
            .checked_sub(1)
            .ok_or_else(|| underflow("wait group"))?;
        if state.outstanding == 0 {
            self.settled.notify_all();
        }
        Ok(())
    }

    fn abort(&self, error: PipelineError) {
        let mut state = self.state.lock();
        state.fault.get_or_insert(error);
        self.settled.notify_all();
    }

    fn wait(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        loop {
            if let Some(err) = state.fault.clone() {
                return Err(err);
            }
            if state.outstanding == 0 {
                return Ok(());
            }
            self.settled.wait(&mut state);
        }
    }

    fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }
}
