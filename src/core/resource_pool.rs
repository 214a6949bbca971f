//! Counting resource pool shared by every stage worker.
//!
//! A pool bounds how many items may hold one of its units at once. Blocking
//! callers (persistent stage threads) park on a `parking_lot::Condvar`; async
//! callers (fan-out tasks) await a `tokio::sync::Notify`. Every release wakes
//! at most one waiter of each kind, and waiters always recheck the count under
//! the lock, so `held` never exceeds `capacity`.

use std::fmt;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::core::PipelineError;

/// Which shared resource a pool hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Workshop slot, held from Admission through Final Check.
    Bay,
    /// Mechanic, held only during Repair.
    Technician,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bay => f.write_str("bay"),
            Self::Technician => f.write_str("technician"),
        }
    }
}

/// Unit accounting protected by the pool mutex.
#[derive(Debug, Default)]
struct PoolState {
    held: u32,
    peak: u32,
}

/// Counting semaphore with invariant checks and a high-water mark.
pub struct ResourcePool {
    kind: ResourceKind,
    capacity: u32,
    state: Mutex<PoolState>,
    /// Signaled on release for threads blocked in [`ResourcePool::acquire`].
    released: Condvar,
    /// Signaled on release for tasks suspended in [`ResourcePool::acquire_async`].
    released_async: Notify,
}

impl ResourcePool {
    /// Create a pool with `capacity` units.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` if `capacity` is zero.
    pub fn new(kind: ResourceKind, capacity: u32) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "{kind} capacity must be greater than 0"
            )));
        }
        Ok(Self {
            kind,
            capacity,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
            released_async: Notify::new(),
        })
    }

    /// Resource kind handed out by this pool.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Total units.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units currently held.
    #[must_use]
    pub fn held(&self) -> u32 {
        self.state.lock().held
    }

    /// Units currently free.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.capacity - self.held()
    }

    /// Highest number of units held at once since creation.
    #[must_use]
    pub fn peak(&self) -> u32 {
        self.state.lock().peak
    }

    fn reserve(&self, state: &mut PoolState) {
        state.held += 1;
        state.peak = state.peak.max(state.held);
        tracing::trace!(resource = %self.kind, held = state.held, "unit acquired");
    }

    /// Reserve a unit if one is free. Never blocks.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.held >= self.capacity {
            return false;
        }
        self.reserve(&mut state);
        true
    }

    /// Block the calling thread until a unit is free, then reserve it.
    pub fn acquire(&self) {
        let mut state = self.state.lock();
        while state.held >= self.capacity {
            tracing::trace!(resource = %self.kind, held = state.held, "waiting for unit");
            self.released.wait(&mut state);
        }
        self.reserve(&mut state);
    }

    /// Suspend the calling task until a unit is free, then reserve it.
    pub async fn acquire_async(&self) {
        loop {
            // Created before the check so a release in between leaves a stored permit.
            let notified = self.released_async.notified();
            if self.try_acquire() {
                return;
            }
            notified.await;
        }
    }

    /// Return a unit to the pool, waking at most one waiter.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvariantViolation` if no unit is held; the
    /// caller released without a matching acquire.
    pub fn release(&self) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock();
            if state.held == 0 {
                return Err(PipelineError::InvariantViolation(format!(
                    "{} released with no units held (capacity {})",
                    self.kind, self.capacity
                )));
            }
            state.held -= 1;
            tracing::trace!(resource = %self.kind, held = state.held, "unit released");
        }
        self.released.notify_one();
        self.released_async.notify_one();
        Ok(())
    }
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourcePool")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("held", &state.held)
            .field("peak", &state.peak)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ResourcePool::new(ResourceKind::Bay, 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_acquire_release_accounting() {
        let pool = ResourcePool::new(ResourceKind::Technician, 2).unwrap();
        pool.acquire();
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());
        assert_eq!(pool.held(), 2);
        assert_eq!(pool.available(), 0);

        pool.release().unwrap();
        pool.release().unwrap();
        assert_eq!(pool.held(), 0);
        assert_eq!(pool.peak(), 2);
    }

    #[test]
    fn test_release_without_acquire_is_invariant_violation() {
        let pool = ResourcePool::new(ResourceKind::Bay, 3).unwrap();
        let err = pool.release().unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
        assert_eq!(pool.held(), 0);
    }

    #[test]
    fn test_blocking_acquire_wakes_on_release() {
        let pool = Arc::new(ResourcePool::new(ResourceKind::Bay, 1).unwrap());
        pool.acquire();

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let pool = Arc::clone(&pool);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                pool.acquire();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        pool.release().unwrap();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(pool.held(), 1);
        assert_eq!(pool.peak(), 1);
    }

    #[tokio::test]
    async fn test_async_acquire_wakes_on_release() {
        let pool = Arc::new(ResourcePool::new(ResourceKind::Technician, 1).unwrap());
        pool.acquire_async().await;

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.acquire_async().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        pool.release().unwrap();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert_eq!(pool.held(), 1);
    }
}
