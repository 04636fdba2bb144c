//! Cooperative play control for one run.
//!
//! A run consults its [`RunControl`] only at checkpoint boundaries. While
//! the state is [`PlayState::Suspended`] the run's worker thread blocks on a
//! condition variable; [`RunControl::resume`] and [`RunControl::cancel`]
//! wake it. Spurious wakeups re-check the state. Cancellation never
//! interrupts a batch in flight.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Requested execution state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayState {
    /// Keep running batches.
    Running,
    /// Block at the next checkpoint until resumed or canceled.
    Suspended,
    /// Stop at the next checkpoint. Terminal.
    Canceled,
}

/// What the run should do after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Run the next batch.
    Continue,
    /// Finish without running another batch.
    Cancel,
}

/// Shared play state plus the condition variable blocked runs wait on.
#[derive(Debug)]
pub struct RunControl {
    state: Mutex<PlayState>,
    wake: Condvar,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new(PlayState::Running)
    }
}

impl RunControl {
    /// Control starting in `initial`.
    pub const fn new(initial: PlayState) -> Self {
        Self {
            state: Mutex::new(initial),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> PlayState {
        *self.lock()
    }

    /// Whether the run has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.state() == PlayState::Canceled
    }

    /// Ask the run to block at its next checkpoint. No effect once canceled.
    pub fn suspend(&self) {
        let mut state = self.lock();
        if *state == PlayState::Running {
            *state = PlayState::Suspended;
        }
    }

    /// Let a suspended run continue. No effect once canceled.
    pub fn resume(&self) {
        let mut state = self.lock();
        if *state == PlayState::Suspended {
            *state = PlayState::Running;
        }
        drop(state);
        self.wake.notify_all();
    }

    /// Ask the run to stop at its next checkpoint, waking it if suspended.
    pub fn cancel(&self) {
        *self.lock() = PlayState::Canceled;
        self.wake.notify_all();
    }

    /// Called by the run at every checkpoint boundary.
    ///
    /// Blocks while suspended; returns [`Checkpoint::Cancel`] once canceled.
    pub fn checkpoint(&self) -> Checkpoint {
        let mut state = self.lock();
        if *state == PlayState::Suspended {
            tracing::info!("run suspended");
            while *state == PlayState::Suspended {
                state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            tracing::info!("run resumed");
        }
        match *state {
            PlayState::Canceled => Checkpoint::Cancel,
            PlayState::Running | PlayState::Suspended => Checkpoint::Continue,
        }
    }
}
