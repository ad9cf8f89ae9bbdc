//! # State Store
//!
//! The guarded container of the canonical [`VehicleState`].
//!
//! Every access is a complete critical section: a snapshot is copied out
//! under the lock, a delta is merged and clamped under the lock. No caller
//! ever holds the lock across a network exchange.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::{StateDelta, VehicleState};

/// Guarded read/merge access to the canonical state.
///
/// Implementations must make each call atomic with respect to every other
/// call on the same state, including calls from other processes when the
/// state is shared.
pub trait StateStore: Send + Sync {
    /// Copies the whole state out under the guard.
    fn read_snapshot(&self) -> VehicleState;

    /// Applies `delta` and re-establishes the range invariants.
    fn merge(&self, delta: &StateDelta);

    /// Sets the shutdown flag. Idempotent.
    fn mark_shutdown(&self);

    /// Returns the shutdown flag.
    fn is_shutdown(&self) -> bool {
        self.read_snapshot().shutdown
    }
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn read_snapshot(&self) -> VehicleState {
        (**self).read_snapshot()
    }

    fn merge(&self, delta: &StateDelta) {
        (**self).merge(delta);
    }

    fn mark_shutdown(&self) {
        (**self).mark_shutdown();
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }
}

/// In-process state store.
///
/// Used by tests and by setups that do not need external observers.
#[derive(Debug, Default)]
pub struct LocalStateStore {
    state: Mutex<VehicleState>,
}

impl LocalStateStore {
    /// Creates a store holding [`VehicleState::initial`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(VehicleState::initial())
    }

    /// Creates a store holding `state`.
    #[must_use]
    pub fn with_state(state: VehicleState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for LocalStateStore {
    fn read_snapshot(&self) -> VehicleState {
        *self.state.lock()
    }

    fn merge(&self, delta: &StateDelta) {
        self.state.lock().merge(delta);
    }

    fn mark_shutdown(&self) {
        self.state.lock().mark_shutdown();
    }
}
