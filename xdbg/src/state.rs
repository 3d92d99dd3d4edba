//! CAS-atomic lifecycle state machine.
//!
//! Every transition is a single `compare_exchange` on one atomic word;
//! on failure the caller re-reads the current state and picks the
//! correct error or idempotent no-op rather than retrying blindly. This
//! keeps the hot path lock-free and guarantees `Stopped` is absorbing
//! even under concurrent callers.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`crate::server::DebugServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed, never started.
    Created = 0,
    /// Running, trigger watcher active, not accepting connections.
    Started = 1,
    /// Running, listener open, accepting connections.
    Listening = 2,
    /// Terminally shut down.
    Stopped = 3,
}

impl LifecycleState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Started,
            2 => Self::Listening,
            _ => Self::Stopped,
        }
    }
}

/// Atomic holder for [`LifecycleState`], with CAS-based transition helpers.
#[derive(Debug)]
pub struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    /// Creates a new holder in [`LifecycleState::Created`].
    pub const fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Created as u8))
    }

    /// Loads the current state.
    pub fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Attempts `from -> to`; returns `true` on success.
    pub fn try_transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Rolls a failed `Listening` setup back to `Started`, but only if the
    /// state is still `Listening` — a concurrent `Stop` must never be
    /// undone by this rollback.
    pub fn rollback_listening_to_started(&self) -> bool {
        self.try_transition(LifecycleState::Listening, LifecycleState::Started)
    }

    /// CAS loop that elects exactly one caller to perform the `Stopped`
    /// transition. Returns `true` if this caller was elected (and must
    /// perform the teardown); `false` if the server was already
    /// `Stopped` (teardown already happened or is in progress elsewhere).
    pub fn elect_stopper(&self) -> bool {
        loop {
            let current = self.load();
            if current == LifecycleState::Stopped {
                return false;
            }
            if self.try_transition(current, LifecycleState::Stopped) {
                return true;
            }
        }
    }
}

impl Default for AtomicLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_created() {
        assert_eq!(AtomicLifecycle::new().load(), LifecycleState::Created);
    }

    #[test]
    fn valid_transition_succeeds() {
        let s = AtomicLifecycle::new();
        assert!(s.try_transition(LifecycleState::Created, LifecycleState::Started));
        assert_eq!(s.load(), LifecycleState::Started);
    }

    #[test]
    fn transition_from_wrong_state_fails() {
        let s = AtomicLifecycle::new();
        assert!(!s.try_transition(LifecycleState::Listening, LifecycleState::Started));
        assert_eq!(s.load(), LifecycleState::Created);
    }

    #[test]
    fn stopped_is_absorbing() {
        let s = AtomicLifecycle::new();
        assert!(s.elect_stopper());
        assert_eq!(s.load(), LifecycleState::Stopped);
        // A second elect must not re-elect.
        assert!(!s.elect_stopper());
        assert_eq!(s.load(), LifecycleState::Stopped);
    }

    #[test]
    fn rollback_only_applies_from_listening() {
        let s = AtomicLifecycle::new();
        s.try_transition(LifecycleState::Created, LifecycleState::Started);
        // Not currently Listening: rollback must be a no-op.
        assert!(!s.rollback_listening_to_started());
        assert_eq!(s.load(), LifecycleState::Started);

        s.try_transition(LifecycleState::Started, LifecycleState::Listening);
        assert!(s.rollback_listening_to_started());
        assert_eq!(s.load(), LifecycleState::Started);
    }

    #[test]
    fn concurrent_stop_wins_over_rollback() {
        let s = AtomicLifecycle::new();
        s.try_transition(LifecycleState::Created, LifecycleState::Started);
        s.try_transition(LifecycleState::Started, LifecycleState::Listening);
        // A concurrent Stop flips to Stopped before the rollback runs.
        assert!(s.elect_stopper());
        assert!(!s.rollback_listening_to_started());
        assert_eq!(s.load(), LifecycleState::Stopped);
    }
}
