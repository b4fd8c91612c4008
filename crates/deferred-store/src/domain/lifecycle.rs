//! # Adapter Lifecycle
//!
//! State Machine:
//! ```text
//! [NOT_READY] ──open requested──→ [READYING] ──open ok──→ [READY]
//!     ↑  ↑                             │                     │
//!     │  └────────── open failed ──────┘              close requested
//!     │                                                      │
//!     └────────────── close ok ──────── [CLOSING] ←──────────┘
//!                                           │
//!                                    close failed ──→ [READY]
//! ```
//!
//! Every state except `Ready` defers operations into the queue.

use crate::error::DeferredError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Wrapped store not open; operations are queued.
    #[default]
    NotReady,
    /// Open in progress; operations are queued.
    Readying,
    /// Wrapped store open; operations are forwarded directly.
    Ready,
    /// Close in progress; operations are queued for a future open.
    Closing,
}

impl LifecycleState {
    /// Whether operations issued in this state go to the queue.
    pub fn defers_operations(self) -> bool {
        !matches!(self, LifecycleState::Ready)
    }

    /// Next state for `event`, or `InvalidState` if the request is illegal here.
    ///
    /// Pure function: the dispatcher applies the result under its lock.
    pub fn transition(self, event: LifecycleEvent) -> Result<LifecycleState, DeferredError> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        match (self, event) {
            (S::NotReady, E::OpenRequested) => Ok(S::Readying),
            (S::Readying, E::OpenSucceeded) => Ok(S::Ready),
            (S::Readying, E::OpenFailed) => Ok(S::NotReady),

            (S::Ready, E::CloseRequested) => Ok(S::Closing),
            (S::Closing, E::CloseSucceeded) => Ok(S::NotReady),
            (S::Closing, E::CloseFailed) => Ok(S::Ready),

            // Closing a store that was never opened still reaches the store,
            // but there is no ready state to leave and no outcome to apply.
            (S::NotReady, E::CloseRequested) => Ok(S::NotReady),

            (state, event) => Err(DeferredError::InvalidState {
                operation: event.operation(),
                state,
            }),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::NotReady => "not ready",
            LifecycleState::Readying => "readying",
            LifecycleState::Ready => "ready",
            LifecycleState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Events driving lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    OpenRequested,
    OpenSucceeded,
    OpenFailed,
    CloseRequested,
    CloseSucceeded,
    CloseFailed,
}

impl LifecycleEvent {
    fn operation(self) -> &'static str {
        match self {
            LifecycleEvent::OpenRequested
            | LifecycleEvent::OpenSucceeded
            | LifecycleEvent::OpenFailed => "open",
            LifecycleEvent::CloseRequested
            | LifecycleEvent::CloseSucceeded
            | LifecycleEvent::CloseFailed => "close",
        }
    }
}

/// Snapshot broadcast to iterators and observers on every transition.
///
/// `session` increments on each successful open, so an iterator bound during
/// an earlier session can tell it is stale after a close/re-open cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub state: LifecycleState,
    pub session: u64,
}

impl Readiness {
    /// Whether the adapter is ready in the given session.
    pub fn is_ready_in(&self, session: u64) -> bool {
        self.state == LifecycleState::Ready && self.session == session
    }
}
