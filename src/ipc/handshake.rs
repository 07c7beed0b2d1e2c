//! Per-connection readiness state machine.
//!
//! Every connection starts idle. The `ready` notification may only be emitted
//! after the `initialize` response has been fully written AND flushed to the
//! transport; a catalog list-changed event that fires before that point is
//! coalesced into a single pending notification and replayed right after
//! `ready`. All transitions latch: once ready, always ready.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    InitializeObserved,
    InitializeResponseFlushed,
    ReadyEmitted,
}

/// Notifications the state machine tells the connection to emit, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeSignal {
    Ready,
    ListChanged,
}

#[derive(Debug)]
pub struct Handshake {
    saw_initialize: bool,
    init_response_flushed: bool,
    ready_notified: bool,
    pending_list_changed: bool,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            saw_initialize: false,
            init_response_flushed: false,
            ready_notified: false,
            pending_list_changed: false,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        if self.ready_notified {
            HandshakePhase::ReadyEmitted
        } else if self.init_response_flushed {
            HandshakePhase::InitializeResponseFlushed
        } else if self.saw_initialize {
            HandshakePhase::InitializeObserved
        } else {
            HandshakePhase::Idle
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_notified
    }

    /// Record that an `initialize` request arrived. Repeats are harmless.
    pub fn observe_initialize(&mut self) {
        self.saw_initialize = true;
    }

    /// Record that the `initialize` response was written and flushed.
    ///
    /// Returns the notifications to emit now: `Ready` exactly once, followed
    /// by at most one coalesced `ListChanged`. Calling this without a prior
    /// `observe_initialize` returns nothing and moves no state.
    pub fn note_response_flushed(&mut self) -> Vec<HandshakeSignal> {
        if !self.saw_initialize || self.ready_notified {
            return Vec::new();
        }
        self.init_response_flushed = true;
        self.ready_notified = true;
        let mut signals = vec![HandshakeSignal::Ready];
        if self.pending_list_changed {
            self.pending_list_changed = false;
            signals.push(HandshakeSignal::ListChanged);
        }
        signals
    }

    /// A catalog change happened. Before ready it coalesces into one pending
    /// replay; after ready the caller should emit immediately.
    ///
    /// Returns true when the caller should emit a list-changed notification
    /// right now.
    pub fn mark_list_changed(&mut self) -> bool {
        if self.ready_notified {
            true
        } else {
            self.pending_list_changed = true;
            false
        }
    }

    pub fn has_pending_list_changed(&self) -> bool {
        self.pending_list_changed
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for the `ready` notification.
pub fn ready_payload() -> Value {
    serde_json::json!({"event": "ready"})
}

/// Payload for the `catalog.listChanged` notification.
pub fn list_changed_payload() -> Value {
    serde_json::json!({"event": "catalog.listChanged"})
}
