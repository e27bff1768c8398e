//! Host event-loop integration.
//!
//! The session is single-threaded and cooperative: it processes one
//! server message at a time, hands control back to the host loop between
//! messages, and may re-enter the host loop *inside* a message when the
//! decoder has to wait for bytes. That nesting is what [`DispatchGate`]
//! exists for: while a blocking wait pumps the host loop, the socket can
//! signal readable again and the host may call back into the session; the
//! gate turns that inner call into a no-op so the outer dispatch finishes
//! the work exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SessionError;
use crate::events::ServerEvent;

// ── Seams ────────────────────────────────────────────────────────

/// Decoded-message source implemented by the transport.
pub trait EventSource {
    /// Decode the next server message. Implementations that run out of
    /// buffered bytes must wait via [`blocking_pump`] so the host loop
    /// stays live and termination is honored.
    fn next_event(&mut self, pump: &mut dyn EventPump) -> Result<ServerEvent, SessionError>;

    /// True when at least part of another message is already buffered,
    /// so consuming it will not block.
    fn ready(&self) -> bool;
}

/// One iteration of the host's event loop, plus its shutdown flag.
pub trait EventPump {
    /// Run a single pass: window events, timers, input.
    fn pump(&mut self);

    /// The host asked the session to stop.
    fn terminated(&self) -> bool;
}

/// Wait-loop body for [`EventSource`] implementations: keep the host
/// loop breathing, and turn a shutdown request into the distinguished
/// termination signal.
pub fn blocking_pump(pump: &mut dyn EventPump) -> Result<(), SessionError> {
    pump.pump();
    if pump.terminated() {
        return Err(SessionError::Terminated);
    }
    Ok(())
}

// ── DispatchGate ─────────────────────────────────────────────────

/// Single-permit gate guarding the dispatch loop against reentry.
#[derive(Debug, Default)]
pub struct DispatchGate {
    engaged: Arc<AtomicBool>,
}

impl DispatchGate {
    pub fn new() -> Self {
        DispatchGate::default()
    }

    /// Take the permit, or `None` while dispatch is already running.
    pub fn try_enter(&self) -> Option<DispatchPermit> {
        self.engaged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| DispatchPermit {
                engaged: Arc::clone(&self.engaged),
            })
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }
}

/// Proof of exclusive dispatch. Releases the gate when dropped, on every
/// exit path.
#[derive(Debug)]
pub struct DispatchPermit {
    engaged: Arc<AtomicBool>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        self.engaged.store(false, Ordering::SeqCst);
    }
}
