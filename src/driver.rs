//! Async run loop for tokio hosts.
//!
//! [`SessionDriver`] owns a [`Session`] wired to channel endpoints and
//! multiplexes its three inputs in one task: decoded server events from a
//! bounded channel, a `watch`-based stop signal, and the redraw watchdog
//! deadline. The transport side holds the matching [`DriverHandles`]: it
//! feeds events in, drains outbound [`ClientMessage`] values, and
//! publishes bandwidth samples.
//!
//! Callback-style hosts that already have an event loop use
//! [`Session::process_pending`] directly instead.

use tokio::sync::{mpsc, watch};
use tokio::time::sleep_until;
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{self, ServerEvent};
use crate::messages::{ClientMessage, MessageSender};
use crate::policy::BandwidthSample;
use crate::session::Session;
use crate::surface::RenderSurface;

/// Backlog of decoded events the transport may run ahead of the session.
const EVENT_QUEUE_DEPTH: usize = 64;

/// The session type a driver runs: channel-backed writer, `watch`-backed
/// bandwidth probe.
pub type DriverSession<S> = Session<MessageSender, S, watch::Receiver<BandwidthSample>>;

// ── DriverHandles ────────────────────────────────────────────────

/// The transport-facing half of a driver.
pub struct DriverHandles {
    /// Feed decoded server events here. Dropping the sender reads as end
    /// of stream.
    pub events: mpsc::Sender<ServerEvent>,
    /// Outbound protocol messages, in emission order. The transport must
    /// put them on the wire in this order.
    pub messages: mpsc::UnboundedReceiver<ClientMessage>,
    /// Publish throughput measurements here; the session reads the
    /// latest value after each completed update.
    pub bandwidth: watch::Sender<BandwidthSample>,
    /// Send `true` to stop the driver.
    pub stop: watch::Sender<bool>,
}

// ── SessionDriver ────────────────────────────────────────────────

/// Runs a [`Session`] as a tokio task.
pub struct SessionDriver<S> {
    session: DriverSession<S>,
    events: mpsc::Receiver<ServerEvent>,
    stop: watch::Receiver<bool>,
}

impl<S: RenderSurface> SessionDriver<S> {
    /// Build a driver and the handles its transport talks through.
    pub fn new(config: SessionConfig, surface: S) -> (Self, DriverHandles) {
        let (writer, messages) = MessageSender::channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (bandwidth_tx, bandwidth_rx) = watch::channel(BandwidthSample::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let driver = SessionDriver {
            session: Session::new(config, writer, surface, bandwidth_rx),
            events: event_rx,
            stop: stop_rx,
        };
        let handles = DriverHandles {
            events: event_tx,
            messages,
            bandwidth: bandwidth_tx,
            stop: stop_tx,
        };
        (driver, handles)
    }

    pub fn session(&self) -> &DriverSession<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DriverSession<S> {
        &mut self.session
    }

    /// Run until the stop signal, end of stream, or a fatal error.
    ///
    /// A stop request is a clean shutdown and returns `Ok`. Fatal errors
    /// are logged here, once, and returned.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_loop().await;
        match &result {
            Ok(()) => info!("session driver stopped"),
            Err(SessionError::EndOfStream) => info!("connection closed by server"),
            Err(e) => error!(error = %e, "session failed"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<(), SessionError> {
        loop {
            // Re-read each turn: dispatching an event arms or disarms it.
            let deadline = self
                .session
                .watchdog_deadline()
                .map(tokio::time::Instant::from_std);

            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        return Err(SessionError::EndOfStream);
                    };
                    events::dispatch(&mut self.session, event)?;
                }
                changed = self.stop.changed() => {
                    // A dropped stop handle reads as a stop request.
                    if changed.is_err() || *self.stop.borrow() {
                        return Ok(());
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)),
                        if deadline.is_some() => {
                    self.session.watchdog_elapsed();
                }
            }
        }
    }
}
