//! # rfb-session
//!
//! Client-side session controller for a remote-framebuffer (RFB/VNC)
//! display protocol.
//!
//! This crate contains:
//! - **Flow control**: [`UpdateFlow`] — request pacing, safe pixel-format
//!   changes, continuous-updates bracketing
//! - **Adaptive policy**: bandwidth-driven encoding/quality/color
//!   selection via [`policy::auto_select`]
//! - **Session**: [`Session`] — the event handlers tying flow, policy,
//!   state and rendering together
//! - **Dispatch**: [`DispatchGate`] single-permit reentrancy guard and
//!   the [`EventSource`]/[`EventPump`] host-loop seams
//! - **Driver**: [`SessionDriver`] — tokio run loop for async hosts
//! - **Data model**: [`ServerState`], [`PixelFormat`], [`Encoding`],
//!   geometry and flag types
//! - **Error**: [`SessionError`] — typed, `thiserror`-based error
//!   hierarchy with a distinguished termination signal
//!
//! Decode/render, socket transport and the security handshake live
//! outside this crate: a transport decodes the server's byte stream into
//! [`ServerEvent`] values and puts [`ClientMessage`] values on the wire;
//! a host window implements [`RenderSurface`].

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod encodings;
pub mod error;
pub mod events;
pub mod flow;
pub mod messages;
pub mod pixels;
pub mod policy;
pub mod server;
pub mod session;
pub mod surface;
pub mod types;
pub mod watchdog;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::SessionConfig;
pub use dispatch::{DispatchGate, DispatchPermit, EventPump, EventSource, blocking_pump};
pub use driver::{DriverHandles, DriverSession, SessionDriver};
pub use encodings::Encoding;
pub use error::SessionError;
pub use events::{ProtocolEventSink, ServerEvent};
pub use flow::UpdateFlow;
pub use messages::{ClientMessage, MessageSender, ProtocolWriter};
pub use pixels::{ColourLevel, PixelFormat};
pub use policy::{BandwidthProbe, BandwidthSample, PolicyContext, PolicyDecision};
pub use server::{ServerCapabilities, ServerState};
pub use session::{Session, SessionInfo, SessionStats};
pub use surface::RenderSurface;
pub use types::{
    FenceFlags, LedState, Point, ProtocolVersion, Rect, ResizeReason, ResizeResult, Screen,
    ScreenLayout,
};
pub use watchdog::RedrawWatchdog;
