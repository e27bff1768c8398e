//! Rendering surface seam.
//!
//! The session never draws; decoded pixels flow from the transport's
//! decoder straight into whatever implements [`RenderSurface`]. The
//! session only tells the surface about lifecycle changes and asks it
//! which full-color format it would rather receive.

use bytes::Bytes;

use crate::pixels::PixelFormat;
use crate::types::{LedState, Point};

/// Host-side rendering target (a window, an offscreen buffer, a test
/// double).
pub trait RenderSurface {
    /// Configure the surface once the init event reveals the remote
    /// geometry. Called exactly once, before any other method.
    fn initialise(&mut self, width: u16, height: u16, name: &str, server_format: &PixelFormat);

    /// The format this surface prefers for full-color sessions, typically
    /// whatever its framebuffer stores natively. Valid after
    /// [`RenderSurface::initialise`].
    fn preferred_format(&self) -> PixelFormat;

    /// The remote desktop changed size.
    fn resize(&mut self, width: u16, height: u16);

    /// The remote desktop was renamed.
    fn set_name(&mut self, name: &str);

    /// New cursor shape (RGBA pixels, row-major).
    fn set_cursor(&mut self, width: u16, height: u16, hotspot: Point, data: Bytes);

    /// Server-side clipboard contents.
    fn cut_text(&mut self, text: Bytes);

    /// Keyboard lock indicators changed.
    fn set_led_state(&mut self, state: LedState);

    /// Ring the bell.
    fn bell(&mut self);

    /// Present everything decoded so far. Called when an update cycle
    /// completes, and by the redraw watchdog while a slow cycle is still
    /// in flight.
    fn flush(&mut self);
}
