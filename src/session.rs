//! The client session controller.
//!
//! [`Session`] ties the pieces together: it implements
//! [`ProtocolEventSink`] for every decoded server event, drives
//! [`UpdateFlow`] at the protocol's safe points, applies the bandwidth
//! policy after each completed update, and forwards presentation events
//! to the [`RenderSurface`]. It is single-threaded by construction;
//! callback-style hosts enter through [`Session::process_pending`], async
//! hosts through [`crate::driver::SessionDriver`].

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::dispatch::{DispatchGate, EventPump, EventSource};
use crate::encodings::Encoding;
use crate::error::SessionError;
use crate::events::{self, ProtocolEventSink};
use crate::flow::UpdateFlow;
use crate::messages::ProtocolWriter;
use crate::pixels::PixelFormat;
use crate::policy::{self, BandwidthProbe, PolicyContext};
use crate::server::ServerState;
use crate::surface::RenderSurface;
use crate::types::{
    FenceFlags, LedState, Point, ProtocolVersion, Rect, ResizeReason, ResizeResult, ScreenLayout,
};
use crate::watchdog::RedrawWatchdog;

// ── Statistics and info ──────────────────────────────────────────

/// Running counters for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Completed update cycles.
    pub updates: u64,
    /// Pixels decoded across all update rectangles.
    pub pixels: u64,
}

/// Structured connection snapshot for host UIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub width: u16,
    pub height: u16,
    /// The committed wire format.
    pub pixel_format: PixelFormat,
    /// The server's native format, as announced at init.
    pub server_default_format: PixelFormat,
    /// The encoding currently at the head of the preference list.
    pub requested_encoding: Encoding,
    /// The last non-CopyRect encoding the server actually used.
    pub last_server_encoding: Option<Encoding>,
    pub version: ProtocolVersion,
}

// ── Session ──────────────────────────────────────────────────────

/// Client half of the update/format state machine for one connection.
pub struct Session<W, S, B> {
    config: SessionConfig,
    server: ServerState,
    flow: UpdateFlow,
    watchdog: RedrawWatchdog,
    gate: DispatchGate,
    writer: W,
    surface: S,
    probe: B,
    stats: SessionStats,
    last_server_encoding: Option<Encoding>,
    server_default_format: PixelFormat,
    initialised: bool,
}

impl<W, S, B> Session<W, S, B>
where
    W: ProtocolWriter,
    S: RenderSurface,
    B: BandwidthProbe,
{
    pub fn new(config: SessionConfig, writer: W, surface: S, probe: B) -> Self {
        let server = ServerState::new(&config);
        let flow = UpdateFlow::new(&config);
        Session {
            config,
            server,
            flow,
            watchdog: RedrawWatchdog::default(),
            gate: DispatchGate::new(),
            writer,
            surface,
            probe,
            stats: SessionStats::default(),
            last_server_encoding: None,
            server_default_format: PixelFormat::rgb888(),
            initialised: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn server(&self) -> &ServerState {
        &self.server
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Structured snapshot of the connection for display purposes.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            name: self.server.name().to_owned(),
            width: self.server.width(),
            height: self.server.height(),
            pixel_format: *self.server.pixel_format(),
            server_default_format: self.server_default_format,
            requested_encoding: self.flow.encoding(),
            last_server_encoding: self.last_server_encoding,
            version: self.server.version(),
        }
    }

    // ── Host-driven operations ───────────────────────────────────

    /// Process buffered server messages, one at a time, yielding to the
    /// host loop between messages.
    ///
    /// Safe to call from a socket-readable callback: if a blocking wait
    /// deeper in the stack pumped the host loop and the readable signal
    /// re-entered, the inner call returns immediately and the outer
    /// dispatch finishes the work. Fatal errors are logged here, once,
    /// and returned; [`SessionError::Terminated`] is a clean shutdown,
    /// not a failure.
    pub fn process_pending(
        &mut self,
        source: &mut dyn EventSource,
        pump: &mut dyn EventPump,
    ) -> Result<(), SessionError> {
        let Some(_permit) = self.gate.try_enter() else {
            return Ok(());
        };

        let result = self.run_dispatch(source, pump);
        match &result {
            Ok(()) => {}
            Err(e) if e.is_termination() => info!("session terminated by host"),
            Err(SessionError::EndOfStream) => info!("connection closed by server"),
            Err(e) => error!(error = %e, "session failed"),
        }
        result
    }

    fn run_dispatch(
        &mut self,
        source: &mut dyn EventSource,
        pump: &mut dyn EventPump,
    ) -> Result<(), SessionError> {
        loop {
            let event = source.next_event(pump)?;
            events::dispatch(self, event)?;
            // One message per pass keeps the host loop responsive even
            // when the server floods the stream.
            pump.pump();
            if pump.terminated() || !source.ready() {
                return Ok(());
            }
        }
    }

    /// Ask the server to resend the whole framebuffer.
    pub fn refresh_framebuffer(&mut self) -> Result<(), SessionError> {
        self.flow.request_full_refresh();
        // Off the continuous stream the next natural cycle picks the
        // flag up; on it, there is no next request, so ask now.
        if self.flow.continuous_updates() {
            self.request_cycle()?;
        }
        Ok(())
    }

    /// Apply a changed configuration mid-session.
    pub fn reconfigure(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        if !config.auto_select {
            self.flow.set_encoding(config.preferred_encoding);
        }
        self.server.set_compress_level(config.compress_level);
        // With the policy active the quality tier is its call; unset it
        // so the next evaluation re-picks from measurements.
        let quality = if config.auto_select {
            None
        } else {
            config.quality_level
        };
        self.server.set_quality_level(quality);

        self.flow.set_full_colour(config.full_colour);
        self.flow.set_colour_level(config.colour_level);
        self.flow.request_encoding_change();

        if self.initialised {
            let target = self.flow.target_format(self.surface.preferred_format());
            if target != *self.server.pixel_format() {
                self.flow.request_format_change();
                // Only the continuous stream offers a safe point to
                // inject a request; otherwise the change rides the next
                // natural cycle.
                if self.flow.continuous_updates() {
                    self.request_cycle()?;
                }
            }
        }
        self.config = config;
        Ok(())
    }

    /// Drive the redraw watchdog; hosts without the async driver call
    /// this from their timer tick.
    pub fn poll_watchdog(&mut self) {
        if self.watchdog.poll() {
            debug!("update cycle still in flight, flushing partial content");
            self.surface.flush();
        }
    }

    /// The watchdog's pending deadline, for hosts that multiplex timers.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Deadline-driven variant of [`Session::poll_watchdog`] for hosts
    /// that slept on [`Session::watchdog_deadline`] themselves: the
    /// pending deadline is treated as elapsed regardless of the local
    /// clock (timer wheels and test clocks may run ahead of it).
    pub fn watchdog_elapsed(&mut self) {
        if let Some(deadline) = self.watchdog.deadline()
            && self.watchdog.poll_at(deadline)
        {
            debug!("update cycle still in flight, flushing partial content");
            self.surface.flush();
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn request_cycle(&mut self) -> Result<(), SessionError> {
        let format = self.surface.preferred_format();
        self.flow
            .request_update_cycle(&self.server, format, &mut self.writer)
    }

    fn ensure_initialised(&self) -> Result<(), SessionError> {
        if self.initialised {
            Ok(())
        } else {
            Err(SessionError::ProtocolViolation("message before server init"))
        }
    }

    fn resize_framebuffer(&mut self) -> Result<(), SessionError> {
        // The continuous stream is scoped to a rectangle; follow the new
        // bounds or the server stops streaming the grown region.
        if self.flow.continuous_updates() {
            self.writer.enable_continuous_updates(
                true,
                Rect::spanning(self.server.width(), self.server.height()),
            )?;
        }
        self.surface
            .resize(self.server.width(), self.server.height());
        Ok(())
    }

    fn commit_pending_format(&mut self) {
        if let Some(format) = self.flow.complete_pending_format() {
            debug!(%format, "pixel format active");
            self.server.set_pixel_format(format);
        }
    }

    fn auto_select_format_and_encoding(&mut self) {
        let sample = self.probe.sample();
        let ctx = PolicyContext {
            current_encoding: self.flow.encoding(),
            quality_level: self.server.quality_level(),
            lossy_allowed: self.config.quality_level.is_some(),
            full_colour: self.flow.full_colour(),
            version: self.server.version(),
        };
        let decision = policy::auto_select(&sample, &ctx);

        if let Some(encoding) = decision.encoding {
            self.flow.set_encoding(encoding);
            self.flow.request_encoding_change();
        }
        if let Some(quality) = decision.quality_level {
            info!(
                kbps = sample.kbits_per_second,
                quality, "throughput changed, adjusting quality"
            );
            self.server.set_quality_level(Some(quality));
            self.flow.request_encoding_change();
        }
        if let Some(full_colour) = decision.full_colour {
            if full_colour {
                info!(
                    kbps = sample.kbits_per_second,
                    "throughput allows full color"
                );
            } else {
                info!(
                    kbps = sample.kbits_per_second,
                    "throughput too low for full color, using indexed palette"
                );
            }
            self.flow.set_full_colour(full_colour);
            self.flow.request_format_change();
        }
    }
}

// ── Event handlers ───────────────────────────────────────────────

impl<W, S, B> ProtocolEventSink for Session<W, S, B>
where
    W: ProtocolWriter,
    S: RenderSurface,
    B: BandwidthProbe,
{
    fn server_init(
        &mut self,
        width: u16,
        height: u16,
        name: String,
        format: PixelFormat,
        version: ProtocolVersion,
    ) -> Result<(), SessionError> {
        if self.initialised {
            return Err(SessionError::ProtocolViolation("duplicate server init"));
        }

        self.server.set_version(version);
        self.server.set_dimensions(width, height);
        self.server.set_name(&name);
        self.server.set_pixel_format(format);
        self.server_default_format = format;

        // Old servers race palette changes against in-flight cursor
        // rects; when the policy may flip modes later, start rich.
        if self.server.before_version(3, 8) && self.config.auto_select {
            self.flow.set_full_colour(true);
        }

        info!(name = %self.server.name(), width, height, %version, "session established");

        self.surface.initialise(width, height, &name, &format);
        self.initialised = true;

        self.flow.request_format_change();
        self.flow.request_encoding_change();
        self.request_cycle()?;

        // Nothing is in flight yet, so the change scheduled above
        // activates immediately and the first update already arrives in
        // the chosen format.
        let format = self
            .flow
            .complete_pending_format()
            .expect("initial update cycle always schedules a format change");
        self.server.set_pixel_format(format);
        Ok(())
    }

    fn set_desktop_size(&mut self, width: u16, height: u16) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.server.set_dimensions(width, height);
        self.resize_framebuffer()
    }

    fn set_extended_desktop_size(
        &mut self,
        reason: ResizeReason,
        result: ResizeResult,
        width: u16,
        height: u16,
        _layout: ScreenLayout,
    ) -> Result<(), SessionError> {
        self.ensure_initialised()?;

        // A rejected client request changes nothing remotely; log it and
        // carry on with the old geometry.
        if reason == ResizeReason::Client && result != ResizeResult::Success {
            error!(?result, "server rejected the requested desktop resize");
            return Ok(());
        }

        self.server.set_dimensions(width, height);
        self.resize_framebuffer()
    }

    fn set_name(&mut self, name: String) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        debug!(%name, "desktop renamed");
        self.server.set_name(&name);
        self.surface.set_name(&name);
        Ok(())
    }

    fn framebuffer_update_start(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.flow.update_started();
        // Ask for the next update right away; decoding this one and
        // transmitting the next then overlap.
        self.request_cycle()?;
        self.watchdog.arm();
        Ok(())
    }

    fn framebuffer_update_end(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.stats.updates += 1;
        self.watchdog.disarm();
        self.surface.flush();

        // A classic cycle boundary is a safe point: nothing sent before
        // the format switch can still be in flight.
        if !self.flow.continuous_updates() {
            self.commit_pending_format();
        }

        if self.flow.take_first_update()
            && self.config.continuous_updates
            && self.server.caps().continuous_updates
        {
            info!("enabling continuous updates");
            self.flow.enable_continuous();
            self.writer.enable_continuous_updates(
                true,
                Rect::spanning(self.server.width(), self.server.height()),
            )?;
        }

        if self.config.auto_select {
            self.auto_select_format_and_encoding();
        }
        Ok(())
    }

    fn data_rect(&mut self, rect: Rect, encoding: Encoding) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.stats.pixels += u64::from(rect.area());
        // CopyRect says nothing about what the server prefers to encode
        // with; skip it when tracking.
        if encoding != Encoding::CopyRect {
            self.last_server_encoding = Some(encoding);
        }
        Ok(())
    }

    fn set_cursor(
        &mut self,
        width: u16,
        height: u16,
        hotspot: Point,
        data: Bytes,
    ) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.surface.set_cursor(width, height, hotspot, data);
        Ok(())
    }

    fn set_colour_map_entries(&mut self, _first: u16, _count: u16) -> Result<(), SessionError> {
        // Every format this client requests is true-color.
        Err(SessionError::ProtocolViolation(
            "color-map entries for a true-color session",
        ))
    }

    fn bell(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.surface.bell();
        Ok(())
    }

    fn server_cut_text(&mut self, text: Bytes) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.surface.cut_text(text);
        Ok(())
    }

    fn set_led_state(&mut self, state: LedState) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        self.surface.set_led_state(state);
        Ok(())
    }

    fn fence(&mut self, flags: FenceFlags, payload: Bytes) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        // Any fence doubles as the server advertising fence support.
        self.server.caps_mut().fence = true;

        if flags.contains(FenceFlags::REQUEST) {
            // Respond with the payload untouched and only the ordering
            // bits echoed.
            return self.writer.fence(flags & FenceFlags::BLOCKING, payload);
        }
        warn!("unsolicited fence response ignored");
        Ok(())
    }

    fn end_of_continuous_updates(&mut self) -> Result<(), SessionError> {
        self.ensure_initialised()?;
        // First receipt doubles as the server advertising support.
        self.server.caps_mut().continuous_updates = true;

        // The marker proves the stream is quiesced, which makes it the
        // safe point for format changes while the stream is on.
        self.commit_pending_format();
        Ok(())
    }
}
