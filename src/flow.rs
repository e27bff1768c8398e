//! Update-request flow control.
//!
//! [`UpdateFlow`] owns the request/format/encoding lifecycle for one
//! session. Two rules make format switching safe:
//!
//! - at most one classic update request is outstanding, so there is never
//!   a moment where two updates could be decoded under different formats;
//! - a new pixel format is only put on the wire at safe points, and is not
//!   treated as active until the server acknowledges a boundary (end of
//!   the next cycle, or the continuous-updates sync marker).
//!
//! One classic update cycle:
//!
//! ```text
//!   request ──▶ UpdateStart ──▶ rects… ──▶ UpdateEnd
//!                   │                         │
//!                   └─ request next update    ├─ activate pending format
//!                      (pipelining)           └─ run bandwidth policy
//! ```
//!
//! In continuous-updates mode the server streams updates unprompted, so a
//! format change is bracketed by a disable/enable pair instead of riding
//! a request boundary.

use tracing::info;

use crate::config::SessionConfig;
use crate::encodings::{self, Encoding};
use crate::error::SessionError;
use crate::messages::ProtocolWriter;
use crate::pixels::{ColourLevel, PixelFormat};
use crate::server::ServerState;
use crate::types::Rect;

/// Request pacing, format scheduling and encoding advertisement state.
#[derive(Debug)]
pub struct UpdateFlow {
    /// Encoding to put at the head of the preference list.
    current_encoding: Encoding,
    /// Request full color (otherwise `colour_level` applies).
    full_colour: bool,
    colour_level: ColourLevel,
    /// A format change is desired and waits for a safe point.
    format_change: bool,
    /// The encoding list should be re-advertised.
    encoding_change: bool,
    /// Format sent to the server but not yet safe to decode under.
    pending_format: Option<PixelFormat>,
    /// A classic update request is in flight.
    outstanding_request: bool,
    /// The server streams updates without per-cycle requests.
    continuous_updates: bool,
    /// The next request must be a full non-incremental fetch.
    force_nonincremental: bool,
    /// No update cycle has completed yet.
    first_update: bool,
}

impl UpdateFlow {
    pub fn new(config: &SessionConfig) -> Self {
        UpdateFlow {
            current_encoding: config.preferred_encoding,
            full_colour: config.full_colour,
            colour_level: config.colour_level,
            format_change: false,
            encoding_change: false,
            pending_format: None,
            outstanding_request: false,
            continuous_updates: false,
            // The first update must fetch the whole framebuffer.
            force_nonincremental: true,
            first_update: true,
        }
    }

    // ── State inspection ─────────────────────────────────────────

    pub fn encoding(&self) -> Encoding {
        self.current_encoding
    }

    pub fn full_colour(&self) -> bool {
        self.full_colour
    }

    pub fn continuous_updates(&self) -> bool {
        self.continuous_updates
    }

    pub fn outstanding_request(&self) -> bool {
        self.outstanding_request
    }

    pub fn pending_format(&self) -> Option<PixelFormat> {
        self.pending_format
    }

    /// The format the next scheduled change would request.
    pub fn target_format(&self, surface_format: PixelFormat) -> PixelFormat {
        if self.full_colour {
            surface_format
        } else {
            self.colour_level.pixel_format()
        }
    }

    // ── Preference updates ───────────────────────────────────────

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.current_encoding = encoding;
    }

    pub fn set_full_colour(&mut self, full_colour: bool) {
        self.full_colour = full_colour;
    }

    pub fn set_colour_level(&mut self, level: ColourLevel) {
        self.colour_level = level;
    }

    /// Ask for a pixel-format switch at the next safe point.
    pub fn request_format_change(&mut self) {
        self.format_change = true;
    }

    /// Ask for the encoding list to be re-advertised on the next cycle.
    pub fn request_encoding_change(&mut self) {
        self.encoding_change = true;
    }

    /// Make the next update request a full non-incremental fetch.
    pub fn request_full_refresh(&mut self) {
        self.force_nonincremental = true;
    }

    /// Switch to continuous-updates mode.
    pub fn enable_continuous(&mut self) {
        self.continuous_updates = true;
    }

    // ── Cycle transitions ────────────────────────────────────────

    /// An update cycle began; its request is no longer outstanding.
    pub fn update_started(&mut self) {
        self.outstanding_request = false;
    }

    /// True exactly once, when the first completed cycle is reported.
    pub fn take_first_update(&mut self) -> bool {
        std::mem::take(&mut self.first_update)
    }

    /// Take the pending format for activation. The caller commits it to
    /// the server state; this only happens at safe points.
    pub fn complete_pending_format(&mut self) -> Option<PixelFormat> {
        self.pending_format.take()
    }

    /// Emit whatever the current desires require: a scheduled format
    /// change, a fresh encoding list, and (outside continuous-updates
    /// mode, or when a full refresh is forced) the next update request.
    ///
    /// A format change that arrives while another is still pending stays
    /// recorded and is emitted on a later cycle, after the pending one
    /// activates.
    ///
    /// # Panics
    ///
    /// If a format change is scheduled while a classic update request is
    /// in flight and continuous updates are off. Callers must only drive
    /// this from safe points, where that cannot hold.
    pub fn request_update_cycle<W: ProtocolWriter>(
        &mut self,
        server: &ServerState,
        surface_format: PixelFormat,
        writer: &mut W,
    ) -> Result<(), SessionError> {
        if self.format_change && self.pending_format.is_none() {
            assert!(
                !self.outstanding_request || self.continuous_updates,
                "format change scheduled while an update request is in flight"
            );

            let format = self.target_format(surface_format);
            self.pending_format = Some(format);

            // Bracket the switch so the boundary between old-format and
            // new-format data stays unambiguous in the continuous stream.
            if self.continuous_updates {
                writer.enable_continuous_updates(false, Rect::EMPTY)?;
            }
            info!(%format, "using pixel format");
            writer.set_pixel_format(&format)?;
            if self.continuous_updates {
                writer.enable_continuous_updates(
                    true,
                    Rect::spanning(server.width(), server.height()),
                )?;
            }
            self.format_change = false;
        }

        self.check_encodings(server, writer)?;

        if self.force_nonincremental || !self.continuous_updates {
            let incremental = !self.force_nonincremental;
            self.outstanding_request = true;
            writer.framebuffer_update_request(
                Rect::spanning(server.width(), server.height()),
                incremental,
            )?;
        }
        self.force_nonincremental = false;

        Ok(())
    }

    fn check_encodings<W: ProtocolWriter>(
        &mut self,
        server: &ServerState,
        writer: &mut W,
    ) -> Result<(), SessionError> {
        if self.encoding_change {
            info!(encoding = %self.current_encoding, "using encoding");
            writer.set_encodings(&encodings::preference_list(self.current_encoding, server))?;
            self.encoding_change = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ClientMessage;

    /// Writer that records every message it is handed.
    #[derive(Default)]
    struct RecWriter(Vec<ClientMessage>);

    impl ProtocolWriter for RecWriter {
        fn set_pixel_format(&mut self, format: &PixelFormat) -> Result<(), SessionError> {
            self.0.push(ClientMessage::SetPixelFormat(*format));
            Ok(())
        }
        fn set_encodings(&mut self, encodings: &[i32]) -> Result<(), SessionError> {
            self.0.push(ClientMessage::SetEncodings(encodings.to_vec()));
            Ok(())
        }
        fn framebuffer_update_request(
            &mut self,
            rect: Rect,
            incremental: bool,
        ) -> Result<(), SessionError> {
            self.0
                .push(ClientMessage::FramebufferUpdateRequest { rect, incremental });
            Ok(())
        }
        fn enable_continuous_updates(
            &mut self,
            enable: bool,
            rect: Rect,
        ) -> Result<(), SessionError> {
            self.0
                .push(ClientMessage::EnableContinuousUpdates { enable, rect });
            Ok(())
        }
        fn fence(
            &mut self,
            flags: crate::types::FenceFlags,
            payload: bytes::Bytes,
        ) -> Result<(), SessionError> {
            self.0.push(ClientMessage::Fence { flags, payload });
            Ok(())
        }
    }

    fn server_1024x768() -> ServerState {
        let mut server = ServerState::new(&SessionConfig::default());
        server.set_dimensions(1024, 768);
        server
    }

    #[test]
    fn initial_cycle_emits_format_encodings_then_full_request() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_format_change();
        flow.request_encoding_change();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        assert_eq!(writer.0.len(), 3);
        assert_eq!(
            writer.0[0],
            ClientMessage::SetPixelFormat(PixelFormat::rgb888())
        );
        assert!(matches!(writer.0[1], ClientMessage::SetEncodings(_)));
        assert_eq!(
            writer.0[2],
            ClientMessage::FramebufferUpdateRequest {
                rect: Rect::spanning(1024, 768),
                incremental: false
            }
        );
        assert!(flow.outstanding_request());
        assert_eq!(flow.pending_format(), Some(PixelFormat::rgb888()));
    }

    #[test]
    fn second_cycle_requests_incrementally() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        flow.update_started();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        assert_eq!(
            writer.0,
            vec![
                ClientMessage::FramebufferUpdateRequest {
                    rect: Rect::spanning(1024, 768),
                    incremental: false
                },
                ClientMessage::FramebufferUpdateRequest {
                    rect: Rect::spanning(1024, 768),
                    incremental: true
                },
            ]
        );
    }

    #[test]
    fn continuous_mode_brackets_format_change() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        // Get past the forced first fetch, then switch modes.
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        flow.update_started();
        flow.enable_continuous();
        writer.0.clear();

        flow.request_format_change();
        flow.set_full_colour(false);
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        let palette = ColourLevel::Medium.pixel_format();
        assert_eq!(
            writer.0,
            vec![
                ClientMessage::EnableContinuousUpdates {
                    enable: false,
                    rect: Rect::EMPTY
                },
                ClientMessage::SetPixelFormat(palette),
                ClientMessage::EnableContinuousUpdates {
                    enable: true,
                    rect: Rect::spanning(1024, 768)
                },
            ]
        );
        // No classic request while the continuous stream runs.
        assert!(!flow.outstanding_request());
    }

    #[test]
    fn continuous_mode_still_honours_forced_refresh() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        flow.update_started();
        flow.enable_continuous();
        writer.0.clear();

        flow.request_full_refresh();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        assert_eq!(
            writer.0,
            vec![ClientMessage::FramebufferUpdateRequest {
                rect: Rect::spanning(1024, 768),
                incremental: false
            }]
        );
    }

    #[test]
    fn format_desire_during_pending_change_is_deferred_not_lost() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_format_change();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        assert!(flow.pending_format().is_some());
        writer.0.clear();

        // A second desire arrives while the first is still pending.
        flow.set_full_colour(false);
        flow.request_format_change();
        flow.update_started();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        assert!(
            !writer
                .0
                .iter()
                .any(|m| matches!(m, ClientMessage::SetPixelFormat(_)))
        );

        // Once the pending change activates, the recorded desire emits.
        flow.complete_pending_format().unwrap();
        flow.update_started();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        let palette = ColourLevel::Medium.pixel_format();
        assert!(writer.0.contains(&ClientMessage::SetPixelFormat(palette)));
    }

    #[test]
    fn encodings_advertised_once_per_desire() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_encoding_change();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        flow.update_started();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        let lists = writer
            .0
            .iter()
            .filter(|m| matches!(m, ClientMessage::SetEncodings(_)))
            .count();
        assert_eq!(lists, 1);
    }

    #[test]
    fn preference_list_leads_with_current_encoding() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig {
            preferred_encoding: Encoding::Hextile,
            ..SessionConfig::default()
        });
        let mut writer = RecWriter::default();

        flow.request_encoding_change();
        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();

        let Some(ClientMessage::SetEncodings(ids)) = writer
            .0
            .iter()
            .find(|m| matches!(m, ClientMessage::SetEncodings(_)))
        else {
            panic!("no encoding list emitted");
        };
        assert_eq!(ids[0], Encoding::Hextile.id());
    }

    #[test]
    fn first_update_reported_once() {
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        assert!(flow.take_first_update());
        assert!(!flow.take_first_update());
    }

    #[test]
    fn target_format_follows_colour_mode() {
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        assert_eq!(
            flow.target_format(PixelFormat::rgb888()),
            PixelFormat::rgb888()
        );
        flow.set_full_colour(false);
        flow.set_colour_level(ColourLevel::VeryLow);
        assert_eq!(
            flow.target_format(PixelFormat::rgb888()),
            ColourLevel::VeryLow.pixel_format()
        );
    }

    #[test]
    #[should_panic(expected = "format change scheduled")]
    fn format_change_with_request_in_flight_is_a_bug() {
        let server = server_1024x768();
        let mut flow = UpdateFlow::new(&SessionConfig::default());
        let mut writer = RecWriter::default();

        flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer)
            .unwrap();
        assert!(flow.outstanding_request());

        // Scheduling a format change now, without waiting for the cycle
        // to start, breaks the safe-point rule.
        flow.request_format_change();
        let _ = flow.request_update_cycle(&server, PixelFormat::rgb888(), &mut writer);
    }
}
