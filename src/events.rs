//! Decoded server events and the handler seam.
//!
//! A transport decodes the server's byte stream into [`ServerEvent`]
//! values upstream of this crate; framebuffer rectangles arrive only as
//! post-decode [`ServerEvent::Rect`] notifications, the pixel data itself
//! goes straight to the renderer. [`ProtocolEventSink`] is the handler
//! interface the session implements; [`dispatch`] maps one event to its
//! handler call.

use bytes::Bytes;

use crate::encodings::Encoding;
use crate::error::SessionError;
use crate::pixels::PixelFormat;
use crate::types::{
    FenceFlags, LedState, Point, ProtocolVersion, Rect, ResizeReason, ResizeResult, ScreenLayout,
};

// ── ServerEvent ──────────────────────────────────────────────────

/// One decoded server-to-client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Session start: framebuffer geometry, desktop name, the server's
    /// native pixel format and the protocol version the (external)
    /// handshake negotiated.
    Init {
        width: u16,
        height: u16,
        name: String,
        format: PixelFormat,
        version: ProtocolVersion,
    },
    /// Plain desktop resize.
    DesktopSize { width: u16, height: u16 },
    /// Multi-screen resize, with the outcome of the triggering request.
    ExtendedDesktopSize {
        reason: ResizeReason,
        result: ResizeResult,
        width: u16,
        height: u16,
        layout: ScreenLayout,
    },
    /// Desktop renamed.
    Name(String),
    /// A framebuffer update begins.
    UpdateStart,
    /// The framebuffer update in progress is complete.
    UpdateEnd,
    /// One rectangle of the current update was decoded.
    Rect { rect: Rect, encoding: Encoding },
    /// New cursor shape (RGBA, `width * height * 4` bytes).
    Cursor {
        width: u16,
        height: u16,
        hotspot: Point,
        data: Bytes,
    },
    /// Color-map update. This client only ever negotiates true-color
    /// formats, so receiving one is a protocol violation.
    ColourMapEntries { first: u16, count: u16 },
    /// Ring the bell.
    Bell,
    /// Server-side clipboard contents.
    CutText(Bytes),
    /// Keyboard lock indicators changed.
    LedState(LedState),
    /// Fence synchronization message.
    Fence { flags: FenceFlags, payload: Bytes },
    /// Continuous updates paused; stream state is synchronized.
    EndOfContinuousUpdates,
}

// ── ProtocolEventSink ────────────────────────────────────────────

/// Handler interface for decoded server events, one method per message.
pub trait ProtocolEventSink {
    fn server_init(
        &mut self,
        width: u16,
        height: u16,
        name: String,
        format: PixelFormat,
        version: ProtocolVersion,
    ) -> Result<(), SessionError>;

    fn set_desktop_size(&mut self, width: u16, height: u16) -> Result<(), SessionError>;

    fn set_extended_desktop_size(
        &mut self,
        reason: ResizeReason,
        result: ResizeResult,
        width: u16,
        height: u16,
        layout: ScreenLayout,
    ) -> Result<(), SessionError>;

    fn set_name(&mut self, name: String) -> Result<(), SessionError>;

    fn framebuffer_update_start(&mut self) -> Result<(), SessionError>;

    fn framebuffer_update_end(&mut self) -> Result<(), SessionError>;

    fn data_rect(&mut self, rect: Rect, encoding: Encoding) -> Result<(), SessionError>;

    fn set_cursor(
        &mut self,
        width: u16,
        height: u16,
        hotspot: Point,
        data: Bytes,
    ) -> Result<(), SessionError>;

    fn set_colour_map_entries(&mut self, first: u16, count: u16) -> Result<(), SessionError>;

    fn bell(&mut self) -> Result<(), SessionError>;

    fn server_cut_text(&mut self, text: Bytes) -> Result<(), SessionError>;

    fn set_led_state(&mut self, state: LedState) -> Result<(), SessionError>;

    fn fence(&mut self, flags: FenceFlags, payload: Bytes) -> Result<(), SessionError>;

    fn end_of_continuous_updates(&mut self) -> Result<(), SessionError>;
}

/// Route one event to its handler.
pub fn dispatch<S>(sink: &mut S, event: ServerEvent) -> Result<(), SessionError>
where
    S: ProtocolEventSink + ?Sized,
{
    match event {
        ServerEvent::Init {
            width,
            height,
            name,
            format,
            version,
        } => sink.server_init(width, height, name, format, version),
        ServerEvent::DesktopSize { width, height } => sink.set_desktop_size(width, height),
        ServerEvent::ExtendedDesktopSize {
            reason,
            result,
            width,
            height,
            layout,
        } => sink.set_extended_desktop_size(reason, result, width, height, layout),
        ServerEvent::Name(name) => sink.set_name(name),
        ServerEvent::UpdateStart => sink.framebuffer_update_start(),
        ServerEvent::UpdateEnd => sink.framebuffer_update_end(),
        ServerEvent::Rect { rect, encoding } => sink.data_rect(rect, encoding),
        ServerEvent::Cursor {
            width,
            height,
            hotspot,
            data,
        } => sink.set_cursor(width, height, hotspot, data),
        ServerEvent::ColourMapEntries { first, count } => {
            sink.set_colour_map_entries(first, count)
        }
        ServerEvent::Bell => sink.bell(),
        ServerEvent::CutText(text) => sink.server_cut_text(text),
        ServerEvent::LedState(state) => sink.set_led_state(state),
        ServerEvent::Fence { flags, payload } => sink.fence(flags, payload),
        ServerEvent::EndOfContinuousUpdates => sink.end_of_continuous_updates(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that records which handler ran.
    #[derive(Default)]
    struct Trace(Vec<&'static str>);

    impl ProtocolEventSink for Trace {
        fn server_init(
            &mut self,
            _: u16,
            _: u16,
            _: String,
            _: PixelFormat,
            _: ProtocolVersion,
        ) -> Result<(), SessionError> {
            self.0.push("init");
            Ok(())
        }
        fn set_desktop_size(&mut self, _: u16, _: u16) -> Result<(), SessionError> {
            self.0.push("desktop_size");
            Ok(())
        }
        fn set_extended_desktop_size(
            &mut self,
            _: ResizeReason,
            _: ResizeResult,
            _: u16,
            _: u16,
            _: ScreenLayout,
        ) -> Result<(), SessionError> {
            self.0.push("extended_desktop_size");
            Ok(())
        }
        fn set_name(&mut self, _: String) -> Result<(), SessionError> {
            self.0.push("name");
            Ok(())
        }
        fn framebuffer_update_start(&mut self) -> Result<(), SessionError> {
            self.0.push("update_start");
            Ok(())
        }
        fn framebuffer_update_end(&mut self) -> Result<(), SessionError> {
            self.0.push("update_end");
            Ok(())
        }
        fn data_rect(&mut self, _: Rect, _: Encoding) -> Result<(), SessionError> {
            self.0.push("rect");
            Ok(())
        }
        fn set_cursor(&mut self, _: u16, _: u16, _: Point, _: Bytes) -> Result<(), SessionError> {
            self.0.push("cursor");
            Ok(())
        }
        fn set_colour_map_entries(&mut self, _: u16, _: u16) -> Result<(), SessionError> {
            self.0.push("colour_map");
            Ok(())
        }
        fn bell(&mut self) -> Result<(), SessionError> {
            self.0.push("bell");
            Ok(())
        }
        fn server_cut_text(&mut self, _: Bytes) -> Result<(), SessionError> {
            self.0.push("cut_text");
            Ok(())
        }
        fn set_led_state(&mut self, _: LedState) -> Result<(), SessionError> {
            self.0.push("led");
            Ok(())
        }
        fn fence(&mut self, _: FenceFlags, _: Bytes) -> Result<(), SessionError> {
            self.0.push("fence");
            Ok(())
        }
        fn end_of_continuous_updates(&mut self) -> Result<(), SessionError> {
            self.0.push("end_of_continuous_updates");
            Ok(())
        }
    }

    #[test]
    fn dispatch_routes_each_event_to_its_handler() {
        let mut trace = Trace::default();
        let events = vec![
            ServerEvent::UpdateStart,
            ServerEvent::Rect {
                rect: Rect::spanning(4, 4),
                encoding: Encoding::Tight,
            },
            ServerEvent::UpdateEnd,
            ServerEvent::Bell,
            ServerEvent::EndOfContinuousUpdates,
            ServerEvent::LedState(LedState::CAPS_LOCK),
        ];
        for event in events {
            dispatch(&mut trace, event).unwrap();
        }
        assert_eq!(
            trace.0,
            vec![
                "update_start",
                "rect",
                "update_end",
                "bell",
                "end_of_continuous_updates",
                "led"
            ]
        );
    }
}
