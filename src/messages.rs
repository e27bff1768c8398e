//! Outbound protocol messages and the writer seam.
//!
//! The session never touches a socket. Everything it wants to say goes
//! through [`ProtocolWriter`]; the transport either serializes the calls
//! directly or collects them as [`ClientMessage`] values via
//! [`MessageSender`] and encodes them on its own schedule.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::pixels::PixelFormat;
use crate::types::{FenceFlags, Rect};

// ── ClientMessage ────────────────────────────────────────────────

/// One client-to-server control message, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Switch the wire format for subsequent framebuffer data.
    SetPixelFormat(PixelFormat),
    /// Advertise the encodings the client accepts, most preferred first.
    SetEncodings(Vec<i32>),
    /// Ask for an update of `rect`; incremental requests only want what
    /// changed since the last update.
    FramebufferUpdateRequest { rect: Rect, incremental: bool },
    /// Turn the continuous-updates stream on (for `rect`) or off.
    EnableContinuousUpdates { enable: bool, rect: Rect },
    /// Fence response (or request, which this client never sends).
    Fence { flags: FenceFlags, payload: Bytes },
}

// ── ProtocolWriter ───────────────────────────────────────────────

/// Outbound message sink implemented by the transport.
///
/// Implementations must preserve call order on the wire; the session's
/// safety argument for pixel-format changes depends on it.
pub trait ProtocolWriter {
    fn set_pixel_format(&mut self, format: &PixelFormat) -> Result<(), SessionError>;

    fn set_encodings(&mut self, encodings: &[i32]) -> Result<(), SessionError>;

    fn framebuffer_update_request(
        &mut self,
        rect: Rect,
        incremental: bool,
    ) -> Result<(), SessionError>;

    fn enable_continuous_updates(
        &mut self,
        enable: bool,
        rect: Rect,
    ) -> Result<(), SessionError>;

    fn fence(&mut self, flags: FenceFlags, payload: Bytes) -> Result<(), SessionError>;
}

// ── MessageSender ────────────────────────────────────────────────

/// [`ProtocolWriter`] backed by an unbounded channel of
/// [`ClientMessage`] values.
///
/// Unbounded on purpose: these are small control messages, and dropping
/// or reordering one would corrupt the protocol state machine.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl MessageSender {
    pub fn new(tx: mpsc::UnboundedSender<ClientMessage>) -> Self {
        MessageSender { tx }
    }

    /// Fresh channel pair: the sender half for the session, the receiver
    /// half for the transport.
    pub fn channel() -> (MessageSender, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MessageSender { tx }, rx)
    }

    fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        self.tx.send(message)?;
        Ok(())
    }
}

impl ProtocolWriter for MessageSender {
    fn set_pixel_format(&mut self, format: &PixelFormat) -> Result<(), SessionError> {
        self.send(ClientMessage::SetPixelFormat(*format))
    }

    fn set_encodings(&mut self, encodings: &[i32]) -> Result<(), SessionError> {
        self.send(ClientMessage::SetEncodings(encodings.to_vec()))
    }

    fn framebuffer_update_request(
        &mut self,
        rect: Rect,
        incremental: bool,
    ) -> Result<(), SessionError> {
        self.send(ClientMessage::FramebufferUpdateRequest { rect, incremental })
    }

    fn enable_continuous_updates(
        &mut self,
        enable: bool,
        rect: Rect,
    ) -> Result<(), SessionError> {
        self.send(ClientMessage::EnableContinuousUpdates { enable, rect })
    }

    fn fence(&mut self, flags: FenceFlags, payload: Bytes) -> Result<(), SessionError> {
        self.send(ClientMessage::Fence { flags, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_preserves_call_order() {
        let (mut writer, mut rx) = MessageSender::channel();
        writer.set_pixel_format(&PixelFormat::rgb888()).unwrap();
        writer.set_encodings(&[7, 1, 16]).unwrap();
        writer
            .framebuffer_update_request(Rect::spanning(640, 480), false)
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::SetPixelFormat(PixelFormat::rgb888())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::SetEncodings(vec![7, 1, 16])
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::FramebufferUpdateRequest {
                rect: Rect::spanning(640, 480),
                incremental: false
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_reports_channel_closed() {
        let (mut writer, rx) = MessageSender::channel();
        drop(rx);
        let err = writer
            .enable_continuous_updates(true, Rect::spanning(1, 1))
            .unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed));
    }

    #[test]
    fn fence_payload_passes_through() {
        let (mut writer, mut rx) = MessageSender::channel();
        let payload = Bytes::from_static(b"\x01\x02\x03");
        writer
            .fence(FenceFlags::BLOCK_BEFORE, payload.clone())
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::Fence {
                flags: FenceFlags::BLOCK_BEFORE,
                payload
            }
        );
    }
}
