//! Small wire-level carrier types shared across the session core.
//!
//! Geometry (`Rect`, `Point`, `Screen`), the negotiated protocol version,
//! and the fence/LED flag sets. These mirror the values the remote display
//! protocol actually puts on the wire, so dimensions are `u16` and flag
//! bits use the protocol's numbering.

use bitflags::bitflags;

use crate::error::SessionError;

// ── Geometry ─────────────────────────────────────────────────────

/// A point in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Point { x, y }
    }
}

/// An axis-aligned rectangle in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    /// The degenerate all-zero rectangle, used when a message needs a
    /// rect field but no area (disabling continuous updates).
    pub const EMPTY: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a full framebuffer of the given size.
    pub const fn spanning(width: u16, height: u16) -> Self {
        Rect {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Pixel count. Fits `u32` even at the wire maximum of 65535².
    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }
}

/// One screen of a multi-monitor layout, as described by the extended
/// desktop-size message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub id: u32,
    pub rect: Rect,
    pub flags: u32,
}

/// The full multi-monitor layout.
pub type ScreenLayout = Vec<Screen>;

// ── Protocol version ─────────────────────────────────────────────

/// The protocol version negotiated during the (external) handshake.
///
/// Ordering is lexicographic on `(major, minor)`, so `3.7 < 3.8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        ProtocolVersion { major, minor }
    }

    /// True when this version predates `major.minor`.
    pub fn before(&self, major: u32, minor: u32) -> bool {
        *self < ProtocolVersion::new(major, minor)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::new(3, 8)
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ── Desktop resize outcome ───────────────────────────────────────

/// Who initiated a desktop-size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeReason {
    /// The server changed the screen layout on its own.
    Server,
    /// This client asked for the change.
    Client,
    /// Another client sharing the session asked for the change.
    OtherClient,
}

impl TryFrom<u32> for ResizeReason {
    type Error = SessionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResizeReason::Server),
            1 => Ok(ResizeReason::Client),
            2 => Ok(ResizeReason::OtherClient),
            _ => Err(SessionError::UnknownValue {
                type_name: "ResizeReason",
                value: value as i64,
            }),
        }
    }
}

/// Server verdict on a requested desktop-size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeResult {
    Success,
    Prohibited,
    OutOfResources,
    InvalidLayout,
}

impl TryFrom<u32> for ResizeResult {
    type Error = SessionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResizeResult::Success),
            1 => Ok(ResizeResult::Prohibited),
            2 => Ok(ResizeResult::OutOfResources),
            3 => Ok(ResizeResult::InvalidLayout),
            _ => Err(SessionError::UnknownValue {
                type_name: "ResizeResult",
                value: value as i64,
            }),
        }
    }
}

// ── Flag sets ────────────────────────────────────────────────────

bitflags! {
    /// Fence message flags.
    ///
    /// A fence with [`FenceFlags::REQUEST`] set asks the client to respond;
    /// the response must preserve the payload and carry only the bits in
    /// [`FenceFlags::BLOCKING`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FenceFlags: u32 {
        /// All messages before the fence must finish before it executes.
        const BLOCK_BEFORE = 1;
        /// No messages after the fence may execute before it does.
        const BLOCK_AFTER = 1 << 1;
        /// The fence executes together with the next message.
        const SYNC_NEXT = 1 << 2;
        /// The peer expects a fence response.
        const REQUEST = 1 << 31;

        /// The two ordering bits a response is allowed to echo.
        const BLOCKING = Self::BLOCK_BEFORE.bits() | Self::BLOCK_AFTER.bits();
    }
}

bitflags! {
    /// Keyboard lock indicator state reported by the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LedState: u8 {
        const SCROLL_LOCK = 1;
        const NUM_LOCK = 1 << 1;
        const CAPS_LOCK = 1 << 2;
    }
}
