//! Session configuration.
//!
//! [`SessionConfig`] collects the user-facing knobs the session reads:
//! which encoding and color mode to request, whether the bandwidth policy
//! may adjust them, and the quality/compression levels to advertise. The
//! struct deserializes with per-field defaults so hosts can layer it into
//! their own config files.

use serde::{Deserialize, Serialize};

use crate::encodings::Encoding;
use crate::pixels::ColourLevel;

/// Knobs controlling what the session requests from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Encoding to request when `auto_select` is off, and the starting
    /// preference when it is on.
    pub preferred_encoding: Encoding,
    /// Let measured throughput drive encoding, quality and color mode.
    pub auto_select: bool,
    /// Start in full-color mode (otherwise `colour_level` applies).
    pub full_colour: bool,
    /// Indexed palette used when full-color mode is off.
    pub colour_level: ColourLevel,
    /// JPEG quality level 0–9; `None` forbids lossy encoding entirely.
    pub quality_level: Option<u8>,
    /// Compression level 0–9 to advertise; `None` leaves it unset.
    pub compress_level: Option<u8>,
    /// Ask for a shared session during the (external) handshake.
    pub shared: bool,
    /// Switch to continuous-updates mode once the server offers it.
    pub continuous_updates: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            preferred_encoding: Encoding::Tight,
            auto_select: true,
            full_colour: true,
            colour_level: ColourLevel::Medium,
            quality_level: Some(8),
            compress_level: None,
            shared: false,
            continuous_updates: true,
        }
    }
}
