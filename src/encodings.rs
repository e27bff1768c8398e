//! Encoding identifiers and the advertised preference list.
//!
//! Real encodings carry framebuffer data; pseudo-encodings are negative
//! ids the client advertises to opt into protocol extensions (cursor
//! handling, resize notifications, fences, continuous updates) and to
//! carry the compression/quality levels.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::server::ServerState;

// ── Real encodings ───────────────────────────────────────────────

/// Framebuffer data encodings, by wire id.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Raw = 0,
    CopyRect = 1,
    Rre = 2,
    Hextile = 5,
    Tight = 7,
    Zrle = 16,
}

impl Encoding {
    /// The wire id.
    pub const fn id(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Encoding {
    type Error = SessionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Encoding::Raw),
            1 => Ok(Encoding::CopyRect),
            2 => Ok(Encoding::Rre),
            5 => Ok(Encoding::Hextile),
            7 => Ok(Encoding::Tight),
            16 => Ok(Encoding::Zrle),
            _ => Err(SessionError::UnknownValue {
                type_name: "Encoding",
                value: value as i64,
            }),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Encoding::Raw => "Raw",
            Encoding::CopyRect => "CopyRect",
            Encoding::Rre => "RRE",
            Encoding::Hextile => "Hextile",
            Encoding::Tight => "Tight",
            Encoding::Zrle => "ZRLE",
        };
        write!(f, "{name}")
    }
}

// ── Pseudo-encodings ─────────────────────────────────────────────

pub const PSEUDO_DESKTOP_SIZE: i32 = -223;
pub const PSEUDO_LAST_RECT: i32 = -224;
pub const PSEUDO_CURSOR: i32 = -239;
pub const PSEUDO_LED_STATE: i32 = -261;
pub const PSEUDO_DESKTOP_NAME: i32 = -307;
pub const PSEUDO_EXTENDED_DESKTOP_SIZE: i32 = -308;
pub const PSEUDO_FENCE: i32 = -312;
pub const PSEUDO_CONTINUOUS_UPDATES: i32 = -313;

/// Base id for quality levels; level `n` is advertised as base + `n`.
pub const PSEUDO_QUALITY_LEVEL_0: i32 = -32;
/// Base id for compression levels; level `n` is advertised as base + `n`.
pub const PSEUDO_COMPRESS_LEVEL_0: i32 = -256;

// ── Preference list ──────────────────────────────────────────────

/// Build the id list for a set-encodings message.
///
/// Real encodings come first, most preferred first: the current choice,
/// then `CopyRect`, then the remaining standard encodings by capability.
/// Pseudo-encodings follow, gated on the session's capability flags, and
/// the compression/quality levels close the list when set (levels above 9
/// have no wire id and are skipped).
pub fn preference_list(preferred: Encoding, server: &ServerState) -> Vec<i32> {
    let mut ids = Vec::with_capacity(16);

    ids.push(preferred.id());
    if preferred != Encoding::CopyRect {
        ids.push(Encoding::CopyRect.id());
    }
    for enc in [
        Encoding::Tight,
        Encoding::Zrle,
        Encoding::Hextile,
        Encoding::Raw,
    ] {
        if enc != preferred {
            ids.push(enc.id());
        }
    }

    let caps = server.caps();
    if caps.local_cursor {
        ids.push(PSEUDO_CURSOR);
    }
    if caps.desktop_resize {
        ids.push(PSEUDO_DESKTOP_SIZE);
    }
    if caps.extended_desktop_size {
        ids.push(PSEUDO_EXTENDED_DESKTOP_SIZE);
    }
    if caps.desktop_rename {
        ids.push(PSEUDO_DESKTOP_NAME);
    }
    if caps.led_state {
        ids.push(PSEUDO_LED_STATE);
    }
    ids.push(PSEUDO_LAST_RECT);
    ids.push(PSEUDO_CONTINUOUS_UPDATES);
    ids.push(PSEUDO_FENCE);

    if let Some(level) = server.compress_level() {
        if level <= 9 {
            ids.push(PSEUDO_COMPRESS_LEVEL_0 + i32::from(level));
        }
    }
    if let Some(level) = server.quality_level() {
        if level <= 9 {
            ids.push(PSEUDO_QUALITY_LEVEL_0 + i32::from(level));
        }
    }

    ids
}
