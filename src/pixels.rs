//! Pixel format descriptions and the reduced-color palette table.
//!
//! [`PixelFormat`] mirrors the protocol's 16-byte format block: how many
//! bits a pixel occupies on the wire and how the color channels are packed
//! into it. [`ColourLevel`] enumerates the three indexed palettes used in
//! low-bandwidth mode, from 8 colors up to 256.

use serde::{Deserialize, Serialize};

// ── PixelFormat ──────────────────────────────────────────────────

/// Wire-level pixel format: bits per pixel, color depth, endianness and
/// per-channel packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    /// Bits each pixel occupies on the wire (8, 16 or 32).
    pub bits_per_pixel: u8,
    /// Significant bits out of `bits_per_pixel`.
    pub depth: u8,
    /// Multi-byte pixels are sent big-endian.
    pub big_endian: bool,
    /// Channels are packed into the pixel value (no color map).
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The canonical full-color format: 32bpp, depth 24, little-endian,
    /// 8 bits per channel packed red-high.
    pub const fn rgb888() -> Self {
        PixelFormat {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_colour: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// Bits used by one channel, when the channel maximum is `2^n - 1`.
    fn channel_bits(max: u16) -> Option<u32> {
        if max != 0 && max & (max + 1) == 0 {
            Some(max.count_ones())
        } else {
            None
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::rgb888()
    }
}

impl std::fmt::Display for PixelFormat {
    /// Conventional short form used in logs, e.g. `depth 24 (32bpp)
    /// little-endian rgb888` or `depth 8 (8bpp) rgb332`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "depth {} ({}bpp)", self.depth, self.bits_per_pixel)?;
        if self.bits_per_pixel != 8 {
            write!(
                f,
                " {}-endian",
                if self.big_endian { "big" } else { "little" }
            )?;
        }
        if !self.true_colour {
            return write!(f, " color-map");
        }
        let bits = (
            PixelFormat::channel_bits(self.red_max),
            PixelFormat::channel_bits(self.green_max),
            PixelFormat::channel_bits(self.blue_max),
        );
        match bits {
            (Some(r), Some(g), Some(b)) => {
                if self.red_shift > self.blue_shift {
                    write!(f, " rgb{r}{g}{b}")
                } else {
                    write!(f, " bgr{b}{g}{r}")
                }
            }
            _ => write!(
                f,
                " rgb max {},{},{} shift {},{},{}",
                self.red_max,
                self.green_max,
                self.blue_max,
                self.red_shift,
                self.green_shift,
                self.blue_shift
            ),
        }
    }
}

// ── ColourLevel ──────────────────────────────────────────────────

/// Indexed palette depth used when full-color mode is off.
///
/// Each level maps to a fixed 8bpp true-color format; the level only
/// decides how many bits each channel keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColourLevel {
    /// 8 colors, one bit per channel.
    VeryLow,
    /// 64 colors, two bits per channel.
    Low,
    /// 256 colors: three bits for red and green, two for blue.
    Medium,
}

impl ColourLevel {
    /// The wire format requested at this level.
    pub const fn pixel_format(self) -> PixelFormat {
        match self {
            ColourLevel::VeryLow => PixelFormat {
                bits_per_pixel: 8,
                depth: 3,
                big_endian: false,
                true_colour: true,
                red_max: 1,
                green_max: 1,
                blue_max: 1,
                red_shift: 2,
                green_shift: 1,
                blue_shift: 0,
            },
            ColourLevel::Low => PixelFormat {
                bits_per_pixel: 8,
                depth: 6,
                big_endian: false,
                true_colour: true,
                red_max: 3,
                green_max: 3,
                blue_max: 3,
                red_shift: 4,
                green_shift: 2,
                blue_shift: 0,
            },
            ColourLevel::Medium => PixelFormat {
                bits_per_pixel: 8,
                depth: 8,
                big_endian: false,
                true_colour: true,
                red_max: 7,
                green_max: 7,
                blue_max: 3,
                red_shift: 5,
                green_shift: 2,
                blue_shift: 0,
            },
        }
    }
}
