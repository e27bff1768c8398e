//! Canonical view of the remote display.
//!
//! [`ServerState`] is owned exclusively by the session and mutated only in
//! response to negotiated changes. In particular `pixel_format` is the
//! **committed** wire format: it changes only when a scheduled format
//! change activates at a safe point, never speculatively.

use crate::config::SessionConfig;
use crate::pixels::PixelFormat;
use crate::types::ProtocolVersion;

// ── ServerCapabilities ───────────────────────────────────────────

/// Optional protocol features in play for this session.
///
/// The first five are client-advertised (we include the matching
/// pseudo-encodings in every encoding list); the last two start `false`
/// and latch `true` when the server first signals support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCapabilities {
    /// Client-side cursor rendering.
    pub local_cursor: bool,
    /// Server-driven desktop resize.
    pub desktop_resize: bool,
    /// Multi-screen desktop layout changes.
    pub extended_desktop_size: bool,
    /// Desktop name changes.
    pub desktop_rename: bool,
    /// Keyboard LED state reporting.
    pub led_state: bool,
    /// Continuous updates; latched by the first end-of-continuous-updates
    /// marker the server sends.
    pub continuous_updates: bool,
    /// Fence synchronization; latched by the first fence message.
    pub fence: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        ServerCapabilities {
            local_cursor: true,
            desktop_resize: true,
            extended_desktop_size: true,
            desktop_rename: true,
            led_state: true,
            continuous_updates: false,
            fence: false,
        }
    }
}

// ── ServerState ──────────────────────────────────────────────────

/// Everything the session knows about the remote framebuffer.
#[derive(Debug, Clone)]
pub struct ServerState {
    width: u16,
    height: u16,
    name: String,
    pixel_format: PixelFormat,
    version: ProtocolVersion,
    caps: ServerCapabilities,
    compress_level: Option<u8>,
    quality_level: Option<u8>,
}

impl ServerState {
    /// Fresh state for a session about to receive its init event.
    ///
    /// Compression and quality levels come from the configuration;
    /// everything else is filled in by the init handler.
    pub fn new(config: &SessionConfig) -> Self {
        ServerState {
            width: 0,
            height: 0,
            name: String::new(),
            pixel_format: PixelFormat::rgb888(),
            version: ProtocolVersion::default(),
            caps: ServerCapabilities::default(),
            compress_level: config.compress_level,
            quality_level: config.quality_level,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The committed wire format updates are decoded under.
    pub fn pixel_format(&self) -> &PixelFormat {
        &self.pixel_format
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn caps(&self) -> &ServerCapabilities {
        &self.caps
    }

    pub fn caps_mut(&mut self) -> &mut ServerCapabilities {
        &mut self.caps
    }

    pub fn compress_level(&self) -> Option<u8> {
        self.compress_level
    }

    pub fn quality_level(&self) -> Option<u8> {
        self.quality_level
    }

    /// True when the negotiated protocol predates `major.minor`.
    pub fn before_version(&self, major: u32, minor: u32) -> bool {
        self.version.before(major, minor)
    }

    pub fn set_dimensions(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format;
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn set_compress_level(&mut self, level: Option<u8>) {
        self.compress_level = level;
    }

    pub fn set_quality_level(&mut self, level: Option<u8>) {
        self.quality_level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_default_advertises_client_features() {
        let caps = ServerCapabilities::default();
        assert!(caps.local_cursor);
        assert!(caps.desktop_resize);
        assert!(caps.extended_desktop_size);
        assert!(caps.desktop_rename);
        assert!(caps.led_state);
        assert!(!caps.continuous_updates);
        assert!(!caps.fence);
    }

    #[test]
    fn new_state_takes_levels_from_config() {
        let config = SessionConfig {
            compress_level: Some(2),
            quality_level: None,
            ..SessionConfig::default()
        };
        let state = ServerState::new(&config);
        assert_eq!(state.compress_level(), Some(2));
        assert_eq!(state.quality_level(), None);
        assert_eq!(state.pixel_format(), &PixelFormat::rgb888());
        assert_eq!(state.width(), 0);
    }

    #[test]
    fn before_version_uses_negotiated_version() {
        let mut state = ServerState::new(&SessionConfig::default());
        state.set_version(ProtocolVersion::new(3, 7));
        assert!(state.before_version(3, 8));
        state.set_version(ProtocolVersion::new(3, 8));
        assert!(!state.before_version(3, 8));
    }
}
