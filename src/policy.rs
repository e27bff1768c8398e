//! Bandwidth-adaptive format and encoding selection.
//!
//! A pure decision ladder over throughput samples: prefer the richest
//! encoding unconditionally, then — once the link has been measured long
//! enough — pick a JPEG quality tier and choose between full color and
//! the indexed palette. The caller applies the decision by scheduling
//! format/encoding changes; nothing here writes protocol messages.

use std::time::Duration;

use tokio::sync::watch;

use crate::encodings::Encoding;
use crate::types::ProtocolVersion;

/// Ignore measurements younger than this; early samples swing wildly.
const MIN_MEASUREMENT: Duration = Duration::from_secs(10);
/// Above this throughput, use the high JPEG quality tier.
const HIGH_QUALITY_THRESHOLD_KBPS: u32 = 16_000;
/// Above this throughput, full color beats the indexed palette.
const FULL_COLOUR_THRESHOLD_KBPS: u32 = 256;

const QUALITY_HIGH: u8 = 8;
const QUALITY_LOW: u8 = 6;

// ── Bandwidth measurement ────────────────────────────────────────

/// A point-in-time throughput measurement. Transient: evaluated and
/// discarded, never stored by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandwidthSample {
    /// Estimated downstream throughput in kbit/s; zero until the
    /// transport has a usable estimate.
    pub kbits_per_second: u32,
    /// Cumulative time the transport has spent waiting for server data.
    pub time_waited: Duration,
}

/// Source of bandwidth measurements, implemented by the transport.
pub trait BandwidthProbe {
    /// The latest measurement.
    fn sample(&self) -> BandwidthSample;
}

/// Transports that publish measurements over a `watch` channel get the
/// probe for free on the receiver half.
impl BandwidthProbe for watch::Receiver<BandwidthSample> {
    fn sample(&self) -> BandwidthSample {
        *self.borrow()
    }
}

// ── Decision ladder ──────────────────────────────────────────────

/// Current preferences the ladder evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    pub current_encoding: Encoding,
    /// Currently requested quality tier, if any.
    pub quality_level: Option<u8>,
    /// Whether configuration permits lossy encoding at all.
    pub lossy_allowed: bool,
    pub full_colour: bool,
    pub version: ProtocolVersion,
}

/// What should change. `None` everywhere means the current settings
/// stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecision {
    pub encoding: Option<Encoding>,
    pub quality_level: Option<u8>,
    pub full_colour: Option<bool>,
}

impl PolicyDecision {
    pub fn is_noop(&self) -> bool {
        self.encoding.is_none() && self.quality_level.is_none() && self.full_colour.is_none()
    }
}

/// Evaluate one sample against the current preferences.
pub fn auto_select(sample: &BandwidthSample, ctx: &PolicyContext) -> PolicyDecision {
    let mut decision = PolicyDecision::default();

    // Tight handles the widest range of content; always prefer it.
    if ctx.current_encoding != Encoding::Tight {
        decision.encoding = Some(Encoding::Tight);
    }

    // Quality and color decisions need a settled measurement.
    if sample.kbits_per_second == 0 || sample.time_waited < MIN_MEASUREMENT {
        return decision;
    }

    if ctx.lossy_allowed {
        let tier = if sample.kbits_per_second > HIGH_QUALITY_THRESHOLD_KBPS {
            QUALITY_HIGH
        } else {
            QUALITY_LOW
        };
        if ctx.quality_level != Some(tier) {
            decision.quality_level = Some(tier);
        }
    }

    // Old TightVNC servers send cursor rects encoded under the previous
    // format while a change is in flight; never flip color modes on
    // anything before 3.8.
    if ctx.version.before(3, 8) {
        return decision;
    }

    let full = sample.kbits_per_second > FULL_COLOUR_THRESHOLD_KBPS;
    if full != ctx.full_colour {
        decision.full_colour = Some(full);
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx() -> PolicyContext {
        PolicyContext {
            current_encoding: Encoding::Tight,
            quality_level: Some(8),
            lossy_allowed: true,
            full_colour: true,
            version: ProtocolVersion::new(3, 8),
        }
    }

    fn sample(kbps: u32, secs: u64) -> BandwidthSample {
        BandwidthSample {
            kbits_per_second: kbps,
            time_waited: Duration::from_secs(secs),
        }
    }

    fn apply(ctx: &mut PolicyContext, decision: &PolicyDecision) {
        if let Some(enc) = decision.encoding {
            ctx.current_encoding = enc;
        }
        if let Some(q) = decision.quality_level {
            ctx.quality_level = Some(q);
        }
        if let Some(fc) = decision.full_colour {
            ctx.full_colour = fc;
        }
    }

    #[test]
    fn always_prefers_tight() {
        let context = PolicyContext {
            current_encoding: Encoding::Hextile,
            ..ctx()
        };
        // Even with no usable measurement.
        let decision = auto_select(&sample(0, 0), &context);
        assert_eq!(decision.encoding, Some(Encoding::Tight));
        assert_eq!(decision.quality_level, None);
        assert_eq!(decision.full_colour, None);
    }

    #[test]
    fn young_or_idle_measurement_changes_nothing_else() {
        let context = PolicyContext {
            full_colour: false,
            quality_level: None,
            ..ctx()
        };
        assert!(auto_select(&sample(0, 3600), &context).is_noop());
        assert!(auto_select(&sample(50_000, 9), &context).is_noop());
        // Exactly at the threshold counts as settled.
        assert!(!auto_select(&sample(50_000, 10), &context).is_noop());
    }

    #[test]
    fn quality_tier_boundaries() {
        let context = PolicyContext {
            quality_level: None,
            ..ctx()
        };
        assert_eq!(
            auto_select(&sample(16_000, 60), &context).quality_level,
            Some(QUALITY_LOW)
        );
        assert_eq!(
            auto_select(&sample(16_001, 60), &context).quality_level,
            Some(QUALITY_HIGH)
        );
    }

    #[test]
    fn quality_unchanged_when_already_on_tier() {
        let context = PolicyContext {
            quality_level: Some(QUALITY_HIGH),
            ..ctx()
        };
        assert_eq!(
            auto_select(&sample(20_000, 60), &context).quality_level,
            None
        );
    }

    #[test]
    fn lossless_configuration_never_touches_quality() {
        let context = PolicyContext {
            lossy_allowed: false,
            quality_level: None,
            ..ctx()
        };
        let decision = auto_select(&sample(20_000, 60), &context);
        assert_eq!(decision.quality_level, None);
        // The color decision still runs.
        assert_eq!(decision.full_colour, None);
    }

    #[test]
    fn full_colour_boundaries() {
        let indexed = PolicyContext {
            full_colour: false,
            ..ctx()
        };
        assert_eq!(auto_select(&sample(256, 60), &indexed).full_colour, None);
        assert_eq!(
            auto_select(&sample(257, 60), &indexed).full_colour,
            Some(true)
        );

        let full = ctx();
        assert_eq!(
            auto_select(&sample(200, 60), &full).full_colour,
            Some(false)
        );
    }

    #[test]
    fn legacy_server_freezes_colour_but_not_quality() {
        let context = PolicyContext {
            version: ProtocolVersion::new(3, 7),
            full_colour: false,
            quality_level: None,
            ..ctx()
        };
        let decision = auto_select(&sample(50_000, 60), &context);
        assert_eq!(decision.quality_level, Some(QUALITY_HIGH));
        assert_eq!(decision.full_colour, None);
    }

    #[test]
    fn converges_after_one_application() {
        let mut context = PolicyContext {
            current_encoding: Encoding::Hextile,
            full_colour: false,
            quality_level: None,
            ..ctx()
        };
        let s = sample(20_000, 60);
        let first = auto_select(&s, &context);
        assert!(!first.is_noop());
        apply(&mut context, &first);
        assert!(auto_select(&s, &context).is_noop());
    }

    #[test]
    fn watch_receiver_serves_latest_sample() {
        let (tx, rx) = watch::channel(BandwidthSample::default());
        assert_eq!(rx.sample(), BandwidthSample::default());
        tx.send(sample(1234, 42)).unwrap();
        assert_eq!(rx.sample().kbits_per_second, 1234);
    }

    proptest! {
        /// Feeding any settled sample back through `apply` reaches a
        /// fixed point in one step.
        #[test]
        fn decision_is_idempotent(kbps in 1u32..200_000, secs in 10u64..10_000) {
            let mut context = PolicyContext {
                current_encoding: Encoding::Zrle,
                full_colour: false,
                quality_level: None,
                ..ctx()
            };
            let s = sample(kbps, secs);
            let first = auto_select(&s, &context);
            apply(&mut context, &first);
            prop_assert!(auto_select(&s, &context).is_noop());
        }

        /// More bandwidth never selects a lower quality tier or a
        /// narrower color mode.
        #[test]
        fn richer_links_never_downgrade(kbps in 1u32..200_000) {
            let context = PolicyContext {
                full_colour: false,
                quality_level: None,
                ..ctx()
            };
            let low = auto_select(&sample(kbps, 60), &context);
            let high = auto_select(&sample(kbps.saturating_mul(2), 60), &context);
            let tier = |d: &PolicyDecision| d.quality_level.unwrap_or(0);
            prop_assert!(tier(&high) >= tier(&low));
            let colour = |d: &PolicyDecision| d.full_colour.unwrap_or(false);
            prop_assert!(colour(&high) as u8 >= colour(&low) as u8);
        }
    }
}
