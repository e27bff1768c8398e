//! Forced-redraw timer for slow update cycles.
//!
//! Armed when an update cycle starts and disarmed when it ends. If a
//! cycle outlives the interval (a congested link trickling in a large
//! update), the watchdog fires so the session can flush partially
//! decoded content to the surface instead of leaving the window stale,
//! then re-arms for the next interval.

use std::time::{Duration, Instant};

/// Default interval between forced partial redraws.
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// Repeating deadline tracker; inert until armed.
#[derive(Debug, Clone)]
pub struct RedrawWatchdog {
    deadline: Option<Instant>,
    interval: Duration,
}

impl RedrawWatchdog {
    pub fn new(interval: Duration) -> Self {
        RedrawWatchdog {
            deadline: None,
            interval,
        }
    }

    /// Start (or restart) the countdown from now.
    pub fn arm(&mut self) {
        self.arm_at(Instant::now());
    }

    /// Start with an explicit clock (useful for testing).
    pub fn arm_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Stop the countdown; `poll` reports nothing until re-armed.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// The pending deadline, for hosts that multiplex timers.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once per elapsed interval while armed; re-arms itself on
    /// each firing.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Poll with an explicit clock (useful for testing).
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

impl Default for RedrawWatchdog {
    fn default() -> Self {
        RedrawWatchdog::new(DEFAULT_REDRAW_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_watchdog_never_fires() {
        let mut dog = RedrawWatchdog::default();
        assert!(!dog.poll_at(Instant::now() + Duration::from_secs(60)));
        assert_eq!(dog.deadline(), None);
    }

    #[test]
    fn fires_after_interval_and_rearms() {
        let mut dog = RedrawWatchdog::new(Duration::from_secs(1));
        let t0 = Instant::now();
        dog.arm_at(t0);

        assert!(!dog.poll_at(t0 + Duration::from_millis(500)));
        assert!(dog.poll_at(t0 + Duration::from_secs(1)));
        // Re-armed from the firing instant, not the original arm time.
        assert!(!dog.poll_at(t0 + Duration::from_millis(1500)));
        assert!(dog.poll_at(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn disarm_cancels_pending_deadline() {
        let mut dog = RedrawWatchdog::new(Duration::from_secs(1));
        let t0 = Instant::now();
        dog.arm_at(t0);
        dog.disarm();
        assert!(!dog.poll_at(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn rearming_pushes_the_deadline_out() {
        let mut dog = RedrawWatchdog::new(Duration::from_secs(1));
        let t0 = Instant::now();
        dog.arm_at(t0);
        dog.arm_at(t0 + Duration::from_millis(900));
        assert!(!dog.poll_at(t0 + Duration::from_secs(1)));
        assert!(dog.poll_at(t0 + Duration::from_millis(1900)));
    }
}
