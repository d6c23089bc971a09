//! Loop pacing derived from the settings snapshot.

use std::time::Duration;

use tracing::debug;

use crate::config::Settings;

/// Milliseconds per tick unit (20 ticks = 1s).
const TICK_UNIT_MS: u64 = 50;

/// Tick and frame intervals used by the orchestrator loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingsManager {
    /// Background tick: redraw pacing, resize polling, input timeout
    pub tick_interval_ms: u64,
    /// Frame pacing for animated overlays
    pub frame_interval_ms: u64,
}

impl TimingsManager {
    pub fn new(settings: &Settings) -> Self {
        let mut timings = Self {
            tick_interval_ms: 0,
            frame_interval_ms: 0,
        };
        timings.refresh(settings);
        timings
    }

    /// Recompute both intervals.
    ///
    /// `refresh_rate` is validated before it is committed to the settings, so it is
    /// never zero here.
    pub fn refresh(&mut self, settings: &Settings) {
        self.tick_interval_ms = u64::from(settings.tick_rate) * TICK_UNIT_MS;
        self.frame_interval_ms = 1000 / u64::from(settings.refresh_rate.max(1));
        debug!(
            "Timings refreshed: tick={}ms frame={}ms",
            self.tick_interval_ms, self.frame_interval_ms
        );
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let timings = TimingsManager::new(&Settings::default());
        assert_eq!(timings.tick_interval_ms, 100);
        assert_eq!(timings.frame_interval_ms, 200);
        assert_eq!(timings.tick(), Duration::from_millis(100));
    }

    #[test]
    fn test_refresh_picks_up_new_values() {
        let mut settings = Settings::default();
        let mut timings = TimingsManager::new(&settings);

        settings.tick_rate = 20;
        settings.refresh_rate = 60;
        timings.refresh(&settings);

        assert_eq!(timings.tick_interval_ms, 1000);
        // Integer division, as frames are scheduled in whole milliseconds
        assert_eq!(timings.frame_interval_ms, 16);
    }
}
