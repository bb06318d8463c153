//! Default timings shared by the stock action recipes.

use embassy_time::Duration;

/// Deadline after which hold-flavored actions give up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);
/// Window in which a press-and-release still counts as a tap.
pub const DEFAULT_TAP_TIME: Duration = Duration::from_millis(100);
/// Delay between the steps of a chained effect.
pub const DEFAULT_TAP_DELAY: Duration = Duration::from_millis(10);

/// Timing knobs for the recipes in [`crate::presets`].
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlexTimings {
    pub timeout: Duration,
    pub tap_time: Duration,
    pub tap_delay: Duration,
}

impl Default for FlexTimings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tap_time: DEFAULT_TAP_TIME,
            tap_delay: DEFAULT_TAP_DELAY,
        }
    }
}
