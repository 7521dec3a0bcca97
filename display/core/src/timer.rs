//! Timer Engine
//!
//! A continuous-time accumulator. The clock integrates `speed * elapsed` on
//! every tick and clamps at zero, so a countdown (`speed = -1`) stops at
//! `00:00:00` instead of going negative.
//!
//! All operations take the sampling instant explicitly. The dispatcher passes
//! `Instant::now()`; tests pass synthetic instants.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::command::TimeAdjust;

/// Default tick period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Timer state: speed multiplier, accumulated seconds, last sample
#[derive(Clone, Debug)]
pub struct TimerEngine {
    speed: f64,
    seconds: f64,
    last_sample: Instant,
}

impl TimerEngine {
    /// Idle timer at zero, sampled from `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            speed: 0.0,
            seconds: 0.0,
            last_sample: now,
        }
    }

    /// Current speed multiplier
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Accumulated seconds as of the last sample (never negative)
    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Instant of the last integration
    #[must_use]
    pub fn last_sample(&self) -> Instant {
        self.last_sample
    }

    /// Integrate elapsed time since the last sample, then clamp
    ///
    /// Returns the accumulated seconds after integration. An instant earlier
    /// than the last sample counts as zero elapsed time.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last_sample).as_secs_f64();
        self.seconds = (self.seconds + self.speed * dt).max(0.0);
        self.last_sample = now;
        self.seconds
    }

    /// Change the speed from `now` on
    ///
    /// Time elapsed before `now` is integrated at the previous speed first, so
    /// the new speed never applies retroactively.
    pub fn set_speed(&mut self, speed: f64, now: Instant) {
        self.tick(now);
        self.speed = speed;
    }

    /// Set or adjust the accumulated seconds
    pub fn set_time(&mut self, adjust: TimeAdjust, now: Instant) {
        self.tick(now);
        let seconds = match adjust {
            TimeAdjust::Absolute(value) => value,
            TimeAdjust::Relative(delta) => self.seconds + delta,
        };
        self.seconds = seconds.max(0.0);
    }

    /// `HH:MM:SS` rendering of the current accumulator
    #[must_use]
    pub fn display(&self) -> String {
        format_hms(self.seconds)
    }
}

/// Slack added before truncating, absorbs drift from summing tick intervals
const DISPLAY_EPSILON: f64 = 1e-6;

/// Format seconds as zero-padded `HH:MM:SS`
///
/// Fractions are truncated and the hour field grows past two digits when
/// needed. Negative input renders as zero. Values within a microsecond below
/// a whole second render as that second.
#[must_use]
pub fn format_hms(seconds: f64) -> String {
    // float-to-int `as` saturates, so huge values cannot wrap
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = (seconds.max(0.0) + DISPLAY_EPSILON).trunc() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Point-in-time view of the timer for notifications
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Formatted `HH:MM:SS`
    pub display: String,
    /// Accumulated seconds
    pub seconds: f64,
    /// Speed multiplier
    pub speed: f64,
}

impl From<&TimerEngine> for TimerSnapshot {
    fn from(timer: &TimerEngine) -> Self {
        Self {
            display: timer.display(),
            seconds: timer.seconds,
            speed: timer.speed,
        }
    }
}
