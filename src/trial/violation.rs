//! Speed-limit violation intervals

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A contiguous span above the limit; `end_time` is `None` while open
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViolationInterval {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub speed_at_close: Option<f64>,
}

impl ViolationInterval {
    fn open(start_time: f64) -> Self {
        Self {
            start_time,
            end_time: None,
            speed_at_close: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// Tracks at most one open interval plus the closed ones, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationTracker {
    open: Option<ViolationInterval>,
    closed: Vec<ViolationInterval>,
    count: u32,
    last_speed: Option<f64>,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one speed sample
    ///
    /// Returns the interval closed by this sample, if any. Non-finite samples
    /// are dropped.
    pub fn on_sample(&mut self, speed: f64, limit: f64, now: f64) -> Option<ViolationInterval> {
        if !speed.is_finite() {
            debug!("Dropping non-finite speed sample at {:.3}", now);
            return None;
        }
        self.last_speed = Some(speed);

        match (speed > limit, self.open) {
            (true, None) => {
                debug!("Violation opened at {:.3} ({:.1} > {:.1})", now, speed, limit);
                self.open = Some(ViolationInterval::open(now));
                self.count += 1;
                None
            }
            (false, Some(_)) => self.close(now, speed),
            _ => None,
        }
    }

    /// Closes an interval still open when the trial ends
    ///
    /// The closing speed is the last accepted sample.
    pub fn close_open_interval_at_trial_end(&mut self, now: f64) -> Option<ViolationInterval> {
        let speed = self.last_speed?;
        self.close(now, speed)
    }

    fn close(&mut self, now: f64, speed: f64) -> Option<ViolationInterval> {
        let mut interval = self.open.take()?;
        interval.end_time = Some(now.max(interval.start_time));
        interval.speed_at_close = Some(speed);
        debug!(
            "Violation closed at {:.3} after {:.3}s",
            now,
            interval.duration().unwrap_or_default()
        );
        self.closed.push(interval);
        Some(interval)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_interval(&self) -> Option<&ViolationInterval> {
        self.open.as_ref()
    }

    pub fn intervals(&self) -> &[ViolationInterval] {
        &self.closed
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_speed(&self) -> Option<f64> {
        self.last_speed
    }
}
