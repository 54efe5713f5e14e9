//! Summary statistics of a finished trial

use super::lifecycle::TrialRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResults {
    /// Seconds between start and end
    pub duration: f64,
    /// Mean of all speed samples in mph, 0 without samples
    pub average_speed: f64,
    /// Mean violation length in seconds, 0 without violations
    pub average_violation_duration: f64,
    pub violation_count: u32,
    pub max_speed: f64,
    /// `+∞` when no sample was taken
    pub min_speed: f64,
}

impl TrialResults {
    /// Derives results from a run record
    ///
    /// Pure: evaluating the same record twice gives identical results. A record
    /// without end time has zero duration.
    pub fn from_record(record: &TrialRecord) -> Self {
        let duration = match (record.start_time, record.end_time) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        };

        let average_speed = if record.speed_sample_count > 0 {
            record.speed_sample_sum / record.speed_sample_count as f64
        } else {
            0.0
        };

        let durations: Vec<f64> = record
            .violations
            .intervals()
            .iter()
            .filter_map(|interval| interval.duration())
            .collect();
        let average_violation_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        Self {
            duration,
            average_speed,
            average_violation_duration,
            violation_count: record.violations.count(),
            max_speed: record.max_speed,
            min_speed: record.min_speed,
        }
    }

    /// Lines of the results screen
    pub fn summary_lines(&self) -> Vec<String> {
        let min_speed = if self.min_speed.is_finite() {
            format!("{:.2} mph", self.min_speed)
        } else {
            "--".to_string()
        };
        vec![
            format!("Trial Duration: {}", format_time(self.duration)),
            format!("Average Speed: {:.2} mph", self.average_speed),
            format!(
                "Average Violation Duration: {:.2} seconds",
                self.average_violation_duration
            ),
            format!("Violation Count: {}", self.violation_count),
            format!("Max Speed: {:.2} mph", self.max_speed),
            format!("Min Speed: {}", min_speed),
        ]
    }
}

/// `MM:SS:cc` with hundredths in the last field
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hundredths = ((seconds % 1.0) * 100.0) as u64;
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0) as u64;
    format!("{:02}:{:02}:{:02}", minutes, secs, hundredths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::violation::ViolationTracker;

    fn record(sum: f64, count: u64) -> TrialRecord {
        TrialRecord {
            start_time: Some(10.0),
            end_time: Some(25.5),
            speed_sample_sum: sum,
            speed_sample_count: count,
            max_speed: 42.0,
            min_speed: 12.0,
            violations: ViolationTracker::new(),
        }
    }

    #[test]
    fn test_average_speed() {
        let results = TrialResults::from_record(&record(300.0, 10));
        assert_eq!(results.average_speed, 30.0);
        assert_eq!(results.duration, 15.5);
        assert_eq!(results.max_speed, 42.0);
        assert_eq!(results.min_speed, 12.0);
    }

    #[test]
    fn test_zero_samples_and_violations() {
        let results = TrialResults::from_record(&record(0.0, 0));
        assert_eq!(results.average_speed, 0.0);
        assert_eq!(results.average_violation_duration, 0.0);
        assert_eq!(results.violation_count, 0);
    }

    #[test]
    fn test_average_violation_duration() {
        let mut rec = record(0.0, 0);
        for (t, speed) in [50.0, 50.0, 30.0, 30.0, 60.0].into_iter().enumerate() {
            rec.violations.on_sample(speed, 40.0, t as f64);
        }
        rec.violations.close_open_interval_at_trial_end(5.0);

        let results = TrialResults::from_record(&rec);
        assert_eq!(results.violation_count, 2);
        assert_eq!(results.average_violation_duration, 1.5);
    }

    #[test]
    fn test_idempotent() {
        let rec = record(123.0, 7);
        assert_eq!(TrialResults::from_record(&rec), TrialResults::from_record(&rec));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(75.25), "01:15:25");
        assert_eq!(format_time(-3.0), "00:00:00");
    }

    #[test]
    fn test_summary_lines() {
        let mut results = TrialResults::from_record(&record(300.0, 10));
        let lines = results.summary_lines();
        assert_eq!(lines[0], "Trial Duration: 00:15:50");
        assert_eq!(lines[1], "Average Speed: 30.00 mph");
        assert_eq!(lines.len(), 6);

        results.min_speed = f64::INFINITY;
        assert_eq!(results.summary_lines()[5], "Min Speed: --");
    }
}
