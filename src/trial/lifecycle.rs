use statum::{machine, state};
use tracing::{debug, info, warn};

use super::results::TrialResults;
use super::violation::{ViolationInterval, ViolationTracker};
use super::{TrialError, TrialPhase, TrialSettings};
use crate::vehicle::actuator::{Actuator, ActuatorError, Transform};

// Raw counters of one run, reset when the run starts
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub speed_sample_sum: f64,
    pub speed_sample_count: u64,
    pub max_speed: f64,
    pub min_speed: f64,
    pub violations: ViolationTracker,
}

impl TrialRecord {
    /// Zeroed counters of a run starting at `now`
    pub fn started_at(now: f64) -> Self {
        Self {
            start_time: Some(now),
            ..Self::default()
        }
    }
}

impl Default for TrialRecord {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            speed_sample_sum: 0.0,
            speed_sample_count: 0,
            max_speed: 0.0,
            min_speed: f64::INFINITY,
            violations: ViolationTracker::new(),
        }
    }
}

// Countdown window, in the same clock as every `now` passed in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownTimer {
    pub started_at: f64,
    pub duration: f64,
}

impl CountdownTimer {
    pub fn remaining(&self, now: f64) -> f64 {
        (self.started_at + self.duration - now).max(0.0)
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum TrialState {
    Idle,
    Staged,
    Countdown(CountdownTimer),
    Running,
    Finished(TrialResults),
}

#[machine]
#[derive(Debug)]
pub struct TrialRun<S: TrialState> {
    record: TrialRecord,
}

impl<S: TrialState> TrialRun<S> {
    pub fn record(&self) -> &TrialRecord {
        &self.record
    }
}

impl TrialRun<Idle> {
    pub fn create() -> Self {
        Self::new(TrialRecord::default())
    }

    pub fn stage(self) -> TrialRun<Staged> {
        self.transition()
    }
}

impl TrialRun<Staged> {
    pub fn begin_countdown(self, now: f64, duration: f64) -> TrialRun<Countdown> {
        info!("Countdown of {:.1}s started", duration);
        self.transition_with(CountdownTimer {
            started_at: now,
            duration,
        })
    }

    pub fn start_running(mut self, now: f64) -> TrialRun<Running> {
        self.record = TrialRecord::started_at(now);
        info!("Trial running from t={:.3}", now);
        self.transition()
    }
}

impl TrialRun<Countdown> {
    pub fn remaining(&self, now: f64) -> f64 {
        self.get_state_data()
            .map(|timer| timer.remaining(now))
            .unwrap_or_default()
    }

    pub fn start_running(mut self, now: f64) -> TrialRun<Running> {
        self.record = TrialRecord::started_at(now);
        info!("Trial running from t={:.3}, countdown done", now);
        self.transition()
    }
}

impl TrialRun<Running> {
    pub fn track_speed(&mut self, speed: f64, limit: f64, now: f64) -> Option<ViolationInterval> {
        if !speed.is_finite() {
            debug!("Ignoring non-finite speed sample");
            return None;
        }
        let record = &mut self.record;
        record.speed_sample_sum += speed;
        record.speed_sample_count += 1;
        record.max_speed = record.max_speed.max(speed);
        record.min_speed = record.min_speed.min(speed);
        record.violations.on_sample(speed, limit, now)
    }

    pub fn finish(mut self, now: f64) -> TrialRun<Finished> {
        if let Some(interval) = self.record.violations.close_open_interval_at_trial_end(now) {
            debug!("Closed violation still open at trial end: {:?}", interval);
        }
        self.record.end_time = Some(now);
        let results = TrialResults::from_record(&self.record);
        info!(
            "Trial finished: {:.2}s, {} violation(s)",
            results.duration, results.violation_count
        );
        self.transition_with(results)
    }
}

impl TrialRun<Finished> {
    pub fn results(&self) -> TrialResults {
        self.get_state_data()
            .copied()
            .unwrap_or_else(|| TrialResults::from_record(&self.record))
    }
}

// Runtime view over the typestate machine
#[derive(Debug)]
enum TrialLifecycle {
    Idle(TrialRun<Idle>),
    Staged(TrialRun<Staged>),
    Countdown(TrialRun<Countdown>),
    Running(TrialRun<Running>),
    Finished(TrialRun<Finished>),
}

impl TrialLifecycle {
    fn phase(&self) -> TrialPhase {
        match self {
            TrialLifecycle::Idle(_) => TrialPhase::Idle,
            TrialLifecycle::Staged(_) => TrialPhase::Staged,
            TrialLifecycle::Countdown(_) => TrialPhase::Countdown,
            TrialLifecycle::Running(_) => TrialPhase::Running,
            TrialLifecycle::Finished(_) => TrialPhase::Finished,
        }
    }

    fn record(&self) -> &TrialRecord {
        match self {
            TrialLifecycle::Idle(run) => run.record(),
            TrialLifecycle::Staged(run) => run.record(),
            TrialLifecycle::Countdown(run) => run.record(),
            TrialLifecycle::Running(run) => run.record(),
            TrialLifecycle::Finished(run) => run.record(),
        }
    }
}

/// Staged → countdown → running → finished lifecycle of a trial run
///
/// Commands that are not valid in the current phase return
/// [`TrialError::InvalidTransition`] and leave the state untouched.
#[derive(Debug)]
pub struct TrialStateMachine {
    lifecycle: TrialLifecycle,
    settings: TrialSettings,
}

impl TrialStateMachine {
    pub fn new(settings: TrialSettings) -> Self {
        Self {
            lifecycle: TrialLifecycle::Idle(TrialRun::<Idle>::create()),
            settings,
        }
    }

    pub fn settings(&self) -> &TrialSettings {
        &self.settings
    }

    pub fn phase(&self) -> TrialPhase {
        self.lifecycle.phase()
    }

    pub fn record(&self) -> &TrialRecord {
        self.lifecycle.record()
    }

    /// Aborts any current run, teleports to the start pose and stages a new run
    ///
    /// A rejected teleport is retried on each of the actuator's spawn points in
    /// order. When every pose is rejected the last rejection is returned, or
    /// [`ActuatorError::NoSpawnPoint`] when there was nothing to fall back to,
    /// and the machine is left `Idle`.
    pub fn start_trial<A: Actuator + ?Sized>(
        &mut self,
        actuator: &mut A,
    ) -> Result<Transform, TrialError> {
        match self.phase() {
            TrialPhase::Countdown | TrialPhase::Running => {
                info!("Aborting {:?} trial, no results recorded", self.phase())
            }
            TrialPhase::Finished => debug!("Discarding finished trial"),
            TrialPhase::Idle | TrialPhase::Staged => {}
        }
        self.lifecycle = TrialLifecycle::Idle(TrialRun::<Idle>::create());

        let pose = teleport(actuator, self.settings.start_pose)?;
        actuator.stop();

        self.lifecycle = TrialLifecycle::Staged(TrialRun::<Idle>::create().stage());
        info!("Trial staged at {}", pose);
        Ok(pose)
    }

    /// Leaves `Staged`, through the countdown when one is configured
    pub fn initiate_trial(&mut self, now: f64) -> Result<TrialPhase, TrialError> {
        let lifecycle = self.take();
        self.lifecycle = match lifecycle {
            TrialLifecycle::Staged(run) => {
                let countdown = self.settings.countdown_duration;
                if countdown > 0.0 {
                    TrialLifecycle::Countdown(run.begin_countdown(now, countdown))
                } else {
                    TrialLifecycle::Running(run.start_running(now))
                }
            }
            other => return self.reject(other, "initiate_trial"),
        };
        Ok(self.phase())
    }

    /// Advances time-driven transitions; returns the new phase when one happened
    pub fn update(&mut self, now: f64) -> Option<TrialPhase> {
        let expired = match &self.lifecycle {
            TrialLifecycle::Countdown(run) => run.remaining(now) <= 0.0,
            _ => false,
        };
        if !expired {
            return None;
        }

        match self.take() {
            TrialLifecycle::Countdown(run) => {
                self.lifecycle = TrialLifecycle::Running(run.start_running(now));
                Some(TrialPhase::Running)
            }
            other => {
                self.lifecycle = other;
                None
            }
        }
    }

    /// Records a speed sample (mph) of the running trial
    pub fn track_speed(
        &mut self,
        speed: f64,
        now: f64,
    ) -> Result<Option<ViolationInterval>, TrialError> {
        let limit = self.settings.speed_limit;
        match &mut self.lifecycle {
            TrialLifecycle::Running(run) => Ok(run.track_speed(speed, limit, now)),
            other => Err(TrialError::InvalidTransition {
                operation: "track_speed",
                phase: other.phase(),
            }),
        }
    }

    pub fn end_trial(&mut self, now: f64) -> Result<TrialResults, TrialError> {
        let lifecycle = self.take();
        match lifecycle {
            TrialLifecycle::Running(run) => {
                let finished = run.finish(now);
                let results = finished.results();
                self.lifecycle = TrialLifecycle::Finished(finished);
                Ok(results)
            }
            other => self.reject(other, "end_trial"),
        }
    }

    /// Results of the last finished run, `None` in any other phase
    pub fn results(&self) -> Option<TrialResults> {
        match &self.lifecycle {
            TrialLifecycle::Finished(run) => Some(run.results()),
            _ => None,
        }
    }

    /// Seconds since the run started, frozen once finished
    pub fn elapsed(&self, now: f64) -> f64 {
        let record = self.record();
        match (&self.lifecycle, record.start_time) {
            (TrialLifecycle::Running(_), Some(start)) => (now - start).max(0.0),
            (TrialLifecycle::Finished(run), _) => run.results().duration,
            _ => 0.0,
        }
    }

    pub fn countdown_remaining(&self, now: f64) -> Option<f64> {
        match &self.lifecycle {
            TrialLifecycle::Countdown(run) => Some(run.remaining(now)),
            _ => None,
        }
    }

    pub fn violation_count(&self) -> u32 {
        self.record().violations.count()
    }

    pub fn is_speeding(&self) -> bool {
        self.record().violations.is_open()
    }

    fn take(&mut self) -> TrialLifecycle {
        std::mem::replace(
            &mut self.lifecycle,
            TrialLifecycle::Idle(TrialRun::<Idle>::create()),
        )
    }

    fn reject<T>(
        &mut self,
        lifecycle: TrialLifecycle,
        operation: &'static str,
    ) -> Result<T, TrialError> {
        let phase = lifecycle.phase();
        self.lifecycle = lifecycle;
        warn!("{} ignored while {:?}", operation, phase);
        Err(TrialError::InvalidTransition { operation, phase })
    }
}

fn teleport<A: Actuator + ?Sized>(
    actuator: &mut A,
    pose: Transform,
) -> Result<Transform, ActuatorError> {
    let mut last_error = match actuator.set_transform(pose) {
        Ok(()) => return Ok(pose),
        Err(e) => e,
    };
    warn!("Start pose rejected: {}", last_error);

    let spawn_points = actuator.spawn_points();
    if spawn_points.is_empty() {
        return Err(ActuatorError::NoSpawnPoint);
    }
    for fallback in spawn_points {
        match actuator.set_transform(fallback) {
            Ok(()) => {
                warn!("Using fallback spawn point {}", fallback);
                return Ok(fallback);
            }
            Err(e) => {
                warn!("Fallback spawn point rejected: {}", e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::actuator::{KinematicActuator, Location, Rotation};

    fn machine(countdown: f64) -> TrialStateMachine {
        TrialStateMachine::new(TrialSettings {
            speed_limit: 40.0,
            countdown_duration: countdown,
            ..TrialSettings::default()
        })
    }

    fn spawn(x: f64) -> Transform {
        Transform::new(Location { x, y: 0.0, z: 0.5 }, Rotation::default())
    }

    #[test]
    fn test_end_to_end_single_violation() {
        let mut actuator = KinematicActuator::new(0.0);
        let mut trial = machine(0.0);

        trial.start_trial(&mut actuator).unwrap();
        assert_eq!(trial.phase(), TrialPhase::Staged);
        assert_eq!(actuator.transform(), TrialSettings::default().start_pose);

        assert_eq!(trial.initiate_trial(10.0).unwrap(), TrialPhase::Running);
        trial.track_speed(45.0, 11.0).unwrap();
        assert!(trial.is_speeding());

        let results = trial.end_trial(12.0).unwrap();
        assert_eq!(trial.phase(), TrialPhase::Finished);
        assert_eq!(results.violation_count, 1);
        assert_eq!(results.duration, 2.0);
        assert_eq!(results.average_violation_duration, 1.0);

        let intervals = trial.record().violations.intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end_time, Some(12.0));
        assert_eq!(intervals[0].speed_at_close, Some(45.0));
    }

    #[test]
    fn test_counters_reset_on_initiate() {
        let mut actuator = KinematicActuator::new(0.0);
        let mut trial = machine(0.0);
        trial.start_trial(&mut actuator).unwrap();
        trial.initiate_trial(0.0).unwrap();
        trial.track_speed(80.0, 1.0).unwrap();
        trial.end_trial(2.0).unwrap();

        trial.start_trial(&mut actuator).unwrap();
        trial.initiate_trial(5.0).unwrap();
        let record = trial.record();
        assert_eq!(record.speed_sample_count, 0);
        assert_eq!(record.violations.count(), 0);
        assert_eq!(record.min_speed, f64::INFINITY);
        assert_eq!(record.start_time, Some(5.0));
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut trial = machine(0.0);
        assert!(matches!(
            trial.end_trial(1.0),
            Err(TrialError::InvalidTransition {
                operation: "end_trial",
                phase: TrialPhase::Idle
            })
        ));
        assert!(trial.initiate_trial(1.0).is_err());
        assert!(trial.track_speed(10.0, 1.0).is_err());
        assert_eq!(trial.phase(), TrialPhase::Idle);

        let mut actuator = KinematicActuator::new(0.0);
        trial.start_trial(&mut actuator).unwrap();
        assert!(trial.end_trial(2.0).is_err());
        assert_eq!(trial.phase(), TrialPhase::Staged);
    }

    #[test]
    fn test_countdown_then_running() {
        let mut actuator = KinematicActuator::new(0.0);
        let mut trial = machine(5.0);
        trial.start_trial(&mut actuator).unwrap();

        assert_eq!(trial.initiate_trial(100.0).unwrap(), TrialPhase::Countdown);
        assert_eq!(trial.countdown_remaining(102.0), Some(3.0));
        assert!(trial.track_speed(50.0, 102.0).is_err());
        assert_eq!(trial.update(104.9), None);

        assert_eq!(trial.update(105.0), Some(TrialPhase::Running));
        assert_eq!(trial.record().start_time, Some(105.0));
        assert_eq!(trial.elapsed(107.5), 2.5);
    }

    #[test]
    fn test_start_trial_aborts_running_run() {
        let mut actuator = KinematicActuator::new(0.0);
        let mut trial = machine(0.0);
        trial.start_trial(&mut actuator).unwrap();
        trial.initiate_trial(0.0).unwrap();
        trial.track_speed(50.0, 1.0).unwrap();

        trial.start_trial(&mut actuator).unwrap();
        assert_eq!(trial.phase(), TrialPhase::Staged);
        assert!(trial.results().is_none());
        assert_eq!(trial.violation_count(), 0);
    }

    #[test]
    fn test_rejected_teleport_uses_fallback() {
        let mut actuator = KinematicActuator::new(0.0)
            .with_spawn_points(vec![spawn(1.0), spawn(2.0)])
            .rejecting_teleports(2);
        let mut trial = machine(0.0);

        assert_eq!(trial.start_trial(&mut actuator).unwrap(), spawn(2.0));
        assert_eq!(trial.phase(), TrialPhase::Staged);
    }

    #[test]
    fn test_all_poses_rejected() {
        let mut actuator = KinematicActuator::new(0.0)
            .with_spawn_points(vec![spawn(1.0)])
            .rejecting_teleports(usize::MAX);
        let mut trial = machine(0.0);

        let err = trial.start_trial(&mut actuator).unwrap_err();
        assert_eq!(
            err,
            TrialError::Teleport(ActuatorError::TeleportRejected(spawn(1.0)))
        );
        assert_eq!(trial.phase(), TrialPhase::Idle);
    }

    #[test]
    fn test_rejected_teleport_without_spawn_points() {
        let mut actuator = KinematicActuator::new(0.0).rejecting_teleports(1);
        let mut trial = machine(0.0);

        let err = trial.start_trial(&mut actuator).unwrap_err();
        assert_eq!(err, TrialError::Teleport(ActuatorError::NoSpawnPoint));
        assert_eq!(trial.phase(), TrialPhase::Idle);

        // The rejection budget is spent, the next attempt lands on the start pose
        assert!(trial.start_trial(&mut actuator).is_ok());
        assert_eq!(trial.phase(), TrialPhase::Staged);
    }

    #[test]
    fn test_results_are_stable() {
        let mut actuator = KinematicActuator::new(0.0);
        let mut trial = machine(0.0);
        trial.start_trial(&mut actuator).unwrap();
        trial.initiate_trial(0.0).unwrap();
        trial.track_speed(30.0, 1.0).unwrap();
        trial.end_trial(3.0).unwrap();

        assert_eq!(trial.results(), trial.results());
        assert_eq!(trial.elapsed(50.0), 3.0);
    }
}
