use std::collections::VecDeque;
use tracing::{debug, info, warn};

use super::hud::HudSnapshot;
use super::notifications::{
    Notifications, DEFAULT_NOTIFICATION_SECONDS, STAGING_NOTIFICATION_SECONDS,
};
use crate::controller::raw_input::RawInputState;
use crate::mapping::binding::BindingTable;
use crate::mapping::control_mapper::ControlMapper;
use crate::mapping::dispatcher::{Command, CommandDispatcher};
use crate::persistence::{HudSettings, SessionSettings};
use crate::trial::{TrialError, TrialPhase, TrialStateMachine};
use crate::vehicle::actuator::{speed_mph, Actuator};
use crate::vehicle::drive::DriveController;
use crate::vehicle::VehicleControlVector;

/// Seconds the "Go!" banner stays up after a run starts
pub const GO_BANNER_SECONDS: f64 = 1.0;

/// Per-frame orchestrator over input, vehicle and trial state
///
/// Exactly one caller drives [`DrivingSession::tick`]; commands submitted
/// between ticks are applied at the start of the next one.
pub struct DrivingSession<A: Actuator> {
    actuator: A,
    bindings: BindingTable,
    drive: DriveController,
    dispatcher: CommandDispatcher,
    trial: TrialStateMachine,
    hud: HudSettings,
    pending: VecDeque<Command>,
    notifications: Notifications,
    hud_visible: bool,
    current_speed_mph: f64,
    go_until: Option<f64>,
}

impl<A: Actuator> DrivingSession<A> {
    pub fn new(settings: &SessionSettings, actuator: A) -> Self {
        info!("Starting driving session");
        Self {
            actuator,
            bindings: settings.bindings.clone(),
            drive: DriveController::new(settings.damping),
            dispatcher: CommandDispatcher::new(),
            trial: TrialStateMachine::new(settings.trial),
            hud: settings.hud,
            pending: VecDeque::new(),
            notifications: Notifications::default(),
            hud_visible: true,
            current_speed_mph: 0.0,
            go_until: None,
        }
    }

    /// Queues a command for the next tick
    pub fn submit(&mut self, command: Command) {
        debug!("Queued {}", command);
        self.pending.push_back(command);
    }

    /// Runs one frame and returns the control vector sent to the actuator
    ///
    /// Order: resolve controls, apply queued and newly pressed commands,
    /// shape the control vector, hand it to the actuator, sample speed, then
    /// update the trial.
    pub fn tick(&mut self, raw: &RawInputState, now: f64) -> VehicleControlVector {
        let resolved = ControlMapper::resolve(raw, &self.bindings);

        let mut commands: Vec<Command> = self.pending.drain(..).collect();
        commands.extend(self.dispatcher.dispatch(&resolved, self.trial.phase()));

        let mut staged = false;
        for command in commands {
            staged |= self.apply_command(command, now);
        }

        if self.trial.update(now) == Some(TrialPhase::Running) {
            self.go_until = Some(now + GO_BANNER_SECONDS);
        }

        let control = if staged || self.trial.phase() == TrialPhase::Countdown {
            self.drive.locked()
        } else {
            self.drive.update(raw, &resolved)
        };
        self.actuator.apply_control(&control);
        self.actuator.set_light_state(self.drive.lights());

        self.current_speed_mph = speed_mph(self.actuator.velocity());
        if self.trial.phase() == TrialPhase::Running {
            if let Err(e) = self.trial.track_speed(self.current_speed_mph, now) {
                debug!("Speed sample dropped: {}", e);
            }
        }

        self.notifications.expire(now);
        control
    }

    // Returns true when the command staged a new trial
    fn apply_command(&mut self, command: Command, now: f64) -> bool {
        match command {
            Command::ToggleHud => {
                self.hud_visible = !self.hud_visible;
            }
            Command::StartTrial => match self.trial.start_trial(&mut self.actuator) {
                Ok(_) => {
                    self.go_until = None;
                    self.notifications.push(
                        "Press Enter to Start Run",
                        now,
                        STAGING_NOTIFICATION_SECONDS,
                    );
                    return true;
                }
                Err(e) => {
                    warn!("Could not stage trial: {}", e);
                    self.notify_error(&e, now);
                }
            },
            Command::InitiateTrial => match self.trial.initiate_trial(now) {
                Ok(TrialPhase::Running) => self.go_until = Some(now + GO_BANNER_SECONDS),
                Ok(_) => {}
                Err(e) => self.notify_error(&e, now),
            },
            Command::EndTrial => match self.trial.end_trial(now) {
                Ok(results) => {
                    for line in results.summary_lines() {
                        info!("{}", line);
                    }
                }
                Err(e) => self.notify_error(&e, now),
            },
            vehicle => {
                if let Some(mode) = self.drive.handle_command(vehicle) {
                    self.notifications
                        .push(mode.to_string(), now, DEFAULT_NOTIFICATION_SECONDS);
                }
            }
        }
        false
    }

    fn notify_error(&mut self, error: &TrialError, now: f64) {
        self.notifications
            .push(error.to_string(), now, DEFAULT_NOTIFICATION_SECONDS);
    }

    pub fn snapshot(&self, now: f64) -> HudSnapshot {
        let velocity = self.actuator.velocity();
        let transmission = self.drive.transmission().output();
        HudSnapshot {
            transmission: transmission.mode,
            gear: transmission.gear,
            trial_phase: self.trial.phase(),
            elapsed_time: self.trial.elapsed(now),
            current_speed_mph: self.current_speed_mph,
            display_speed: self.hud.speed_unit.from_velocity(velocity),
            speed_unit: self.hud.speed_unit.label(),
            violation_count: self.trial.violation_count(),
            speeding: self.trial.is_speeding(),
            countdown_remaining: self
                .trial
                .countdown_remaining(now)
                .map(|remaining| remaining.ceil() as u32),
            show_go: self.trial.phase() == TrialPhase::Running
                && self.go_until.is_some_and(|until| now < until),
            hud_visible: self.hud_visible,
            notifications: self
                .notifications
                .active()
                .map(|n| n.text.clone())
                .collect(),
            results: self.trial.results(),
            control: *self.drive.last_output(),
            lights: self.drive.lights(),
        }
    }

    pub fn trial(&self) -> &TrialStateMachine {
        &self.trial
    }

    pub fn drive(&self) -> &DriveController {
        &self.drive
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}
