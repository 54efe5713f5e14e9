//! Rising-edge translation of resolved button controls into commands

use crate::mapping::binding::LogicalControl;
use crate::mapping::control_mapper::ResolvedControls;
use crate::trial::TrialPhase;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display};
use tracing::debug;

/// Discrete commands consumed by the transmission, drive and trial state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    CycleTransmissionMode,
    ShiftUp,
    ShiftDown,
    ShifterDrive,
    ShifterNeutral,
    ShifterReverse,
    ToggleReverse,
    ToggleHandbrake,
    ToggleHud,
    ToggleHeadlights,
    StartTrial,
    InitiateTrial,
    EndTrial,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::CycleTransmissionMode,
        Command::ShiftUp,
        Command::ShiftDown,
        Command::ShifterDrive,
        Command::ShifterNeutral,
        Command::ShifterReverse,
        Command::ToggleReverse,
        Command::ToggleHandbrake,
        Command::ToggleHud,
        Command::ToggleHeadlights,
        Command::StartTrial,
        Command::InitiateTrial,
        Command::EndTrial,
    ];

    /// snake_case name, as typed on the console
    pub fn name(&self) -> &'static str {
        match self {
            Command::CycleTransmissionMode => "cycle_transmission_mode",
            Command::ShiftUp => "shift_up",
            Command::ShiftDown => "shift_down",
            Command::ShifterDrive => "shifter_drive",
            Command::ShifterNeutral => "shifter_neutral",
            Command::ShifterReverse => "shifter_reverse",
            Command::ToggleReverse => "toggle_reverse",
            Command::ToggleHandbrake => "toggle_handbrake",
            Command::ToggleHud => "toggle_hud",
            Command::ToggleHeadlights => "toggle_headlights",
            Command::StartTrial => "start_trial",
            Command::InitiateTrial => "initiate_trial",
            Command::EndTrial => "end_trial",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Emits one command per press of a bound button
///
/// Holds the set of controls that were active on the previous tick; a command
/// fires only on the tick a control goes from released to pressed.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    held: HashSet<LogicalControl>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, resolved: &ResolvedControls, phase: TrialPhase) -> Vec<Command> {
        let mut commands = Vec::new();

        for control in LogicalControl::ALL {
            if control.is_axis() {
                continue;
            }

            let pressed = resolved.pressed(control);
            let was_held = if pressed {
                !self.held.insert(control)
            } else {
                self.held.remove(&control);
                true
            };
            if was_held {
                continue;
            }

            if let Some(command) = Self::command_for(control, phase) {
                debug!("{} pressed -> {}", control, command);
                commands.push(command);
            }
        }

        commands
    }

    /// Forgets held controls, so a button still down fires again on the next tick
    pub fn reset(&mut self) {
        self.held.clear();
    }

    fn command_for(control: LogicalControl, phase: TrialPhase) -> Option<Command> {
        match control {
            LogicalControl::Reverse => Some(Command::ToggleReverse),
            LogicalControl::Handbrake => Some(Command::ToggleHandbrake),
            LogicalControl::HideHud => Some(Command::ToggleHud),
            LogicalControl::ToggleHeadlights => Some(Command::ToggleHeadlights),
            LogicalControl::ShifterDrive => Some(Command::ShifterDrive),
            LogicalControl::ShifterNeutral => Some(Command::ShifterNeutral),
            LogicalControl::ShifterReverse => Some(Command::ShifterReverse),
            LogicalControl::CycleTransmission => Some(Command::CycleTransmissionMode),
            LogicalControl::ShiftUp => Some(Command::ShiftUp),
            LogicalControl::ShiftDown => Some(Command::ShiftDown),
            LogicalControl::StartTrial => Some(Command::StartTrial),
            LogicalControl::Confirm => match phase {
                TrialPhase::Staged => Some(Command::InitiateTrial),
                TrialPhase::Finished => Some(Command::StartTrial),
                _ => None,
            },
            LogicalControl::EndTrial => match phase {
                TrialPhase::Running => Some(Command::EndTrial),
                _ => None,
            },
            LogicalControl::Steering | LogicalControl::Throttle | LogicalControl::Brake => None,
        }
    }
}
