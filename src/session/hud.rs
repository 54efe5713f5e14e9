//! Read-only state handed to the presentation layer once per tick

use crate::trial::{format_time, TrialPhase, TrialResults};
use crate::vehicle::{LightState, TransmissionMode, VehicleControlVector};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HudSnapshot {
    pub transmission: TransmissionMode,
    pub gear: i32,
    pub trial_phase: TrialPhase,
    /// Seconds into the current run, frozen once finished
    pub elapsed_time: f64,
    pub current_speed_mph: f64,
    /// Current speed in `speed_unit`
    pub display_speed: f64,
    pub speed_unit: &'static str,
    pub violation_count: u32,
    pub speeding: bool,
    /// Whole seconds left in the countdown, rounded up
    pub countdown_remaining: Option<u32>,
    /// Set during the first second of a run
    pub show_go: bool,
    pub hud_visible: bool,
    pub notifications: Vec<String>,
    pub results: Option<TrialResults>,
    pub control: VehicleControlVector,
    pub lights: LightState,
}

impl HudSnapshot {
    pub fn timer_text(&self) -> String {
        format!("Time: {}", format_time(self.elapsed_time))
    }

    /// Results screen lines, empty until a run finished
    pub fn result_lines(&self) -> Vec<String> {
        self.results
            .map(|results| results.summary_lines())
            .unwrap_or_default()
    }

    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{:?} | {} gear {} | {:.1} {}",
            self.trial_phase,
            self.transmission.label(),
            self.gear,
            self.display_speed,
            self.speed_unit
        );
        match self.trial_phase {
            TrialPhase::Countdown => {
                if let Some(remaining) = self.countdown_remaining {
                    line.push_str(&format!(" | starting in {}", remaining));
                }
            }
            TrialPhase::Running => {
                line.push_str(&format!(
                    " | {} | violations {}",
                    self.timer_text(),
                    self.violation_count
                ));
                if self.show_go {
                    line.push_str(" | Go!");
                }
                if self.speeding {
                    line.push_str(" | You are exceeding the speed limit!");
                }
            }
            _ => {}
        }
        line
    }
}
