//! Builds the per-frame control vector from resolved input

use super::control_vector::{LightState, VehicleControlVector};
use super::transmission::{TransmissionMode, TransmissionStateMachine};
use crate::controller::raw_input::RawInputState;
use crate::mapping::binding::LogicalControl;
use crate::mapping::control_mapper::ResolvedControls;
use crate::mapping::dispatcher::Command;
use crate::mapping::response_curve::{self, DampingCoefficients};
use tracing::{debug, info};

/// Keyboard steering gain per elapsed millisecond
pub const KEY_STEER_RATE: f32 = 5e-4;
/// Keyboard steering saturates here
pub const KEY_STEER_LIMIT: f32 = 0.7;

const KEYS_THROTTLE: &[&str] = &["w", "up"];
const KEYS_BRAKE: &[&str] = &["s", "down"];
const KEYS_LEFT: &[&str] = &["a", "left"];
const KEYS_RIGHT: &[&str] = &["d", "right"];
const KEYS_HANDBRAKE: &[&str] = &["space"];

/// Owns everything that shapes the control vector between frames
#[derive(Debug, Clone)]
pub struct DriveController {
    damping: DampingCoefficients,
    transmission: TransmissionStateMachine,
    steer_cache: f32,
    handbrake_latched: bool,
    high_beam: bool,
    last_output: VehicleControlVector,
}

impl DriveController {
    pub fn new(damping: DampingCoefficients) -> Self {
        Self {
            damping,
            transmission: TransmissionStateMachine::new(),
            steer_cache: 0.0,
            handbrake_latched: false,
            high_beam: false,
            last_output: VehicleControlVector::default(),
        }
    }

    pub fn transmission(&self) -> &TransmissionStateMachine {
        &self.transmission
    }

    pub fn damping(&self) -> DampingCoefficients {
        self.damping
    }

    pub fn last_output(&self) -> &VehicleControlVector {
        &self.last_output
    }

    /// Applies a command aimed at the vehicle
    ///
    /// Returns the new mode when the transmission mode changed. Trial and HUD
    /// commands are not handled here.
    pub fn handle_command(&mut self, command: Command) -> Option<TransmissionMode> {
        match command {
            Command::CycleTransmissionMode => return Some(self.transmission.cycle_mode()),
            Command::ShiftUp => {
                self.transmission.shift_up();
            }
            Command::ShiftDown => {
                self.transmission.shift_down();
            }
            Command::ShifterDrive => {
                self.transmission.shifter_drive();
            }
            Command::ShifterNeutral => {
                self.transmission.shifter_neutral();
            }
            Command::ShifterReverse => {
                self.transmission.shifter_reverse();
            }
            Command::ToggleReverse => {
                if !self.transmission.toggle_reverse() {
                    debug!("Reverse toggle ignored in {:?}", self.transmission.mode());
                }
            }
            Command::ToggleHandbrake => {
                self.handbrake_latched = !self.handbrake_latched;
                debug!("Handbrake latch {}", self.handbrake_latched);
            }
            Command::ToggleHeadlights => {
                self.high_beam = !self.high_beam;
                info!("High beam {}", if self.high_beam { "on" } else { "off" });
            }
            Command::ToggleHud
            | Command::StartTrial
            | Command::InitiateTrial
            | Command::EndTrial => {}
        }
        None
    }

    /// Control vector for a frame in which the driver is in control
    ///
    /// Keyboard keys always feed the digital path. When steering, throttle and
    /// brake all resolve to gamepad axes, the wheel path replaces the keyboard
    /// values with the shaped axis values.
    pub fn update(
        &mut self,
        raw: &RawInputState,
        resolved: &ResolvedControls,
    ) -> VehicleControlVector {
        let (mut throttle, mut steer, mut brake) = self.keyboard_controls(raw);

        if let (Some(steer_axis), Some(throttle_axis), Some(brake_axis)) = (
            resolved.axis(LogicalControl::Steering),
            resolved.axis(LogicalControl::Throttle),
            resolved.axis(LogicalControl::Brake),
        ) {
            steer = response_curve::steer(steer_axis, self.damping.steering);
            throttle = response_curve::pedal(throttle_axis, self.damping.throttle);
            brake = response_curve::pedal(brake_axis, self.damping.brake);
        }

        let hand_brake = raw.any_pressed(KEYS_HANDBRAKE) || self.handbrake_latched;
        let output = self.transmission.output();

        self.last_output = VehicleControlVector::new(
            self.transmission.gate_throttle(throttle),
            steer,
            brake,
            hand_brake,
            output.gear,
            output.manual_gear_shift,
        );
        self.last_output
    }

    /// Control vector while the driver is locked out
    pub fn locked(&mut self) -> VehicleControlVector {
        let output = self.transmission.output();
        self.steer_cache = 0.0;
        self.last_output = VehicleControlVector::neutral(output.gear, output.manual_gear_shift);
        self.last_output
    }

    pub fn lights(&self) -> LightState {
        LightState::from_control(&self.last_output, self.high_beam)
    }

    fn keyboard_controls(&mut self, raw: &RawInputState) -> (f32, f32, f32) {
        let throttle = if raw.any_pressed(KEYS_THROTTLE) { 1.0 } else { 0.0 };
        let brake = if raw.any_pressed(KEYS_BRAKE) { 1.0 } else { 0.0 };

        let increment = KEY_STEER_RATE * raw.frame_ms() as f32;
        if raw.any_pressed(KEYS_LEFT) {
            self.steer_cache -= increment;
        } else if raw.any_pressed(KEYS_RIGHT) {
            self.steer_cache += increment;
        } else {
            self.steer_cache = 0.0;
        }
        self.steer_cache = self.steer_cache.clamp(-KEY_STEER_LIMIT, KEY_STEER_LIMIT);
        let steer = (self.steer_cache * 10.0).round() / 10.0;

        (throttle, steer, brake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::raw_input::{GamepadSnapshot, KeyCode};
    use crate::mapping::binding::{BindingTable, DeviceBinding};
    use crate::mapping::control_mapper::ControlMapper;

    fn frame(keys: &[&str]) -> (RawInputState, ResolvedControls) {
        let raw = RawInputState::new(keys.iter().map(|k| KeyCode::new(k)).collect::<Vec<_>>(), None, 16.0);
        let resolved = ControlMapper::resolve(&raw, &BindingTable::default_config());
        (raw, resolved)
    }

    #[test]
    fn test_keyboard_steering_accumulates_and_saturates() {
        let mut drive = DriveController::new(DampingCoefficients::default());

        let (raw, resolved) = frame(&["d"]);
        let mut output = drive.update(&raw, &resolved);
        for _ in 1..50 {
            output = drive.update(&raw, &resolved);
        }
        // 50 frames × 16 ms × 5e-4 = 0.4
        assert!((output.steer() - 0.4).abs() < 1e-6);

        for _ in 0..100 {
            output = drive.update(&raw, &resolved);
        }
        assert!((output.steer() - 0.7).abs() < 1e-6);

        let (raw, resolved) = frame(&[]);
        assert_eq!(drive.update(&raw, &resolved).steer(), 0.0);
    }

    #[test]
    fn test_keyboard_pedals_and_neutral_gate() {
        let mut drive = DriveController::new(DampingCoefficients::default());
        let (raw, resolved) = frame(&["w", "s"]);
        let output = drive.update(&raw, &resolved);
        assert_eq!(output.throttle(), 1.0);
        assert_eq!(output.brake(), 1.0);

        drive.handle_command(Command::CycleTransmissionMode);
        drive.handle_command(Command::CycleTransmissionMode);
        drive.handle_command(Command::ShifterNeutral);
        let output = drive.update(&raw, &resolved);
        assert_eq!(output.throttle(), 0.0);
        assert_eq!(output.gear(), 0);
    }

    #[test]
    fn test_wheel_axes_override_keyboard() {
        let mut table = BindingTable::default_config();
        table
            .bind(LogicalControl::Steering, DeviceBinding::GamepadAxis(0))
            .bind(LogicalControl::Throttle, DeviceBinding::GamepadAxis(2))
            .bind(LogicalControl::Brake, DeviceBinding::GamepadAxis(5));
        let mut pad = GamepadSnapshot::new("wheel", 6, 0);
        pad.axes = vec![0.0, 0.0, -1.0, 0.0, 0.0, 1.0];
        let raw = RawInputState::new(vec![KeyCode::new("a")], Some(pad), 16.0);
        let resolved = ControlMapper::resolve(&raw, &table);

        let mut drive = DriveController::new(DampingCoefficients::default());
        let output = drive.update(&raw, &resolved);
        assert_eq!(output.steer(), 0.0);
        assert_eq!(output.throttle(), 1.0);
        assert_eq!(output.brake(), 0.0);
    }

    #[test]
    fn test_partial_wheel_binding_keeps_keyboard_path() {
        let mut table = BindingTable::default_config();
        table.bind(LogicalControl::Steering, DeviceBinding::GamepadAxis(0));
        let mut pad = GamepadSnapshot::new("pad", 1, 0);
        pad.axes = vec![1.0];
        let raw = RawInputState::new(vec![KeyCode::new("w")], Some(pad), 16.0);
        let resolved = ControlMapper::resolve(&raw, &table);

        let mut drive = DriveController::new(DampingCoefficients::default());
        let output = drive.update(&raw, &resolved);
        assert_eq!(output.steer(), 0.0);
        assert_eq!(output.throttle(), 1.0);
    }

    #[test]
    fn test_handbrake_latch_and_lights() {
        let mut drive = DriveController::new(DampingCoefficients::default());
        let (raw, resolved) = frame(&[]);
        assert!(!drive.update(&raw, &resolved).hand_brake());

        drive.handle_command(Command::ToggleHandbrake);
        drive.handle_command(Command::ToggleHeadlights);
        drive.handle_command(Command::ToggleReverse);
        let output = drive.update(&raw, &resolved);
        assert!(output.hand_brake());
        assert!(output.reverse());

        let lights = drive.lights();
        assert!(lights.reverse);
        assert!(lights.high_beam);
        assert!(!lights.brake);
    }

    #[test]
    fn test_locked_output_is_neutral() {
        let mut drive = DriveController::new(DampingCoefficients::default());
        let output = drive.locked();
        assert_eq!(output.throttle(), 0.0);
        assert_eq!(output.steer(), 0.0);
        assert!(output.hand_brake());
        assert_eq!(output.gear(), 1);
    }
}
