//! Per-frame command record handed to the actuator

use serde::{Deserialize, Serialize};

/// Validated control output for one frame
///
/// Fields are private so every instance goes through [`VehicleControlVector::new`],
/// which clamps the analog values and derives `reverse` from the gear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleControlVector {
    throttle: f32,
    steer: f32,
    brake: f32,
    hand_brake: bool,
    reverse: bool,
    manual_gear_shift: bool,
    gear: i32,
}

fn unit(value: f32, lo: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, 1.0)
    } else {
        0.0
    }
}

impl VehicleControlVector {
    pub fn new(
        throttle: f32,
        steer: f32,
        brake: f32,
        hand_brake: bool,
        gear: i32,
        manual_gear_shift: bool,
    ) -> Self {
        Self {
            throttle: unit(throttle, 0.0),
            steer: unit(steer, -1.0),
            brake: unit(brake, 0.0),
            hand_brake,
            reverse: gear < 0,
            manual_gear_shift,
            gear,
        }
    }

    /// No throttle, steer or brake; handbrake engaged
    pub fn neutral(gear: i32, manual_gear_shift: bool) -> Self {
        Self::new(0.0, 0.0, 0.0, true, gear, manual_gear_shift)
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn steer(&self) -> f32 {
        self.steer
    }

    pub fn brake(&self) -> f32 {
        self.brake
    }

    pub fn hand_brake(&self) -> bool {
        self.hand_brake
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn manual_gear_shift(&self) -> bool {
        self.manual_gear_shift
    }

    pub fn gear(&self) -> i32 {
        self.gear
    }
}

impl Default for VehicleControlVector {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, false, 1, false)
    }
}

/// Exterior lights driven from the control output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub brake: bool,
    pub reverse: bool,
    pub high_beam: bool,
}

impl LightState {
    pub fn from_control(control: &VehicleControlVector, high_beam: bool) -> Self {
        Self {
            brake: control.brake() > 0.0,
            reverse: control.gear() < 0,
            high_beam,
        }
    }
}
