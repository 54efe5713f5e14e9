//! Response curves for wheel and pedal axes
//!
//! Pure functions mapping a raw normalized axis value in `[-1, 1]` to a shaped,
//! damped control value. Steering uses a tangent curve (progressively more
//! sensitive away from center, no dead zone). Pedals use a logarithmic curve
//! fitted to the travel of typical force-feedback wheel pedals, where `+1` is
//! released and `-1` is fully pressed.

use serde::{Deserialize, Serialize};

/// Horizontal scale of the steering tangent
pub const STEER_CURVE_SCALE: f32 = 1.1;

/// Smallest argument handed to `log10` in the pedal curve
pub const PEDAL_LOG_EPSILON: f32 = 1e-6;

/// Per-axis damping applied after shaping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingCoefficients {
    pub steering: f32,
    pub throttle: f32,
    pub brake: f32,
}

impl DampingCoefficients {
    pub const DEFAULT_STEERING: f32 = 0.5;
    pub const DEFAULT_THROTTLE: f32 = 1.0;
    pub const DEFAULT_BRAKE: f32 = 1.0;

    /// Valid damping lies in `(0, 2]`
    pub fn is_valid(value: f32) -> bool {
        value.is_finite() && value > 0.0 && value <= 2.0
    }
}

impl Default for DampingCoefficients {
    fn default() -> Self {
        Self {
            steering: Self::DEFAULT_STEERING,
            throttle: Self::DEFAULT_THROTTLE,
            brake: Self::DEFAULT_BRAKE,
        }
    }
}

/// `clamp(d · tan(1.1 · x), -1, 1)`
///
/// Non-finite input yields `0.0`.
pub fn steer(x: f32, damping: f32) -> f32 {
    if !x.is_finite() || !damping.is_finite() {
        return 0.0;
    }
    let x = x.clamp(-1.0, 1.0);
    (damping * (STEER_CURVE_SCALE * x).tan()).clamp(-1.0, 1.0)
}

/// `clamp(d · (1.6 + (2.05 · log10(-0.7 · x + 1.4) - 1.2) / 0.92), 0, 1)`
///
/// For `x` in `[-1, 1]` the log argument is at least 0.7. Out-of-range input is
/// still accepted; the argument is floored at [`PEDAL_LOG_EPSILON`]. Non-finite
/// input yields `0.0`.
pub fn pedal(x: f32, damping: f32) -> f32 {
    if !x.is_finite() || !damping.is_finite() {
        return 0.0;
    }
    let argument = (-0.7 * x + 1.4).max(PEDAL_LOG_EPSILON);
    let shaped = 1.6 + (2.05 * argument.log10() - 1.2) / 0.92;
    (damping * shaped).clamp(0.0, 1.0)
}
