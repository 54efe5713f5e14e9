//! Gear and transmission-mode state

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::{debug, info};

/// Lowest gear reachable by shifting down
pub const REVERSE_GEAR: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmissionMode {
    #[default]
    Automatic,
    Manual,
    AutomaticShifter,
}

impl TransmissionMode {
    /// Automatic → Manual → AutomaticShifter → Automatic
    pub fn next(self) -> Self {
        match self {
            TransmissionMode::Automatic => TransmissionMode::Manual,
            TransmissionMode::Manual => TransmissionMode::AutomaticShifter,
            TransmissionMode::AutomaticShifter => TransmissionMode::Automatic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransmissionMode::Automatic => "Automatic",
            TransmissionMode::Manual => "Manual",
            TransmissionMode::AutomaticShifter => "Automatic Shifter",
        }
    }
}

impl Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Transmission", self.label())
    }
}

/// Snapshot of the transmission consumed by the control vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionOutput {
    pub mode: TransmissionMode,
    pub gear: i32,
    pub manual_gear_shift: bool,
    pub neutral: bool,
}

/// Gear, mode and shifter-neutral flag
///
/// Commands that do not apply to the current mode are ignored and reported
/// as `false` by the command methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionStateMachine {
    mode: TransmissionMode,
    gear: i32,
    neutral: bool,
}

impl Default for TransmissionStateMachine {
    fn default() -> Self {
        Self {
            mode: TransmissionMode::Automatic,
            gear: 1,
            neutral: false,
        }
    }
}

impl TransmissionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> TransmissionMode {
        self.mode
    }

    pub fn gear(&self) -> i32 {
        self.gear
    }

    pub fn is_neutral(&self) -> bool {
        self.neutral
    }

    pub fn output(&self) -> TransmissionOutput {
        TransmissionOutput {
            mode: self.mode,
            gear: self.gear,
            manual_gear_shift: self.mode == TransmissionMode::Manual,
            neutral: self.neutral,
        }
    }

    /// Advances to the next mode and returns it
    ///
    /// The gear is kept across modes. Entering the shifter keeps a drive or
    /// reverse gear, maps gear 0 to neutral and drops any higher gear to neutral.
    pub fn cycle_mode(&mut self) -> TransmissionMode {
        let next = self.mode.next();

        match next {
            TransmissionMode::AutomaticShifter => {
                if self.gear == 1 || self.gear == REVERSE_GEAR {
                    self.neutral = false;
                } else {
                    debug!("Gear {} not available on the shifter, selecting neutral", self.gear);
                    self.gear = 0;
                    self.neutral = true;
                }
            }
            TransmissionMode::Automatic | TransmissionMode::Manual => self.neutral = false,
        }

        info!("Transmission mode {:?} -> {:?} (gear {})", self.mode, next, self.gear);
        self.mode = next;
        next
    }

    pub fn shift_up(&mut self) -> bool {
        if self.mode != TransmissionMode::Manual {
            return false;
        }
        self.gear = self.gear.saturating_add(1);
        debug!("Shifted up to {}", self.gear);
        true
    }

    pub fn shift_down(&mut self) -> bool {
        if self.mode != TransmissionMode::Manual {
            return false;
        }
        self.gear = (self.gear - 1).max(REVERSE_GEAR);
        debug!("Shifted down to {}", self.gear);
        true
    }

    /// Flips between reverse and first gear outside the shifter
    pub fn toggle_reverse(&mut self) -> bool {
        if self.mode == TransmissionMode::AutomaticShifter {
            return false;
        }
        self.gear = if self.gear < 0 { 1 } else { REVERSE_GEAR };
        debug!("Reverse toggled, gear {}", self.gear);
        true
    }

    pub fn shifter_drive(&mut self) -> bool {
        self.set_shifter(1, false)
    }

    pub fn shifter_neutral(&mut self) -> bool {
        self.set_shifter(0, true)
    }

    pub fn shifter_reverse(&mut self) -> bool {
        self.set_shifter(REVERSE_GEAR, false)
    }

    fn set_shifter(&mut self, gear: i32, neutral: bool) -> bool {
        if self.mode != TransmissionMode::AutomaticShifter {
            return false;
        }
        self.gear = gear;
        self.neutral = neutral;
        debug!("Shifter set to gear {} (neutral: {})", gear, neutral);
        true
    }

    /// Throttle after the neutral gate
    pub fn gate_throttle(&self, throttle: f32) -> f32 {
        if self.neutral {
            0.0
        } else {
            throttle
        }
    }
}
