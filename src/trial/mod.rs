//! Timed trial runs with speed-limit violation tracking
//!
//! ```text
//! Idle ──start──► Staged ──initiate──► (Countdown) ──► Running ──end──► Finished
//!   ▲                                                                      │
//!   └──────────────────────── start (from any phase) ─────────────────────┘
//! ```

pub mod lifecycle;
pub mod results;
pub mod violation;

pub use lifecycle::{TrialRecord, TrialStateMachine};
pub use results::{format_time, TrialResults};
pub use violation::{ViolationInterval, ViolationTracker};

use crate::vehicle::actuator::{ActuatorError, Location, Rotation, Transform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Observable phase of the trial lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialPhase {
    #[default]
    Idle,
    Staged,
    Countdown,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSettings {
    /// Pose the vehicle is teleported to when a trial is staged
    pub start_pose: Transform,
    /// Limit in mph
    pub speed_limit: f64,
    /// Seconds between initiation and the start of the run, 0 to skip
    pub countdown_duration: f64,
}

impl TrialSettings {
    pub const DEFAULT_SPEED_LIMIT: f64 = 45.0;

    pub fn default_start_pose() -> Transform {
        Transform::new(
            Location {
                x: 246.3,
                y: -27.0,
                z: 1.0,
            },
            Rotation {
                pitch: 0.0,
                yaw: -86.76,
                roll: 0.0,
            },
        )
    }
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            start_pose: Self::default_start_pose(),
            speed_limit: Self::DEFAULT_SPEED_LIMIT,
            countdown_duration: 0.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrialError {
    #[error("{operation} is not valid while {phase:?}")]
    InvalidTransition {
        operation: &'static str,
        phase: TrialPhase,
    },

    #[error("Teleport failed: {0}")]
    Teleport(#[from] ActuatorError),
}
