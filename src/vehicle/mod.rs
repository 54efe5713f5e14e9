//! Vehicle side of the frame: transmission, control vector and actuator boundary

pub mod actuator;
pub mod control_vector;
pub mod drive;
pub mod transmission;

pub use actuator::{
    speed_mph, Actuator, ActuatorError, KinematicActuator, Location, Rotation, SpeedUnit,
    Transform, Vector3,
};
pub use control_vector::{LightState, VehicleControlVector};
pub use drive::DriveController;
pub use transmission::{TransmissionMode, TransmissionOutput, TransmissionStateMachine};
