//! Boundary to the simulation engine that executes control vectors

use super::control_vector::{LightState, VehicleControlVector};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;
use tracing::{debug, warn};

/// m/s → mph
pub const MPS_TO_MPH: f64 = 2.23694;
/// m/s → km/h
pub const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// World position in metres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Orientation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: Location,
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }
}

impl Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1}) yaw {:.2}",
            self.location.x, self.location.y, self.location.z, self.rotation.yaw
        )
    }
}

/// Unit used to present speed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    KilometresPerHour,
    MilesPerHour,
}

impl SpeedUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "km/h" | "kmh" | "kph" => Some(SpeedUnit::KilometresPerHour),
            "mph" => Some(SpeedUnit::MilesPerHour),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedUnit::KilometresPerHour => "km/h",
            SpeedUnit::MilesPerHour => "mph",
        }
    }

    pub fn from_velocity(&self, velocity: Vector3) -> f64 {
        match self {
            SpeedUnit::KilometresPerHour => velocity.length() * MPS_TO_KMH,
            SpeedUnit::MilesPerHour => velocity.length() * MPS_TO_MPH,
        }
    }
}

/// Speed in mph, the unit trial limits are expressed in
pub fn speed_mph(velocity: Vector3) -> f64 {
    velocity.length() * MPS_TO_MPH
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Teleport to {0} rejected")]
    TeleportRejected(Transform),

    #[error("Start pose rejected and no spawn point to fall back to")]
    NoSpawnPoint,
}

/// The external simulation engine as seen from the control core
pub trait Actuator {
    fn apply_control(&mut self, control: &VehicleControlVector);

    fn velocity(&self) -> Vector3;

    fn transform(&self) -> Transform;

    fn set_transform(&mut self, transform: Transform) -> Result<(), ActuatorError>;

    /// Zeroes linear and angular velocity
    fn stop(&mut self);

    fn spawn_points(&self) -> Vec<Transform> {
        Vec::new()
    }

    fn set_light_state(&mut self, _lights: LightState) {}
}

const DRIVE_ACCELERATION: f64 = 6.0;
const BRAKE_DECELERATION: f64 = 9.0;
const HANDBRAKE_DECELERATION: f64 = 12.0;
const ROLLING_DRAG: f64 = 0.05;
const MAX_SPEED: f64 = 60.0;
const MAX_YAW_RATE: f64 = 45.0;

/// Point-mass vehicle integrated one fixed step per applied control
#[derive(Debug, Clone)]
pub struct KinematicActuator {
    transform: Transform,
    speed: f64,
    step_seconds: f64,
    spawn_points: Vec<Transform>,
    rejected_teleports: usize,
    lights: LightState,
    last_control: VehicleControlVector,
}

impl KinematicActuator {
    pub fn new(step_seconds: f64) -> Self {
        Self {
            transform: Transform::default(),
            speed: 0.0,
            step_seconds: step_seconds.max(0.0),
            spawn_points: Vec::new(),
            rejected_teleports: 0,
            lights: LightState::default(),
            last_control: VehicleControlVector::default(),
        }
    }

    pub fn with_spawn_points(mut self, spawn_points: Vec<Transform>) -> Self {
        self.spawn_points = spawn_points;
        self
    }

    /// Rejects the next `count` teleports
    pub fn rejecting_teleports(mut self, count: usize) -> Self {
        self.rejected_teleports = count;
        self
    }

    /// Sets the signed forward speed in m/s
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn lights(&self) -> LightState {
        self.lights
    }

    pub fn last_control(&self) -> &VehicleControlVector {
        &self.last_control
    }

    fn integrate(&mut self, control: &VehicleControlVector) {
        let dt = self.step_seconds;
        if dt == 0.0 {
            return;
        }

        if control.gear() != 0 {
            let direction = if control.reverse() { -1.0 } else { 1.0 };
            self.speed += direction * f64::from(control.throttle()) * DRIVE_ACCELERATION * dt;
        }

        let mut deceleration = f64::from(control.brake()) * BRAKE_DECELERATION;
        if control.hand_brake() {
            deceleration += HANDBRAKE_DECELERATION;
        }
        let slowed = (self.speed.abs() - deceleration * dt).max(0.0);
        self.speed = slowed.copysign(self.speed);
        self.speed -= self.speed * ROLLING_DRAG * dt;
        self.speed = self.speed.clamp(-MAX_SPEED, MAX_SPEED);

        if self.speed.abs() > 0.1 {
            let yaw_rate = f64::from(control.steer()) * MAX_YAW_RATE * self.speed.signum();
            self.transform.rotation.yaw = (self.transform.rotation.yaw + yaw_rate * dt) % 360.0;
        }

        let velocity = self.velocity();
        self.transform.location.x += velocity.x * dt;
        self.transform.location.y += velocity.y * dt;
    }
}

impl Actuator for KinematicActuator {
    fn apply_control(&mut self, control: &VehicleControlVector) {
        self.last_control = *control;
        self.integrate(control);
    }

    fn velocity(&self) -> Vector3 {
        let yaw = self.transform.rotation.yaw.to_radians();
        Vector3::new(yaw.cos() * self.speed, yaw.sin() * self.speed, 0.0)
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) -> Result<(), ActuatorError> {
        if self.rejected_teleports > 0 {
            self.rejected_teleports -= 1;
            warn!("Rejecting teleport to {}", transform);
            return Err(ActuatorError::TeleportRejected(transform));
        }
        debug!("Teleported to {}", transform);
        self.transform = transform;
        Ok(())
    }

    fn stop(&mut self) {
        self.speed = 0.0;
    }

    fn spawn_points(&self) -> Vec<Transform> {
        self.spawn_points.clone()
    }

    fn set_light_state(&mut self, lights: LightState) {
        self.lights = lights;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_conversions() {
        let velocity = Vector3::new(3.0, 4.0, 0.0);
        assert!((speed_mph(velocity) - 5.0 * MPS_TO_MPH).abs() < 1e-9);
        assert!((SpeedUnit::KilometresPerHour.from_velocity(velocity) - 18.0).abs() < 1e-9);
        assert_eq!(SpeedUnit::parse(" KM/H "), Some(SpeedUnit::KilometresPerHour));
        assert_eq!(SpeedUnit::parse("knots"), None);
    }

    #[test]
    fn test_throttle_accelerates_forward_and_reverse() {
        let mut actuator = KinematicActuator::new(0.1);
        let forward = VehicleControlVector::new(1.0, 0.0, 0.0, false, 1, false);
        for _ in 0..10 {
            actuator.apply_control(&forward);
        }
        assert!(actuator.speed() > 5.0);
        assert!(actuator.transform().location.x > 0.0);

        actuator.stop();
        let reverse = VehicleControlVector::new(1.0, 0.0, 0.0, false, -1, false);
        actuator.apply_control(&reverse);
        assert!(actuator.speed() < 0.0);
    }

    #[test]
    fn test_neutral_gear_does_not_drive() {
        let mut actuator = KinematicActuator::new(0.1);
        actuator.apply_control(&VehicleControlVector::new(1.0, 0.0, 0.0, false, 0, false));
        assert_eq!(actuator.speed(), 0.0);
    }

    #[test]
    fn test_brakes_never_reverse_direction() {
        let mut actuator = KinematicActuator::new(0.5);
        actuator.set_speed(2.0);
        actuator.apply_control(&VehicleControlVector::neutral(1, false));
        assert_eq!(actuator.speed(), 0.0);
    }

    #[test]
    fn test_rejects_configured_number_of_teleports() {
        let mut actuator = KinematicActuator::new(0.1).rejecting_teleports(1);
        let target = Transform::new(
            Location {
                x: 1.0,
                y: 2.0,
                z: 0.5,
            },
            Rotation::default(),
        );
        assert_eq!(
            actuator.set_transform(target),
            Err(ActuatorError::TeleportRejected(target))
        );
        assert_eq!(actuator.set_transform(target), Ok(()));
        assert_eq!(actuator.transform(), target);
    }
}
