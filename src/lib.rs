//! Control-input normalization and trial evaluation for a driving simulator
//! client.
//!
//! Every frame, raw keyboard and gamepad/wheel input is resolved through a
//! binding table, shaped by response curves and a transmission state machine
//! into one [`VehicleControlVector`](vehicle::VehicleControlVector). In
//! parallel the vehicle's speed feeds a timed trial that counts speed-limit
//! violations.

pub mod controller;
pub mod mapping;
pub mod persistence;
pub mod sensor;
pub mod session;
pub mod trial;
pub mod vehicle;
