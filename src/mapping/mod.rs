//! Turns a per-frame [`RawInputState`](crate::controller::RawInputState) into
//! logical control values and discrete commands.
//!
//! - [`binding`] - logical controls and the binding table loaded from settings
//! - [`control_mapper`] - resolution of bound device inputs to values
//! - [`response_curve`] - steering and pedal shaping
//! - [`dispatcher`] - rising-edge command generation

pub mod binding;
pub mod control_mapper;
pub mod dispatcher;
pub mod error;
pub mod response_curve;

pub use binding::{BindingTable, ControlBinding, DeviceBinding, InputSource, LogicalControl};
pub use control_mapper::{ControlMapper, ControlValue, ResolvedControls};
pub use dispatcher::{Command, CommandDispatcher};
pub use error::MappingError;
pub use response_curve::DampingCoefficients;
