//! Resolution of raw device input into logical control values

use crate::controller::raw_input::RawInputState;
use crate::mapping::binding::{BindingTable, DeviceBinding, LogicalControl};
use std::collections::HashMap;
use tracing::debug;

/// Value of one logical control for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Axis(f32),
    Button(bool),
    Unbound,
}

impl ControlValue {
    /// Numeric view: buttons read as `0.0`/`1.0`, unbound as `0.0`
    pub fn as_f32(&self) -> f32 {
        match self {
            ControlValue::Axis(v) => *v,
            ControlValue::Button(true) => 1.0,
            ControlValue::Button(false) | ControlValue::Unbound => 0.0,
        }
    }

    /// Boolean view: axes count as pressed past half travel
    pub fn is_active(&self) -> bool {
        match self {
            ControlValue::Axis(v) => v.abs() > 0.5,
            ControlValue::Button(pressed) => *pressed,
            ControlValue::Unbound => false,
        }
    }
}

/// Per-frame value of every logical control
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedControls {
    values: HashMap<LogicalControl, ControlValue>,
}

impl ResolvedControls {
    pub fn get(&self, control: LogicalControl) -> ControlValue {
        self.values
            .get(&control)
            .copied()
            .unwrap_or(ControlValue::Unbound)
    }

    /// Raw axis value, `None` unless the control resolved from a gamepad axis
    pub fn axis(&self, control: LogicalControl) -> Option<f32> {
        match self.get(control) {
            ControlValue::Axis(v) => Some(v),
            _ => None,
        }
    }

    pub fn pressed(&self, control: LogicalControl) -> bool {
        self.get(control).is_active()
    }
}

/// Binding-table driven resolver
///
/// Never fails: missing gamepads, indices beyond the device's reported
/// capability and unbound controls all resolve to neutral.
#[derive(Debug, Clone, Default)]
pub struct ControlMapper;

impl ControlMapper {
    pub fn resolve(raw: &RawInputState, table: &BindingTable) -> ResolvedControls {
        let mut values = HashMap::with_capacity(LogicalControl::ALL.len());

        for control in LogicalControl::ALL {
            let value = Self::resolve_control(raw, table, control);
            if value != ControlValue::Unbound {
                values.insert(control, value);
            }
        }

        ResolvedControls { values }
    }

    fn resolve_control(
        raw: &RawInputState,
        table: &BindingTable,
        control: LogicalControl,
    ) -> ControlValue {
        let key_state = table.keyboard(control).map(|key| raw.is_pressed(key));

        let pad_state = table.gamepad(control).map(|binding| {
            let Some(pad) = raw.gamepad() else {
                return ControlValue::Unbound;
            };
            match binding {
                DeviceBinding::GamepadAxis(index) => match pad.axis(*index) {
                    Some(v) if v.is_finite() => ControlValue::Axis(v.clamp(-1.0, 1.0)),
                    _ => {
                        debug!(
                            "{} bound to axis {} not reported by {}",
                            control, index, pad.name
                        );
                        ControlValue::Unbound
                    }
                },
                DeviceBinding::GamepadButton(index) => match pad.button(*index) {
                    Some(pressed) => ControlValue::Button(pressed),
                    None => {
                        debug!(
                            "{} bound to button {} not reported by {}",
                            control, index, pad.name
                        );
                        ControlValue::Unbound
                    }
                },
                DeviceBinding::Keyboard(key) => ControlValue::Button(raw.is_pressed(key)),
            }
        });

        match (pad_state, key_state) {
            // An analog value wins over a digital key for the same control
            (Some(ControlValue::Axis(v)), _) => ControlValue::Axis(v),
            (Some(ControlValue::Button(pad)), Some(key)) => ControlValue::Button(pad || key),
            (Some(ControlValue::Button(pad)), None) => ControlValue::Button(pad),
            (_, Some(key)) => ControlValue::Button(key),
            _ => ControlValue::Unbound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::raw_input::{GamepadSnapshot, KeyCode};

    fn wheel() -> GamepadSnapshot {
        let mut pad = GamepadSnapshot::new("wheel", 3, 4);
        pad.axes = vec![0.25, -1.0, 1.0];
        pad.buttons = vec![false, true, false, false];
        pad
    }

    fn table() -> BindingTable {
        let mut table = BindingTable::default_config();
        table
            .bind(LogicalControl::Steering, DeviceBinding::GamepadAxis(0))
            .bind(LogicalControl::Throttle, DeviceBinding::GamepadAxis(1))
            .bind(LogicalControl::Brake, DeviceBinding::GamepadAxis(7))
            .bind(LogicalControl::Reverse, DeviceBinding::GamepadButton(1))
            .bind(LogicalControl::Handbrake, DeviceBinding::GamepadButton(12));
        table
    }

    #[test]
    fn test_axes_and_buttons_resolve_from_gamepad() {
        let raw = RawInputState::new(Vec::new(), Some(wheel()), 16.0);
        let resolved = ControlMapper::resolve(&raw, &table());

        assert_eq!(resolved.axis(LogicalControl::Steering), Some(0.25));
        assert_eq!(resolved.axis(LogicalControl::Throttle), Some(-1.0));
        assert!(resolved.pressed(LogicalControl::Reverse));
    }

    #[test]
    fn test_out_of_range_index_is_neutral() {
        let raw = RawInputState::new(Vec::new(), Some(wheel()), 16.0);
        let resolved = ControlMapper::resolve(&raw, &table());

        assert_eq!(resolved.get(LogicalControl::Brake), ControlValue::Unbound);
        assert!(!resolved.pressed(LogicalControl::Handbrake));
    }

    #[test]
    fn test_missing_gamepad_resolves_everything_gamepad_bound_to_neutral() {
        let raw = RawInputState::idle(16.0);
        let resolved = ControlMapper::resolve(&raw, &table());

        assert_eq!(resolved.axis(LogicalControl::Steering), None);
        assert_eq!(resolved.get(LogicalControl::Steering).as_f32(), 0.0);
        // Reverse still has its keyboard binding, which is simply not pressed
        assert_eq!(resolved.get(LogicalControl::Reverse), ControlValue::Button(false));
    }

    #[test]
    fn test_keyboard_or_gamepad_button() {
        let raw = RawInputState::new(vec![KeyCode::new("q")], None, 16.0);
        let resolved = ControlMapper::resolve(&raw, &table());
        assert!(resolved.pressed(LogicalControl::Reverse));
        assert!(!resolved.pressed(LogicalControl::CycleTransmission));
    }

    #[test]
    fn test_unbound_control_is_neutral() {
        let raw = RawInputState::new(vec![KeyCode::new("x")], Some(wheel()), 16.0);
        let resolved = ControlMapper::resolve(&raw, &BindingTable::empty());
        for control in LogicalControl::ALL {
            assert_eq!(resolved.get(control), ControlValue::Unbound);
        }
    }
}
