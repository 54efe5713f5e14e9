//! Logical controls and their device bindings

use crate::controller::raw_input::KeyCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};

/// Named controls the rest of the core reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalControl {
    Steering,
    Throttle,
    Brake,
    Reverse,
    Handbrake,
    HideHud,
    ToggleHeadlights,
    ShifterDrive,
    ShifterNeutral,
    ShifterReverse,
    CycleTransmission,
    ShiftUp,
    ShiftDown,
    StartTrial,
    Confirm,
    EndTrial,
}

impl LogicalControl {
    pub const ALL: [LogicalControl; 16] = [
        LogicalControl::Steering,
        LogicalControl::Throttle,
        LogicalControl::Brake,
        LogicalControl::Reverse,
        LogicalControl::Handbrake,
        LogicalControl::HideHud,
        LogicalControl::ToggleHeadlights,
        LogicalControl::ShifterDrive,
        LogicalControl::ShifterNeutral,
        LogicalControl::ShifterReverse,
        LogicalControl::CycleTransmission,
        LogicalControl::ShiftUp,
        LogicalControl::ShiftDown,
        LogicalControl::StartTrial,
        LogicalControl::Confirm,
        LogicalControl::EndTrial,
    ];

    /// Name used in the settings file (`joy_<name>`, `key_<name>`)
    pub fn config_key(&self) -> &'static str {
        match self {
            LogicalControl::Steering => "steering",
            LogicalControl::Throttle => "throttle",
            LogicalControl::Brake => "brake",
            LogicalControl::Reverse => "reverse",
            LogicalControl::Handbrake => "handbrake",
            LogicalControl::HideHud => "hide_hud",
            LogicalControl::ToggleHeadlights => "toggle_headlights",
            LogicalControl::ShifterDrive => "shifter_drive",
            LogicalControl::ShifterNeutral => "shifter_neutral",
            LogicalControl::ShifterReverse => "shifter_reverse",
            LogicalControl::CycleTransmission => "cycle_transmission",
            LogicalControl::ShiftUp => "shift_up",
            LogicalControl::ShiftDown => "shift_down",
            LogicalControl::StartTrial => "start_trial",
            LogicalControl::Confirm => "confirm",
            LogicalControl::EndTrial => "end_trial",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.config_key() == key)
    }

    /// Continuous controls: a gamepad binding for these refers to an axis
    pub fn is_axis(&self) -> bool {
        matches!(
            self,
            LogicalControl::Steering | LogicalControl::Throttle | LogicalControl::Brake
        )
    }
}

impl Display for LogicalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_key())
    }
}

/// Kind of device input a binding reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSource {
    Keyboard,
    GamepadAxis,
    GamepadButton,
}

/// One physical input bound to a logical control
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceBinding {
    Keyboard(KeyCode),
    GamepadAxis(usize),
    GamepadButton(usize),
}

impl DeviceBinding {
    pub fn source(&self) -> InputSource {
        match self {
            DeviceBinding::Keyboard(_) => InputSource::Keyboard,
            DeviceBinding::GamepadAxis(_) => InputSource::GamepadAxis,
            DeviceBinding::GamepadButton(_) => InputSource::GamepadButton,
        }
    }

    /// Gamepad binding matching the kind of control (axis or button)
    pub fn gamepad_for(control: LogicalControl, index: usize) -> Self {
        if control.is_axis() {
            DeviceBinding::GamepadAxis(index)
        } else {
            DeviceBinding::GamepadButton(index)
        }
    }
}

/// Bindings of one logical control: at most one key and one gamepad input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBinding {
    pub keyboard: Option<KeyCode>,
    pub gamepad: Option<DeviceBinding>,
}

impl ControlBinding {
    pub fn is_unbound(&self) -> bool {
        self.keyboard.is_none() && self.gamepad.is_none()
    }
}

/// Logical control → device binding table
///
/// Loaded once per session. Controls without an entry are unbound and resolve
/// to a neutral value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingTable {
    entries: HashMap<LogicalControl, ControlBinding>,
}

impl BindingTable {
    /// Table with nothing bound
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Keyboard defaults; gamepad inputs stay unbound until configured
    pub fn default_config() -> Self {
        let mut table = Self::empty();
        for (control, key) in [
            (LogicalControl::Reverse, "q"),
            (LogicalControl::HideHud, "f1"),
            (LogicalControl::ToggleHeadlights, "l"),
            (LogicalControl::CycleTransmission, "m"),
            (LogicalControl::ShiftUp, "period"),
            (LogicalControl::ShiftDown, "comma"),
            (LogicalControl::StartTrial, "kp1"),
            (LogicalControl::Confirm, "return"),
            (LogicalControl::EndTrial, "space"),
        ] {
            table.bind(control, DeviceBinding::Keyboard(KeyCode::new(key)));
        }
        table
    }

    /// Add or replace the binding of the same source family
    pub fn bind(&mut self, control: LogicalControl, binding: DeviceBinding) -> &mut Self {
        let entry = self.entries.entry(control).or_default();
        match binding {
            DeviceBinding::Keyboard(key) => entry.keyboard = Some(key),
            gamepad => entry.gamepad = Some(gamepad),
        }
        self
    }

    pub fn unbind_keyboard(&mut self, control: LogicalControl) -> &mut Self {
        if let Some(entry) = self.entries.get_mut(&control) {
            entry.keyboard = None;
        }
        self
    }

    pub fn unbind_gamepad(&mut self, control: LogicalControl) -> &mut Self {
        if let Some(entry) = self.entries.get_mut(&control) {
            entry.gamepad = None;
        }
        self
    }

    pub fn binding(&self, control: LogicalControl) -> Option<&ControlBinding> {
        self.entries.get(&control).filter(|b| !b.is_unbound())
    }

    pub fn keyboard(&self, control: LogicalControl) -> Option<&KeyCode> {
        self.entries.get(&control).and_then(|b| b.keyboard.as_ref())
    }

    pub fn gamepad(&self, control: LogicalControl) -> Option<&DeviceBinding> {
        self.entries.get(&control).and_then(|b| b.gamepad.as_ref())
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_keys_round_trip() {
        for control in LogicalControl::ALL {
            assert_eq!(LogicalControl::from_config_key(control.config_key()), Some(control));
        }
        assert_eq!(LogicalControl::from_config_key("warp_drive"), None);
    }

    #[test]
    fn test_gamepad_binding_kind_follows_control() {
        assert_eq!(
            DeviceBinding::gamepad_for(LogicalControl::Throttle, 2),
            DeviceBinding::GamepadAxis(2)
        );
        assert_eq!(
            DeviceBinding::gamepad_for(LogicalControl::Reverse, 5).source(),
            InputSource::GamepadButton
        );
    }

    #[test]
    fn test_bind_keeps_one_keyboard_and_one_gamepad() {
        let mut table = BindingTable::empty();
        table
            .bind(LogicalControl::Reverse, DeviceBinding::Keyboard(KeyCode::new("q")))
            .bind(LogicalControl::Reverse, DeviceBinding::GamepadButton(4))
            .bind(LogicalControl::Reverse, DeviceBinding::Keyboard(KeyCode::new("r")));

        assert_eq!(table.keyboard(LogicalControl::Reverse), Some(&KeyCode::new("r")));
        assert_eq!(
            table.gamepad(LogicalControl::Reverse),
            Some(&DeviceBinding::GamepadButton(4))
        );
    }

    #[test]
    fn test_unbound_entries_are_none() {
        let mut table = BindingTable::default_config();
        assert!(table.binding(LogicalControl::Steering).is_none());
        table.unbind_keyboard(LogicalControl::Reverse);
        assert!(table.binding(LogicalControl::Reverse).is_none());
    }
}
