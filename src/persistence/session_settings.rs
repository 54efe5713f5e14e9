//! Typed settings built once at session start

use super::{
    SettingValue, SettingsProvider, SECTION_AXIS_MAPPING, SECTION_CONTROLLER,
    SECTION_KEY_MAPPING, SECTION_SETTINGS, SECTION_TRIAL,
};
use crate::controller::controller_handle::ControllerSettings;
use crate::controller::raw_input::KeyCode;
use crate::mapping::binding::{BindingTable, DeviceBinding, LogicalControl};
use crate::mapping::error::MappingError;
use crate::mapping::response_curve::DampingCoefficients;
use crate::trial::TrialSettings;
use crate::vehicle::actuator::{Location, Rotation, SpeedUnit, Transform};
use toml::{Table, Value};
use tracing::{debug, warn};

pub const DEFAULT_TICK_RATE_HZ: f64 = 60.0;
/// Highest accepted frame rate; the tick period must stay a whole millisecond
pub const MAX_TICK_RATE_HZ: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudSettings {
    pub speed_unit: SpeedUnit,
}

/// Everything the session needs from the settings file
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub bindings: BindingTable,
    pub damping: DampingCoefficients,
    pub trial: TrialSettings,
    pub hud: HudSettings,
    pub controller: ControllerSettings,
    pub tick_rate_hz: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            bindings: BindingTable::default_config(),
            damping: DampingCoefficients::default(),
            trial: TrialSettings::default(),
            hud: HudSettings::default(),
            controller: ControllerSettings::from_tick_rate(
                DEFAULT_TICK_RATE_HZ,
                ControllerSettings::default().joystick_deadzone,
            ),
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }
}

// `none` or an empty value clears a binding
fn is_cleared(value: &SettingValue) -> bool {
    match value {
        SettingValue::Str(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("none")
        }
        _ => false,
    }
}

impl SessionSettings {
    /// Builds the typed settings; never fails
    pub fn from_provider(provider: &dyn SettingsProvider) -> Self {
        let defaults = Self::default();

        let tick_rate_hz =
            provider.get_f64(SECTION_CONTROLLER, "tick_rate_hz", DEFAULT_TICK_RATE_HZ);
        let tick_rate_hz = match tick_rate_hz {
            hz if hz > 0.0 && hz <= MAX_TICK_RATE_HZ => hz,
            hz => {
                warn!(
                    "tick_rate_hz {} outside (0, {}], using {}",
                    hz, MAX_TICK_RATE_HZ, DEFAULT_TICK_RATE_HZ
                );
                DEFAULT_TICK_RATE_HZ
            }
        };
        let deadzone = provider.get_f64(
            SECTION_CONTROLLER,
            "joystick_deadzone",
            f64::from(defaults.controller.joystick_deadzone),
        );

        let speed_unit_name =
            provider.get_string(SECTION_SETTINGS, "speed_unit", SpeedUnit::default().label());
        let speed_unit = SpeedUnit::parse(&speed_unit_name).unwrap_or_else(|| {
            warn!("Unknown speed unit {:?}, using km/h", speed_unit_name);
            SpeedUnit::default()
        });

        let settings = Self {
            bindings: load_bindings(provider),
            damping: load_damping(provider),
            trial: load_trial(provider),
            hud: HudSettings { speed_unit },
            controller: ControllerSettings::from_tick_rate(
                tick_rate_hz,
                deadzone.clamp(0.0, 1.0) as f32,
            ),
            tick_rate_hz,
        };
        debug!("Session settings: {:?}", settings);
        settings
    }

    /// Default settings file content
    pub fn default_table() -> Table {
        let defaults = Self::default();
        let mut table = Table::new();

        let mut axis = Table::new();
        axis.insert(
            "steering_damping".into(),
            Value::Float(f64::from(defaults.damping.steering)),
        );
        axis.insert(
            "throttle_damping".into(),
            Value::Float(f64::from(defaults.damping.throttle)),
        );
        axis.insert(
            "brake_damping".into(),
            Value::Float(f64::from(defaults.damping.brake)),
        );
        table.insert(SECTION_AXIS_MAPPING.into(), Value::Table(axis));

        let mut keys = Table::new();
        for control in LogicalControl::ALL {
            if let Some(key) = defaults.bindings.keyboard(control) {
                keys.insert(
                    format!("key_{}", control.config_key()),
                    Value::String(key.name().to_string()),
                );
            }
        }
        table.insert(SECTION_KEY_MAPPING.into(), Value::Table(keys));

        let pose = defaults.trial.start_pose;
        let mut trial = Table::new();
        for (key, value) in [
            ("location_x", pose.location.x),
            ("location_y", pose.location.y),
            ("location_z", pose.location.z),
            ("rotation_pitch", pose.rotation.pitch),
            ("rotation_yaw", pose.rotation.yaw),
            ("rotation_roll", pose.rotation.roll),
            ("speed_limit", defaults.trial.speed_limit),
            ("countdown_duration", defaults.trial.countdown_duration),
        ] {
            trial.insert(key.into(), Value::Float(value));
        }
        table.insert(SECTION_TRIAL.into(), Value::Table(trial));

        let mut general = Table::new();
        general.insert(
            "speed_unit".into(),
            Value::String(defaults.hud.speed_unit.label().to_string()),
        );
        table.insert(SECTION_SETTINGS.into(), Value::Table(general));

        let mut controller = Table::new();
        controller.insert("tick_rate_hz".into(), Value::Float(defaults.tick_rate_hz));
        controller.insert(
            "joystick_deadzone".into(),
            Value::Float(f64::from(defaults.controller.joystick_deadzone)),
        );
        table.insert(SECTION_CONTROLLER.into(), Value::Table(controller));

        table
    }
}

fn load_bindings(provider: &dyn SettingsProvider) -> BindingTable {
    let mut table = BindingTable::default_config();

    for control in LogicalControl::ALL {
        let joy_key = format!("joy_{}", control.config_key());
        if let Some(value) = provider.get(SECTION_AXIS_MAPPING, &joy_key) {
            if is_cleared(&value) {
                table.unbind_gamepad(control);
            } else if let Some(index) = value.as_index() {
                table.bind(control, DeviceBinding::gamepad_for(control, index));
            } else {
                let err = MappingError::InvalidBinding {
                    control: joy_key,
                    value: value.to_string(),
                };
                warn!("{}, leaving unbound", err);
            }
        }

        let key_key = format!("key_{}", control.config_key());
        if let Some(value) = provider.get(SECTION_KEY_MAPPING, &key_key) {
            if is_cleared(&value) {
                table.unbind_keyboard(control);
            } else {
                table.bind(control, DeviceBinding::Keyboard(KeyCode::new(value.to_string())));
            }
        }
    }

    for (section, prefix) in [(SECTION_AXIS_MAPPING, "joy_"), (SECTION_KEY_MAPPING, "key_")] {
        for key in provider.keys(section) {
            if let Some(name) = key.strip_prefix(prefix) {
                if LogicalControl::from_config_key(name).is_none() {
                    warn!("{}", MappingError::UnknownControl(key.clone()));
                }
            }
        }
    }

    table
}

fn load_damping(provider: &dyn SettingsProvider) -> DampingCoefficients {
    let read = |key: &str, fallback: f32| {
        let value = provider.get_f64(SECTION_AXIS_MAPPING, key, f64::from(fallback)) as f32;
        if DampingCoefficients::is_valid(value) {
            value
        } else {
            let err = MappingError::DampingOutOfRange {
                control: key.to_string(),
                value: f64::from(value),
            };
            warn!("{}, using {}", err, fallback);
            fallback
        }
    };

    DampingCoefficients {
        steering: read("steering_damping", DampingCoefficients::DEFAULT_STEERING),
        throttle: read("throttle_damping", DampingCoefficients::DEFAULT_THROTTLE),
        brake: read("brake_damping", DampingCoefficients::DEFAULT_BRAKE),
    }
}

fn load_trial(provider: &dyn SettingsProvider) -> TrialSettings {
    let defaults = TrialSettings::default();
    let pose = defaults.start_pose;
    let get = |key: &str, fallback: f64| provider.get_f64(SECTION_TRIAL, key, fallback);

    let speed_limit = match get("speed_limit", defaults.speed_limit) {
        limit if limit >= 0.0 => limit,
        limit => {
            warn!("Negative speed limit {}, using {}", limit, defaults.speed_limit);
            defaults.speed_limit
        }
    };

    TrialSettings {
        start_pose: Transform::new(
            Location {
                x: get("location_x", pose.location.x),
                y: get("location_y", pose.location.y),
                z: get("location_z", pose.location.z),
            },
            Rotation {
                pitch: get("rotation_pitch", pose.rotation.pitch),
                yaw: get("rotation_yaw", pose.rotation.yaw),
                roll: get("rotation_roll", pose.rotation.roll),
            },
        ),
        speed_limit,
        countdown_duration: get("countdown_duration", defaults.countdown_duration).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemorySettings, TomlSettings};

    #[test]
    fn test_empty_provider_gives_defaults() {
        let settings = SessionSettings::from_provider(&MemorySettings::new());
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(settings.trial.speed_limit, 45.0);
        assert_eq!(settings.trial.start_pose.rotation.yaw, -86.76);
        assert_eq!(settings.controller.processing_interval_ms, 17);
    }

    #[test]
    fn test_bindings_from_settings() {
        let mut provider = MemorySettings::new();
        provider
            .set(SECTION_AXIS_MAPPING, "joy_steering", 0_i64)
            .set(SECTION_AXIS_MAPPING, "joy_throttle", "2")
            .set(SECTION_AXIS_MAPPING, "joy_reverse", 4_i64)
            .set(SECTION_AXIS_MAPPING, "joy_brake", "pedal")
            .set(SECTION_AXIS_MAPPING, "joy_warp", 1_i64)
            .set(SECTION_KEY_MAPPING, "key_reverse", "R")
            .set(SECTION_KEY_MAPPING, "key_hide_hud", "none");

        let bindings = SessionSettings::from_provider(&provider).bindings;
        assert_eq!(
            bindings.gamepad(LogicalControl::Steering),
            Some(&DeviceBinding::GamepadAxis(0))
        );
        assert_eq!(
            bindings.gamepad(LogicalControl::Throttle),
            Some(&DeviceBinding::GamepadAxis(2))
        );
        assert_eq!(
            bindings.gamepad(LogicalControl::Reverse),
            Some(&DeviceBinding::GamepadButton(4))
        );
        assert_eq!(bindings.gamepad(LogicalControl::Brake), None);
        assert_eq!(bindings.keyboard(LogicalControl::Reverse), Some(&KeyCode::new("r")));
        assert_eq!(bindings.keyboard(LogicalControl::HideHud), None);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let mut provider = MemorySettings::new();
        provider
            .set(SECTION_AXIS_MAPPING, "steering_damping", 3.0)
            .set(SECTION_AXIS_MAPPING, "brake_damping", 0.25)
            .set(SECTION_TRIAL, "speed_limit", -5.0)
            .set(SECTION_TRIAL, "countdown_duration", 5_i64)
            .set(SECTION_SETTINGS, "speed_unit", "furlongs")
            .set(SECTION_CONTROLLER, "tick_rate_hz", 0_i64);

        let settings = SessionSettings::from_provider(&provider);
        assert_eq!(settings.damping.steering, DampingCoefficients::DEFAULT_STEERING);
        assert_eq!(settings.damping.brake, 0.25);
        assert_eq!(settings.trial.speed_limit, 45.0);
        assert_eq!(settings.trial.countdown_duration, 5.0);
        assert_eq!(settings.hud.speed_unit, SpeedUnit::KilometresPerHour);
        assert_eq!(settings.tick_rate_hz, DEFAULT_TICK_RATE_HZ);

        provider.set(SECTION_CONTROLLER, "tick_rate_hz", 1e10);
        let settings = SessionSettings::from_provider(&provider);
        assert_eq!(settings.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
        assert_eq!(settings.controller.processing_interval_ms, 17);

        provider.set(SECTION_CONTROLLER, "tick_rate_hz", MAX_TICK_RATE_HZ);
        let settings = SessionSettings::from_provider(&provider);
        assert_eq!(settings.tick_rate_hz, MAX_TICK_RATE_HZ);
        assert_eq!(settings.controller.processing_interval_ms, 1);
    }

    #[test]
    fn test_default_table_reproduces_defaults() {
        let provider = TomlSettings::from_table(SessionSettings::default_table());
        assert_eq!(SessionSettings::from_provider(&provider), SessionSettings::default());

        let rendered = toml::to_string_pretty(&SessionSettings::default_table()).unwrap();
        assert!(rendered.contains("[TrialSettings]"));
        assert!(rendered.contains("key_confirm = \"return\""));
    }
}
