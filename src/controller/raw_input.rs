//! Per-frame raw input snapshot
//!
//! A [`RawInputState`] is built exactly once at the start of every tick and then
//! handed by reference to every consumer. Nothing downstream polls device state
//! on its own, so all readers within one tick observe the same input.

use crate::sensor::LatestReceiver;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Normalized keyboard key name
///
/// Key names coming from configuration are free-form strings (`"Q"`, `"return"`,
/// `" kp1"`), so they are trimmed and lower-cased on construction. Two codes are
/// equal when their normalized names are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(String);

impl KeyCode {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KeyCode {
    fn from(name: &str) -> Self {
        KeyCode::new(name)
    }
}

/// Axis and button values reported by the active gamepad or wheel
///
/// `axes` holds normalized values in `[-1, 1]` indexed by the collector's stable
/// axis order; `buttons` holds pressed flags indexed by its button order. The
/// vector lengths are the device's reported capability.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GamepadSnapshot {
    pub name: String,
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
}

impl GamepadSnapshot {
    pub fn new(name: impl Into<String>, axis_count: usize, button_count: usize) -> Self {
        Self {
            name: name.into(),
            axes: vec![0.0; axis_count],
            buttons: vec![false; button_count],
        }
    }

    /// Axis value, or `None` when the device has no axis at `index`
    pub fn axis(&self, index: usize) -> Option<f32> {
        self.axes.get(index).copied()
    }

    /// Button state, or `None` when the device has no button at `index`
    pub fn button(&self, index: usize) -> Option<bool> {
        self.buttons.get(index).copied()
    }
}

/// Immutable input snapshot for a single tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawInputState {
    keys: HashSet<KeyCode>,
    gamepad: Option<GamepadSnapshot>,
    frame_ms: f64,
}

impl RawInputState {
    pub fn new(
        keys: impl IntoIterator<Item = KeyCode>,
        gamepad: Option<GamepadSnapshot>,
        frame_ms: f64,
    ) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
            gamepad,
            frame_ms: frame_ms.max(0.0),
        }
    }

    /// Snapshot from the latest captured key set and gamepad state
    ///
    /// Without a key source (no terminal) nothing is pressed.
    pub fn capture(
        keys: Option<&LatestReceiver<Vec<KeyCode>>>,
        gamepad: &LatestReceiver<GamepadSnapshot>,
        frame_ms: f64,
    ) -> Self {
        let keys = keys.and_then(LatestReceiver::latest).unwrap_or_default();
        Self::new(keys, gamepad.latest(), frame_ms)
    }

    /// Snapshot with nothing pressed and no gamepad
    pub fn idle(frame_ms: f64) -> Self {
        Self::new(std::iter::empty(), None, frame_ms)
    }

    pub fn is_pressed(&self, key: &KeyCode) -> bool {
        self.keys.contains(key)
    }

    /// True if any of the named keys is held
    pub fn any_pressed(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.keys.contains(&KeyCode::new(name)))
    }

    pub fn pressed_keys(&self) -> &HashSet<KeyCode> {
        &self.keys
    }

    pub fn gamepad(&self) -> Option<&GamepadSnapshot> {
        self.gamepad.as_ref()
    }

    /// Milliseconds elapsed since the previous tick
    pub fn frame_ms(&self) -> f64 {
        self.frame_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_code_normalizes_names() {
        assert_eq!(KeyCode::new(" Q "), KeyCode::new("q"));
        assert_eq!(KeyCode::from("Return").name(), "return");
    }

    #[test]
    fn test_empty_key_names_are_dropped() {
        let state = RawInputState::new(vec![KeyCode::new(""), KeyCode::new("w")], None, 16.0);
        assert_eq!(state.pressed_keys().len(), 1);
        assert!(state.any_pressed(&["up", "W"]));
    }

    #[test]
    fn test_gamepad_out_of_range_is_none() {
        let pad = GamepadSnapshot::new("wheel", 3, 2);
        assert_eq!(pad.axis(2), Some(0.0));
        assert_eq!(pad.axis(3), None);
        assert_eq!(pad.button(5), None);
    }

    #[test]
    fn test_negative_frame_time_is_clamped() {
        assert_eq!(RawInputState::idle(-4.0).frame_ms(), 0.0);
    }
}
