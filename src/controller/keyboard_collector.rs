//! Terminal keyboard capture
//!
//! Puts the terminal into raw mode and reads key events on a dedicated thread.
//! The set of currently held keys is published through a latest-value slot,
//! the same handoff the gamepad pipeline uses.
//!
//! Terminals that support the keyboard enhancement protocol report key
//! releases. Elsewhere a key counts as held while it keeps auto-repeating, and
//! is dropped once no press arrived for [`DEFAULT_HOLD_WINDOW_MS`].

use chrono::{DateTime, Local};
use crossterm::event::{
    self, Event, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::collections::HashMap;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::raw_input::KeyCode;
use crate::sensor::{latest_value, LatestReceiver, LatestSender};

/// Longer than the usual auto-repeat delay, so a held key does not flicker
pub const DEFAULT_HOLD_WINDOW_MS: i64 = 550;

const POLL_INTERVAL_MS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    #[error("Failed to set up terminal: {0}")]
    Terminal(#[from] io::Error),

    #[error("Failed to start keyboard thread: {0}")]
    ThreadError(String),
}

/// Key name as used in `[KeyMapping]`, `None` for keys nothing can bind
pub fn key_name(event: &KeyEvent) -> Option<KeyCode> {
    let name = match event.code {
        TermKey::Char(' ') => "space".to_string(),
        TermKey::Char('.') => "period".to_string(),
        TermKey::Char(',') => "comma".to_string(),
        TermKey::Char(c) if c.is_ascii_digit() && event.state.contains(KeyEventState::KEYPAD) => {
            format!("kp{}", c)
        }
        TermKey::Char(c) => c.to_lowercase().to_string(),
        TermKey::Enter => "return".to_string(),
        TermKey::Up => "up".to_string(),
        TermKey::Down => "down".to_string(),
        TermKey::Left => "left".to_string(),
        TermKey::Right => "right".to_string(),
        TermKey::Tab => "tab".to_string(),
        TermKey::Backspace => "backspace".to_string(),
        TermKey::F(n) => format!("f{}", n),
        _ => return None,
    };
    Some(KeyCode::new(name))
}

fn is_quit(event: &KeyEvent) -> bool {
    let ctrl_c =
        event.code == TermKey::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL);
    event.kind != KeyEventKind::Release && (event.code == TermKey::Esc || ctrl_c)
}

/// Keys currently held down, built from press/repeat/release events
#[derive(Debug, Clone)]
pub struct HeldKeys {
    pressed: HashMap<KeyCode, DateTime<Local>>,
    reports_release: bool,
    hold_window: chrono::Duration,
}

impl HeldKeys {
    pub fn new(reports_release: bool, hold_window: chrono::Duration) -> Self {
        Self {
            pressed: HashMap::new(),
            reports_release,
            hold_window,
        }
    }

    /// Returns whether the held set changed
    pub fn apply(&mut self, event: &KeyEvent, at: DateTime<Local>) -> bool {
        let Some(key) = key_name(event) else {
            debug!("Ignoring unmapped key {:?}", event.code);
            return false;
        };
        match event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => self.pressed.insert(key, at).is_none(),
            KeyEventKind::Release => self.pressed.remove(&key).is_some(),
        }
    }

    /// Drops keys whose last press is older than the hold window
    ///
    /// No-op when the terminal reports releases.
    pub fn expire(&mut self, at: DateTime<Local>) -> bool {
        if self.reports_release {
            return false;
        }
        let before = self.pressed.len();
        let window = self.hold_window;
        self.pressed.retain(|_, last| at - *last <= window);
        self.pressed.len() != before
    }

    pub fn keys(&self) -> Vec<KeyCode> {
        self.pressed.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}

// Raw mode for as long as the guard lives
struct RawTerminal {
    reports_release: bool,
}

impl RawTerminal {
    fn enter() -> Result<Self, KeyboardError> {
        terminal::enable_raw_mode()?;

        let mut reports_release = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
        if reports_release {
            let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                | KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES;
            if let Err(e) = execute!(io::stdout(), PushKeyboardEnhancementFlags(flags)) {
                warn!("Keyboard enhancement unavailable: {}", e);
                reports_release = false;
            }
        }
        info!(
            "Terminal in raw mode, key releases {}",
            if reports_release { "reported" } else { "inferred from auto-repeat" }
        );
        Ok(Self { reports_release })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.reports_release {
            if let Err(e) = execute!(io::stdout(), PopKeyboardEnhancementFlags) {
                warn!("Failed to restore keyboard flags: {}", e);
            }
        }
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to leave raw mode: {}", e);
        }
    }
}

/// Running keyboard capture
///
/// Esc or Ctrl-C cancels the `quit` token handed to [`KeyboardHandle::spawn`];
/// in raw mode the terminal no longer turns Ctrl-C into a signal.
pub struct KeyboardHandle {
    keys: LatestReceiver<Vec<KeyCode>>,
    shutdown: CancellationToken,
    thread: std::thread::JoinHandle<()>,
}

impl KeyboardHandle {
    pub fn spawn(quit: CancellationToken) -> Result<Self, KeyboardError> {
        let raw_terminal = RawTerminal::enter()?;
        let (sender, keys) = latest_value();
        let shutdown = CancellationToken::new();
        let loop_shutdown = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("keyboard-collector".to_string())
            .spawn(move || {
                let held = HeldKeys::new(
                    raw_terminal.reports_release,
                    chrono::Duration::milliseconds(DEFAULT_HOLD_WINDOW_MS),
                );
                if let Err(e) = run_capture_loop(held, &sender, &loop_shutdown, &quit) {
                    error!("Keyboard capture terminated with error: {}", e);
                }
                drop(raw_terminal);
            })
            .map_err(|e| KeyboardError::ThreadError(e.to_string()))?;

        info!("Keyboard capture started");
        Ok(Self {
            keys,
            shutdown,
            thread,
        })
    }

    pub fn subscribe(&self) -> LatestReceiver<Vec<KeyCode>> {
        self.keys.clone()
    }

    /// Stops the capture thread and restores the terminal
    pub fn shutdown(self) {
        info!("Shutting down keyboard capture");
        self.shutdown.cancel();
        if self.thread.join().is_err() {
            error!("Keyboard capture thread panicked");
        }
    }
}

fn run_capture_loop(
    mut held: HeldKeys,
    sender: &LatestSender<Vec<KeyCode>>,
    shutdown: &CancellationToken,
    quit: &CancellationToken,
) -> Result<(), KeyboardError> {
    sender.publish(Vec::new());

    while !shutdown.is_cancelled() {
        let mut changed = false;
        if event::poll(std::time::Duration::from_millis(POLL_INTERVAL_MS))? {
            if let Event::Key(key) = event::read()? {
                if is_quit(&key) {
                    info!("Quit key pressed");
                    quit.cancel();
                    break;
                }
                changed |= held.apply(&key, Local::now());
            }
        }
        changed |= held.expire(Local::now());

        if changed {
            debug!("Held keys: {:?}", held.keys());
            sender.publish(held.keys());
        }
    }
    Ok(())
}

/// Log writer that ends lines with `\r\n`
///
/// Raw mode disables output post-processing, so a bare `\n` would not return
/// the cursor to column 0.
pub struct RawModeWriter<W>(pub W);

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' {
                self.0.write_all(&buf[start..i])?;
                self.0.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.0.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::raw_input::{GamepadSnapshot, RawInputState};
    use crate::persistence::SessionSettings;
    use crate::session::DrivingSession;
    use crate::vehicle::KinematicActuator;

    fn key(code: TermKey, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    fn window() -> chrono::Duration {
        chrono::Duration::milliseconds(DEFAULT_HOLD_WINDOW_MS)
    }

    #[test]
    fn test_key_names_match_bindings() {
        let name = |code| {
            key_name(&key(code, KeyEventKind::Press)).map(|k| k.name().to_string())
        };
        assert_eq!(name(TermKey::Char('W')), Some("w".to_string()));
        assert_eq!(name(TermKey::Char(' ')), Some("space".to_string()));
        assert_eq!(name(TermKey::Char('.')), Some("period".to_string()));
        assert_eq!(name(TermKey::Enter), Some("return".to_string()));
        assert_eq!(name(TermKey::F(1)), Some("f1".to_string()));
        assert_eq!(name(TermKey::Char('1')), Some("1".to_string()));
        assert_eq!(name(TermKey::Insert), None);

        let keypad = KeyEvent::new_with_kind_and_state(
            TermKey::Char('1'),
            KeyModifiers::NONE,
            KeyEventKind::Press,
            KeyEventState::KEYPAD,
        );
        assert_eq!(key_name(&keypad), Some(KeyCode::new("kp1")));
    }

    #[test]
    fn test_release_events_drop_keys() {
        let mut held = HeldKeys::new(true, window());
        let t0 = Local::now();

        assert!(held.apply(&key(TermKey::Char('w'), KeyEventKind::Press), t0));
        assert!(!held.apply(&key(TermKey::Char('w'), KeyEventKind::Repeat), t0));
        // Releases are reported, so age never drops a key
        assert!(!held.expire(t0 + chrono::Duration::seconds(10)));
        assert_eq!(held.keys(), vec![KeyCode::new("w")]);

        assert!(held.apply(&key(TermKey::Char('w'), KeyEventKind::Release), t0));
        assert!(held.is_empty());
    }

    #[test]
    fn test_keys_expire_without_release_events() {
        let mut held = HeldKeys::new(false, window());
        let t0 = Local::now();

        held.apply(&key(TermKey::Char('a'), KeyEventKind::Press), t0);
        assert!(!held.expire(t0 + chrono::Duration::milliseconds(400)));

        // Auto-repeat refreshes the key
        held.apply(
            &key(TermKey::Char('a'), KeyEventKind::Press),
            t0 + chrono::Duration::milliseconds(500),
        );
        assert!(!held.expire(t0 + chrono::Duration::milliseconds(900)));
        assert!(held.expire(t0 + chrono::Duration::milliseconds(1100)));
        assert!(held.is_empty());
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit(&key(TermKey::Esc, KeyEventKind::Press)));
        assert!(is_quit(&KeyEvent::new(TermKey::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&key(TermKey::Char('c'), KeyEventKind::Press)));
        assert!(!is_quit(&key(TermKey::Esc, KeyEventKind::Release)));
    }

    #[test]
    fn test_captured_key_reaches_session_tick() {
        let (key_sender, key_slot) = latest_value();
        let (_pad_sender, pad_slot) = latest_value::<GamepadSnapshot>();

        let mut held = HeldKeys::new(true, window());
        held.apply(&key(TermKey::Char('w'), KeyEventKind::Press), Local::now());
        key_sender.publish(held.keys());

        let mut session = DrivingSession::new(
            &SessionSettings::default(),
            KinematicActuator::new(1.0 / 60.0),
        );
        let raw = RawInputState::capture(Some(&key_slot), &pad_slot, 16.0);
        let control = session.tick(&raw, 0.0);
        assert_eq!(control.throttle(), 1.0);

        held.apply(&key(TermKey::Char('w'), KeyEventKind::Release), Local::now());
        key_sender.publish(held.keys());
        let raw = RawInputState::capture(Some(&key_slot), &pad_slot, 16.0);
        assert_eq!(session.tick(&raw, 1.0 / 60.0).throttle(), 0.0);
    }

    #[test]
    fn test_raw_mode_writer_returns_carriage() {
        let mut out = RawModeWriter(Vec::new());
        out.write_all(b"one\ntwo\n").unwrap();
        assert_eq!(out.0, b"one\r\ntwo\r\n".to_vec());
    }
}
