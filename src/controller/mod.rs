//! Controller subsystem for keyboard, gamepad and wheel input
//!
//! Implements a two-stage capture pipeline feeding the per-frame snapshot:
//!
//! 1. [`event_collector`] - Raw gilrs event collection on a dedicated thread
//! 2. [`event_processor`] - Folds queued events into the latest device state
//! 3. [`controller_handle`] - Unified API and lifecycle management
//! 4. [`keyboard_collector`] - Terminal key capture into a held-key set
//! 5. [`raw_input`] - The immutable [`RawInputState`] built once per tick
//!
//! # Architecture
//!
//! ```text
//! Device ──► Collector ──► Processor ──► [latest slot] ──► RawInputState (per tick)
//!            (Raw Events)  (Folded)                         + held keys
//! Terminal ──► Keyboard collector ──► [latest slot] ──────────────┘
//! ```

pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;
pub mod keyboard_collector;
pub mod raw_input;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use keyboard_collector::{KeyboardError, KeyboardHandle, RawModeWriter};
pub use raw_input::{GamepadSnapshot, KeyCode, RawInputState};
