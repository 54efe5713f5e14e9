//! Controller Handle - Unified API for gamepad and wheel input
//!
//! Provides a high-level interface for the two-stage controller architecture:
//! raw event collection and per-tick snapshot processing. Manages the lifecycle
//! of both subsystems and the single-slot handoff to the frame loop.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use super::event_collector::{
    ButtonState, CollectorError, CollectorHandle, CollectorSettings, RawControllerEvent,
};
pub use super::event_processor::{ProcessorError, ProcessorHandle, ProcessorSettings};
use super::raw_input::GamepadSnapshot;
use crate::sensor::{latest_value, LatestReceiver};

/// Configuration settings for the complete controller subsystem
///
/// Settings are split between the collector (deadzone) and the processor
/// (snapshot interval) on spawn.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerSettings {
    /// Snapshot interval in milliseconds
    ///
    /// Should match the frame loop so each tick sees a fresh snapshot. 17 ms
    /// corresponds to the 60 Hz default.
    pub processing_interval_ms: u64,

    /// Analog stick deadzone as a fraction (0.0-1.0)
    ///
    /// Applied to stick axes only. Wheel and pedal axes are passed through
    /// untouched so the response curves see the full range.
    pub joystick_deadzone: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 17,
            joystick_deadzone: 0.05,
        }
    }
}

impl ControllerSettings {
    pub fn from_tick_rate(tick_rate_hz: f64, joystick_deadzone: f32) -> Self {
        let interval = if tick_rate_hz > 0.0 {
            (1000.0 / tick_rate_hz).round() as u64
        } else {
            Self::default().processing_interval_ms
        };
        Self {
            processing_interval_ms: interval.max(1),
            joystick_deadzone,
        }
    }
}

/// Errors that can occur during controller initialization
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Error from the event collection subsystem
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    /// Error from the snapshot processing subsystem
    #[error("Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),
}

/// Handle for the running controller subsystem
///
/// # Threading Model
///
/// 1. **Collector thread**: owns the gilrs context, polls the device and pushes raw events
/// 2. **Processor task**: folds queued events once per interval into a [`GamepadSnapshot`]
///
/// ```text
/// gilrs ─► Collector ─[RawControllerEvent]─► Processor ─[latest snapshot]─► frame loop
///          (OS thread)   (mpsc, 1000)        (tokio task)   (single slot)
/// ```
///
/// Dropping the handle does not stop the subsystem; call [`ControllerHandle::shutdown`].
pub struct ControllerHandle {
    state_receiver: LatestReceiver<GamepadSnapshot>,
    shutdown: CancellationToken,
    _collector: CollectorHandle,
    _processor: ProcessorHandle,
}

impl ControllerHandle {
    /// Spawns collector and processor
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::CollectorError`] - the collector thread could not be started
    pub fn spawn(settings: Option<ControllerSettings>) -> Result<Self, ControllerError> {
        info!("Initializing Controller system with settings: {:?}", settings);

        let settings = settings.unwrap_or_default();
        let collector_settings = CollectorSettings {
            joystick_deadzone: settings.joystick_deadzone,
        };
        let processor_settings = ProcessorSettings {
            processing_interval_ms: settings.processing_interval_ms,
        };
        debug!(
            "Split settings: collector={:?}, processor={:?}",
            collector_settings, processor_settings
        );

        let shutdown = CancellationToken::new();
        let (event_sender, event_receiver) = mpsc::channel(1000);
        let (state_sender, state_receiver) = latest_value();

        let collector =
            CollectorHandle::spawn(Some(collector_settings), event_sender, shutdown.clone())?;
        let processor = ProcessorHandle::spawn(
            event_receiver,
            state_sender,
            Some(processor_settings),
            shutdown.clone(),
        );

        info!("Controller system initialized successfully");
        Ok(Self {
            state_receiver,
            shutdown,
            _collector: collector,
            _processor: processor,
        })
    }

    /// Receiver for the latest device snapshot
    pub fn subscribe(&self) -> LatestReceiver<GamepadSnapshot> {
        self.state_receiver.clone()
    }

    /// Latest snapshot, `None` when no device is connected
    pub fn current(&self) -> Option<GamepadSnapshot> {
        self.state_receiver.latest()
    }

    /// Stops the collector thread and the processor task
    pub fn shutdown(&self) {
        info!("Shutting down controller subsystem");
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_tick_rate() {
        assert_eq!(
            ControllerSettings::from_tick_rate(60.0, 0.05).processing_interval_ms,
            17
        );
        assert_eq!(
            ControllerSettings::from_tick_rate(0.0, 0.05).processing_interval_ms,
            17
        );
        assert_eq!(
            ControllerSettings::from_tick_rate(5000.0, 0.0).processing_interval_ms,
            1
        );
    }
}
