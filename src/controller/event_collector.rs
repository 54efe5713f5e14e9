use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Stable axis order. The index into this table is what bindings refer to.
pub const AXIS_ORDER: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

// Stable button order, same idea as AXIS_ORDER.
pub const BUTTON_ORDER: [Button; 19] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

// Raw controller event with precise chrono timestamps
#[derive(Debug, Clone)]
pub enum RawControllerEvent {
    AxisMoved {
        index: usize,
        value: f32,
        timestamp: DateTime<Local>,
    },
    ButtonChanged {
        index: usize,
        state: ButtonState,
        timestamp: DateTime<Local>,
    },
    Connected {
        name: String,
        timestamp: DateTime<Local>,
    },
    Disconnected {
        timestamp: DateTime<Local>,
    },
}

// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub joystick_deadzone: f32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),

    #[error("Failed to start collector thread: {0}")]
    ThreadError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    // Collector settings
    settings: CollectorSettings,

    // Channel for sending events to processor
    event_sender: mpsc::Sender<RawControllerEvent>,
}

impl<S: CollectionState> EventCollector<S> {
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn active_gamepad(&self) -> Option<GamepadId> {
        self.active_gamepad
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, event_sender))
    }

    // Pick the first connected device and transition to Collecting
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, CollectorError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad or wheel connected, keyboard input only until one appears");
        } else {
            info!("Found {} input devices:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            let name = gamepad.name().to_string();
            self.active_gamepad = Some(*id);
            info!("Selected device: {} ({})", name, id);

            self.send(RawControllerEvent::Connected {
                name,
                timestamp: Local::now(),
            })?;
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }

    fn send(&self, event: RawControllerEvent) -> Result<(), CollectorError> {
        self.event_sender
            .try_send(event)
            .map_err(|e| CollectorError::EventSendError(e.to_string()))
    }
}

impl EventCollector<Collecting> {
    // Collect a single event and forward it to the processor queue
    pub fn collect_next_event(&mut self) -> Result<(), CollectorError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event() else {
            return Ok(());
        };

        if let EventType::Connected = event {
            if self.active_gamepad.is_none() {
                let name = self.gilrs.gamepad(id).name().to_string();
                info!("Device connected and selected: {} ({})", name, id);
                self.active_gamepad = Some(id);
                return self.send(RawControllerEvent::Connected {
                    name,
                    timestamp: Local::now(),
                });
            }
        }

        if self.active_gamepad != Some(id) {
            debug!("Skipping event from non-active device: {:?}", id);
            return Ok(());
        }

        if let EventType::Disconnected = event {
            warn!("Active device disconnected: {}", id);
            self.active_gamepad = None;
        }

        match self.convert_gilrs_event(event) {
            Some(raw_event) => self.send(raw_event),
            None => Ok(()),
        }
    }

    // Run until the token is cancelled
    pub fn run_collection_loop(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        let mut event_count: u64 = 0;
        let mut dropped: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(30);

        while !shutdown.is_cancelled() {
            match self.collect_next_event() {
                Ok(()) => event_count += 1,
                Err(e) => {
                    // Queue full: the processor drains once per tick, later values supersede it
                    dropped += 1;
                    debug!("Dropped controller event: {}", e);
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!(
                    "Event Collector stats: {} polls, {} dropped in last {} seconds",
                    event_count,
                    dropped,
                    log_interval.num_seconds()
                );
                event_count = 0;
                dropped = 0;
                last_log_time = now;
            }

            std::thread::sleep(std::time::Duration::from_micros(500));
        }

        info!("Event Collector loop stopped");
        Ok(())
    }

    fn send(&self, event: RawControllerEvent) -> Result<(), CollectorError> {
        self.event_sender
            .try_send(event)
            .map_err(|e| CollectorError::EventSendError(e.to_string()))
    }

    fn convert_gilrs_event(&self, event: EventType) -> Option<RawControllerEvent> {
        let timestamp = Local::now();

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let index = axis_index(axis)?;
                let value = if is_stick_axis(axis) {
                    apply_deadzone(value, self.settings.joystick_deadzone)
                } else {
                    value.clamp(-1.0, 1.0)
                };
                Some(RawControllerEvent::AxisMoved {
                    index,
                    value,
                    timestamp,
                })
            }
            EventType::ButtonPressed(button, _) => {
                debug!("Button pressed: {:?}", button);
                button_index(button).map(|index| RawControllerEvent::ButtonChanged {
                    index,
                    state: ButtonState::Pressed,
                    timestamp,
                })
            }
            EventType::ButtonReleased(button, _) => {
                debug!("Button released: {:?}", button);
                button_index(button).map(|index| RawControllerEvent::ButtonChanged {
                    index,
                    state: ButtonState::Released,
                    timestamp,
                })
            }
            EventType::Disconnected => Some(RawControllerEvent::Disconnected { timestamp }),
            _ => None,
        }
    }
}

// Public interface for spawning the collector on its own OS thread
pub struct CollectorHandle {
    thread: std::thread::JoinHandle<()>,
}

impl CollectorHandle {
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
        shutdown: CancellationToken,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        // gilrs is created on the collector thread and never leaves it.
        let thread = std::thread::Builder::new()
            .name("input-collector".to_string())
            .spawn(move || {
                let collector = match EventCollector::create(settings, event_sender) {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Failed to create Event Collector: {}", e);
                        return;
                    }
                };
                match collector.initialize() {
                    Ok(mut collecting) => {
                        if let Err(e) = collecting.run_collection_loop(shutdown) {
                            error!("Collector terminated with error: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to initialize Event Collector: {}", e),
                }
            })
            .map_err(|e| CollectorError::ThreadError(e.to_string()))?;

        info!("Event Collector successfully started");
        Ok(Self { thread })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

pub fn axis_index(axis: Axis) -> Option<usize> {
    AXIS_ORDER.iter().position(|a| *a == axis)
}

pub fn button_index(button: Button) -> Option<usize> {
    BUTTON_ORDER.iter().position(|b| *b == button)
}

fn is_stick_axis(axis: Axis) -> bool {
    matches!(
        axis,
        Axis::LeftStickX | Axis::LeftStickY | Axis::RightStickX | Axis::RightStickY
    )
}

// Rescale the value to the range outside the deadzone
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    let value = value.clamp(-1.0, 1.0);
    if deadzone <= 0.0 || deadzone >= 1.0 {
        return value;
    }
    if value.abs() < deadzone {
        0.0
    } else {
        value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
