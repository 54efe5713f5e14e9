use chrono::Local;
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::event_collector::{
    ButtonState, RawControllerEvent, AXIS_ORDER, BUTTON_ORDER,
};
use crate::controller::raw_input::GamepadSnapshot;
use crate::sensor::{LatestReceiver, LatestSender};

// Event batch for the processing state
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<RawControllerEvent>,
}

// Processor settings
#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    pub processing_interval_ms: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        // One processing pass per rendered frame at 60 Hz
        Self {
            processing_interval_ms: 17,
        }
    }
}

// Processor errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to receive events: {0}")]
    EventReceiveError(String),

    #[error("Failed to process events: {0}")]
    EventProcessingError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ProcessingState {
    Waiting,
    Processing(EventBatch),
    Updating,
}

#[machine]
#[derive(Debug)]
pub struct EventProcessor<S: ProcessingState> {
    // Receiver for raw events
    event_receiver: mpsc::Receiver<RawControllerEvent>,

    // Processor settings
    settings: ProcessorSettings,

    // Folded device state, None while no device is connected
    device: Option<GamepadSnapshot>,

    // Single-slot output
    state_sender: LatestSender<GamepadSnapshot>,
}

impl<S: ProcessingState> EventProcessor<S> {
    pub fn subscribe(&self) -> LatestReceiver<GamepadSnapshot> {
        self.state_sender.subscribe()
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn device(&self) -> Option<&GamepadSnapshot> {
        self.device.as_ref()
    }
}

impl EventProcessor<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        state_sender: LatestSender<GamepadSnapshot>,
        settings: Option<ProcessorSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating Event Processor with settings: {:?}", settings);
        Self::new(event_receiver, settings, None, state_sender)
    }

    // Drain everything queued since the last pass
    pub fn collect(mut self) -> Result<EventProcessor<Processing>, ProcessorError> {
        let mut events = Vec::new();

        loop {
            match self.event_receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    error!("Event channel disconnected!");
                    return Err(ProcessorError::EventReceiveError(
                        "Event channel disconnected".to_string(),
                    ));
                }
            }
        }

        if !events.is_empty() {
            debug!("Collected batch of {} events for processing", events.len());
        }

        Ok(self.transition_with(EventBatch { events }))
    }
}

impl EventProcessor<Processing> {
    // Fold the batch into the device state, latest value per axis/button wins
    pub fn process_events(mut self) -> Result<EventProcessor<Updating>, ProcessorError> {
        let raw_events = match self.get_state_data() {
            Some(batch) => batch.events.clone(),
            None => {
                warn!("No event batch found in state data");
                Vec::new()
            }
        };

        for event in &raw_events {
            self.apply_event(event)?;
        }

        Ok(self.transition())
    }

    fn apply_event(&mut self, event: &RawControllerEvent) -> Result<(), ProcessorError> {
        match event {
            RawControllerEvent::Connected { name, timestamp } => {
                info!(
                    "Device online: {} at {}",
                    name,
                    timestamp.format("%H:%M:%S.%3f")
                );
                self.device = Some(GamepadSnapshot::new(
                    name.clone(),
                    AXIS_ORDER.len(),
                    BUTTON_ORDER.len(),
                ));
            }
            RawControllerEvent::Disconnected { timestamp } => {
                warn!("Device offline at {}", timestamp.format("%H:%M:%S.%3f"));
                self.device = None;
            }
            RawControllerEvent::AxisMoved { index, value, .. } => {
                let Some(device) = self.device.as_mut() else {
                    debug!("Axis event without a connected device, ignored");
                    return Ok(());
                };
                let slot = device.axes.get_mut(*index).ok_or_else(|| {
                    ProcessorError::EventProcessingError(format!(
                        "axis index {} out of range",
                        index
                    ))
                })?;
                *slot = *value;
            }
            RawControllerEvent::ButtonChanged { index, state, .. } => {
                let Some(device) = self.device.as_mut() else {
                    debug!("Button event without a connected device, ignored");
                    return Ok(());
                };
                let slot = device.buttons.get_mut(*index).ok_or_else(|| {
                    ProcessorError::EventProcessingError(format!(
                        "button index {} out of range",
                        index
                    ))
                })?;
                *slot = *state == ButtonState::Pressed;
            }
        }
        Ok(())
    }
}

impl EventProcessor<Updating> {
    // Overwrite the output slot and go back to Waiting
    pub fn update_state(self) -> EventProcessor<Waiting> {
        match &self.device {
            Some(device) => self.state_sender.publish(device.clone()),
            None => self.state_sender.clear(),
        }
        self.transition()
    }
}

// Public interface for spawning the processor task
pub struct ProcessorHandle {
    state_receiver: LatestReceiver<GamepadSnapshot>,
}

impl ProcessorHandle {
    pub fn spawn(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        state_sender: LatestSender<GamepadSnapshot>,
        settings: Option<ProcessorSettings>,
        shutdown: CancellationToken,
    ) -> Self {
        info!("Spawning Event Processor with settings: {:?}", settings);

        let processor = EventProcessor::create(event_receiver, state_sender, settings);
        let state_receiver = processor.subscribe();

        tokio::spawn(async move {
            info!("Event Processor task started");
            if let Err(e) = run_processor_loop(processor, shutdown).await {
                error!("Processor task terminated with error: {}", e);
            } else {
                info!("Event Processor task finished");
            }
        });

        Self { state_receiver }
    }

    pub fn subscribe(&self) -> LatestReceiver<GamepadSnapshot> {
        self.state_receiver.clone()
    }
}

async fn run_processor_loop(
    mut processor: EventProcessor<Waiting>,
    shutdown: CancellationToken,
) -> Result<(), ProcessorError> {
    let period = processor.settings().processing_interval_ms.max(1);
    info!("Starting processor loop with {}ms interval", period);

    let mut interval_timer = tokio::time::interval(tokio::time::Duration::from_millis(period));
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut cycles: u64 = 0;
    let mut total_events: usize = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Processor shutdown requested");
                return Ok(());
            }
            _ = interval_timer.tick() => {}
        }

        let processing = processor.collect()?;
        total_events += processing
            .get_state_data()
            .map(|batch| batch.events.len())
            .unwrap_or(0);
        processor = processing.process_events()?.update_state();
        cycles += 1;

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            debug!(
                "Processor stats: {} cycles, {} events in {} seconds",
                cycles,
                total_events,
                (now - last_stats_time).num_seconds()
            );
            cycles = 0;
            total_events = 0;
            last_stats_time = now;
        }
    }
}
