use color_eyre::{eyre::eyre, Result};
use simdrive::controller::{ControllerHandle, KeyboardHandle, RawInputState, RawModeWriter};
use simdrive::persistence::{default_config_path, SessionSettings, TomlSettings};
use simdrive::session::{Command, DrivingSession};
use simdrive::vehicle::KinematicActuator;
use std::io::IsTerminal;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = load_settings().await;
    info!(
        "Running at {} Hz, speed limit {} mph",
        settings.tick_rate_hz, settings.trial.speed_limit
    );

    let controller = ControllerHandle::spawn(Some(settings.controller.clone()))
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;
    let gamepad = controller.subscribe();

    // Raw-mode key capture owns stdin; without a terminal, stdin carries commands
    let quit = CancellationToken::new();
    let keyboard = if std::io::stdin().is_terminal() {
        match KeyboardHandle::spawn(quit.clone()) {
            Ok(keyboard) => {
                info!("Keyboard driving active, Esc or Ctrl-C quits");
                Some(keyboard)
            }
            Err(e) => {
                warn!("Keyboard capture unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };
    let keys = keyboard.as_ref().map(KeyboardHandle::subscribe);

    let (command_tx, mut command_rx) = mpsc::channel(32);
    if keyboard.is_none() {
        tokio::spawn(read_console_commands(command_tx));
    }

    let step = 1.0 / settings.tick_rate_hz;
    let mut session = DrivingSession::new(&settings, KinematicActuator::new(step));

    let mut interval = tokio::time::interval(Duration::from_secs_f64(step));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let started = Instant::now();
    let mut last_frame = started;
    let mut last_report = 0.0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown requested");
                break;
            }
            _ = quit.cancelled() => {
                info!("Shutdown requested from keyboard");
                break;
            }
            _ = interval.tick() => {
                while let Ok(command) = command_rx.try_recv() {
                    session.submit(command);
                }

                let frame_start = Instant::now();
                let frame_ms = frame_start.duration_since(last_frame).as_secs_f64() * 1000.0;
                last_frame = frame_start;
                let now = started.elapsed().as_secs_f64();

                let raw = RawInputState::capture(keys.as_ref(), &gamepad, frame_ms);
                session.tick(&raw, now);

                if now - last_report >= 1.0 {
                    last_report = now;
                    let snapshot = session.snapshot(now);
                    info!("{}", snapshot.status_line());
                    for notification in &snapshot.notifications {
                        info!("> {}", notification);
                    }
                    debug!("{:?}", snapshot.control);
                }
            }
        }
    }

    if let Some(keyboard) = keyboard {
        keyboard.shutdown();
    }
    controller.shutdown();
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(|| RawModeWriter(std::io::stdout()))
        .init();
}

async fn load_settings() -> SessionSettings {
    let path = default_config_path();

    if let Err(e) = TomlSettings::ensure_file(&path, &SessionSettings::default_table()).await {
        warn!("Could not write default settings: {}", e);
    }

    let provider = TomlSettings::load_or_default(&path).await;

    SessionSettings::from_provider(&provider)
}

// Commands typed on stdin, one per line
async fn read_console_commands(sender: mpsc::Sender<Command>) {
    let names: Vec<&str> = Command::ALL.iter().map(Command::name).collect();
    info!("Console commands: {}", names.join(", "));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match Command::from_name(&line) {
                Some(command) => {
                    if sender.send(command).await.is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command: {}", line.trim()),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Console input failed: {}", e);
                break;
            }
        }
    }
    debug!("Console reader finished");
}
