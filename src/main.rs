//! # Touch Controller
//!
//! Virtual touchscreen and motion-sensor game controller.
//!
//! Reads touches from a Linux touchscreen (or a recorded session), maps them
//! onto the configured on-screen buttons and reports the resulting player
//! actions.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use touch_controller::config::Config;
use touch_controller::controller::{ActionSink, MultitouchDevice};
use touch_controller::platform::{replay, touchscreen, Touchscreen};
use touch_controller::telemetry::{ActionLogger, TracingSink};
use touch_controller::touch::input_feed;

/// Configuration file used when none is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of frames between status log messages
const STATUS_INTERVAL_FRAMES: u64 = 600;

/// Command line arguments
#[derive(Debug, PartialEq)]
struct Args {
    config_path: PathBuf,
    replay_path: Option<PathBuf>,
}

/// Parses `[CONFIG] [--replay FILE]`.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut config_path = None;
    let mut replay_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--replay" => match args.next() {
                Some(path) => replay_path = Some(PathBuf::from(path)),
                None => bail!("--replay requires a file argument"),
            },
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            path => {
                if config_path.is_some() {
                    bail!("unexpected argument {}", path);
                }
                config_path = Some(PathBuf::from(path));
            }
        }
    }

    Ok(Args {
        config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        replay_path,
    })
}

/// Frame period for a tick rate.
fn frame_period(tick_rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tick_rate_hz.max(1)))
}

/// Initializes stdout logging, plus a daily rolling file when configured.
///
/// The returned guard must live until exit so buffered file output is flushed.
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if config.logging.dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.logging.dir, "touch-controller.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Builds the action sink: JSONL telemetry when enabled, log output otherwise.
fn build_sink(config: &Config) -> Result<Box<dyn ActionSink>> {
    if config.telemetry.enabled {
        let logger = ActionLogger::new(&config.telemetry)
            .context("Failed to initialize action telemetry")?;
        Ok(Box::new(logger))
    } else {
        Ok(Box::new(TracingSink))
    }
}

/// Applies layout, steering and sensor settings to the device.
fn apply_config(device: &mut MultitouchDevice, config: &Config) -> Result<()> {
    device.update_config_params(&config.steering);
    device.apply_layout(&config.layout)?;

    if config.sensors.accelerometer {
        device.activate_accelerometer();
    } else {
        device.deactivate_accelerometer();
    }
    if config.sensors.gyroscope {
        device.activate_gyroscope();
    } else {
        device.deactivate_gyroscope();
    }
    Ok(())
}

/// Main entry point for the touch controller
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Build the button layout and enable the configured sensors
///    - Start the touchscreen reader thread or the replay task
///
/// 2. **Main Loop** (at `tick_rate_hz`)
///    - Drain the input feed into the device
///    - Reconcile touches with buttons
///    - Emit changed actions
///    - Reload configuration on SIGHUP
///
/// 3. **Graceful Shutdown**
///    - On Ctrl+C, or once the input source has ended
///    - Release every held action before exiting
///
/// # Examples
///
/// ```bash
/// touch-controller config/default.toml
/// touch-controller config/default.toml --replay session.jsonl
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let mut config = Config::load(&args.config_path)
        .with_context(|| format!("Failed to load {}", args.config_path.display()))?;

    let _log_guard = init_logging(&config);

    info!("Touch Controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut device = MultitouchDevice::with_config(&config.steering);
    apply_config(&mut device, &config)?;
    device.set_controller(Some(build_sink(&config)?));

    let (sender, mut receiver) = input_feed(config.touch.feed_capacity);

    match &args.replay_path {
        Some(path) => {
            let records = replay::load(path).await?;
            replay::spawn(records, sender);
            info!("Replaying {}", path.display());
        }
        None => {
            let touchscreen = if config.touch.device_path.is_empty() {
                Touchscreen::open()?
            } else {
                Touchscreen::open_path(&config.touch.device_path)?
            };
            info!("Touchscreen opened at: {}", touchscreen.device_path());
            touchscreen::spawn_reader(touchscreen, sender)?;
        }
    }

    let mut frame = interval(frame_period(config.frame.tick_rate_hz));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut hangup = signal(SignalKind::hangup())?;

    info!(
        "Running at {}Hz with {} buttons",
        config.frame.tick_rate_hz,
        device.buttons_count()
    );
    info!("Press Ctrl+C to exit");

    let mut frame_count: u64 = 0;

    loop {
        tokio::select! {
            _ = frame.tick() => {
                receiver.pump(&mut device);
                device.dispatch();
                device.update_controller();
                frame_count += 1;

                if frame_count % STATUS_INTERVAL_FRAMES == 0 {
                    debug!(
                        "Frame {}: {} active touches, orientation {:.3} rad",
                        frame_count,
                        device.active_touches_count(),
                        device.orientation()
                    );
                }

                if receiver.is_closed() {
                    info!("Input source ended");
                    break;
                }
            }

            _ = hangup.recv() => {
                match Config::load(&args.config_path) {
                    Ok(new_config) => {
                        apply_config(&mut device, &new_config)?;
                        if new_config.frame.tick_rate_hz != config.frame.tick_rate_hz {
                            frame = interval(frame_period(new_config.frame.tick_rate_hz));
                            frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        }
                        config = new_config;
                        info!("Configuration reloaded");
                    }
                    Err(e) => warn!("Keeping current configuration, reload failed: {}", e),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    device.reset();
    info!("Total frames: {}", frame_count);

    Ok(())
}
