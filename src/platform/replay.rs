//! # Replay Module
//!
//! Plays back a recorded session of platform events.
//!
//! ## Recording Format
//!
//! JSON Lines, one event per line, `t_ms` counted from the start of the
//! recording. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! # steer right, then tap nitro
//! {"t_ms":0,"event":"touch_down","id":1,"x":150,"y":550}
//! {"t_ms":40,"event":"touch_move","id":1,"x":260,"y":550}
//! {"t_ms":55,"event":"gyroscope","z":0.012}
//! {"t_ms":60,"event":"accelerometer","x":9.7,"y":0.8}
//! {"t_ms":300,"event":"touch_up","id":1}
//! ```
//!
//! Gyroscope samples get their timestamp from `t_ms`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::error::{Result, TouchControllerError};
use crate::touch::{FeedSender, PlatformEvent};

/// Event payload of one recording line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    TouchDown { id: i32, x: i32, y: i32 },
    TouchMove { id: i32, x: i32, y: i32 },
    TouchUp { id: i32 },
    Accelerometer { x: f32, y: f32 },
    Gyroscope { z: f32 },
}

/// One recording line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Milliseconds since the start of the recording.
    pub t_ms: u64,
    #[serde(flatten)]
    pub event: RecordedEvent,
}

impl ReplayRecord {
    #[must_use]
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.t_ms)
    }

    /// Converts the line into the event delivered to the device.
    #[must_use]
    pub fn to_platform_event(&self) -> PlatformEvent {
        match self.event {
            RecordedEvent::TouchDown { id, x, y } => PlatformEvent::TouchDown { id, x, y },
            RecordedEvent::TouchMove { id, x, y } => PlatformEvent::TouchMove { id, x, y },
            RecordedEvent::TouchUp { id } => PlatformEvent::TouchUp { id },
            RecordedEvent::Accelerometer { x, y } => PlatformEvent::Accelerometer { x, y },
            RecordedEvent::Gyroscope { z } => PlatformEvent::Gyroscope {
                z,
                timestamp: self.offset(),
            },
        }
    }
}

/// Parses a recording.
///
/// # Errors
///
/// Returns `Replay` with the 1-based line number of the first malformed line.
///
/// # Examples
///
/// ```
/// use touch_controller::platform::replay::parse_recording;
///
/// let records = parse_recording(r#"{"t_ms":0,"event":"touch_up","id":3}"#)?;
/// assert_eq!(records.len(), 1);
/// # Ok::<(), touch_controller::error::TouchControllerError>(())
/// ```
pub fn parse_recording(text: &str) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record = serde_json::from_str(line).map_err(|source| TouchControllerError::Replay {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Loads and parses a recording file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or `Replay` for a
/// malformed line.
pub async fn load<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayRecord>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await?;
    let records = parse_recording(&text)?;
    info!("Loaded {} replay events from {}", records.len(), path.display());
    Ok(records)
}

/// Sends the records into the feed at their recorded pace.
///
/// Returns the number of events delivered.
///
/// # Errors
///
/// Returns `FeedClosed` if the receiver goes away mid-replay.
pub async fn play(records: Vec<ReplayRecord>, sender: FeedSender) -> Result<usize> {
    let start = Instant::now();
    let mut delivered = 0;

    for record in records {
        sleep_until(start + record.offset()).await;
        sender.send(record.to_platform_event()).await?;
        delivered += 1;
    }

    debug!("Replay finished after {} events", delivered);
    Ok(delivered)
}

/// Runs [`play`] on a tokio task.
pub fn spawn(records: Vec<ReplayRecord>, sender: FeedSender) -> JoinHandle<Result<usize>> {
    tokio::spawn(play(records, sender))
}
