//! # Input Feed
//!
//! Bounded hand-off of platform events from the input thread to the frame
//! loop.
//!
//! The touchscreen reader (or a replay task) owns a [`FeedSender`]. Touch
//! down and up edges always reach the queue; moves and sensor samples are
//! dropped while it is full. The frame loop owns
//! the [`FeedReceiver`] and drains it once per tick with
//! [`FeedReceiver::pump`], so every tick works on a consistent snapshot.
//!
//! ## Usage
//!
//! ```
//! use touch_controller::controller::MultitouchDevice;
//! use touch_controller::touch::feed::{input_feed, PlatformEvent};
//!
//! let (sender, mut receiver) = input_feed(64);
//! let mut device = MultitouchDevice::new();
//!
//! sender.push(PlatformEvent::TouchDown { id: 0, x: 10, y: 10 })?;
//! assert_eq!(receiver.pump(&mut device), 1);
//! assert_eq!(device.active_touches_count(), 1);
//! # Ok::<(), touch_controller::error::TouchControllerError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{trace, warn};

use crate::controller::MultitouchDevice;
use crate::error::{Result, TouchControllerError};

/// Raw event delivered by a platform input source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    TouchDown { id: i32, x: i32, y: i32 },
    TouchMove { id: i32, x: i32, y: i32 },
    TouchUp { id: i32 },
    /// Gravity components in the screen plane (m/s²).
    Accelerometer { x: f32, y: f32 },
    /// Angular rate around the screen normal (rad/s) with its sample time.
    Gyroscope { z: f32, timestamp: Duration },
}

/// Creates a bounded feed holding at most `capacity` pending events.
///
/// # Panics
///
/// Panics if `capacity` is 0 (rejected earlier by config validation).
#[must_use]
pub fn input_feed(capacity: usize) -> (FeedSender, FeedReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        FeedSender { tx },
        FeedReceiver {
            rx,
            capacity,
            closed: false,
        },
    )
}

/// Producer side of the feed, cheap to clone across input threads.
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<PlatformEvent>,
}

impl FeedSender {
    /// Queues an event without blocking.
    ///
    /// # Errors
    ///
    /// - `FeedFull` if the queue is full; the event is dropped
    /// - `FeedClosed` if the receiver is gone
    pub fn push(&self, event: PlatformEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                warn!("Input feed full, dropping {:?}", event);
                Err(TouchControllerError::FeedFull)
            }
            Err(TrySendError::Closed(_)) => Err(TouchControllerError::FeedClosed),
        }
    }

    /// Queues an event from a plain thread.
    ///
    /// Touch down and up wait for room so a contact is never left bound to a
    /// button. Everything else is pushed and dropped when the queue is full.
    ///
    /// Must not be called from inside the async runtime.
    ///
    /// # Errors
    ///
    /// - `FeedFull` if a move or sensor sample was dropped
    /// - `FeedClosed` if the receiver is gone
    pub fn deliver(&self, event: PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::TouchDown { .. } | PlatformEvent::TouchUp { .. } => self
                .tx
                .blocking_send(event)
                .map_err(|_| TouchControllerError::FeedClosed),
            _ => self.push(event),
        }
    }

    /// Queues an event, waiting for room.
    ///
    /// Used by sources that can afford to wait, such as replay.
    ///
    /// # Errors
    ///
    /// Returns `FeedClosed` if the receiver is gone.
    pub async fn send(&self, event: PlatformEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TouchControllerError::FeedClosed)
    }
}

/// Consumer side of the feed, owned by the frame loop.
#[derive(Debug)]
pub struct FeedReceiver {
    rx: mpsc::Receiver<PlatformEvent>,
    capacity: usize,
    closed: bool,
}

impl FeedReceiver {
    /// Applies queued events to the device.
    ///
    /// At most one queue's worth of events is taken per call so a flooding
    /// source cannot stall the frame. Returns the number of events applied.
    pub fn pump(&mut self, device: &mut MultitouchDevice) -> usize {
        let mut applied = 0;
        while applied < self.capacity {
            match self.rx.try_recv() {
                Ok(event) => {
                    device.handle_event(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        trace!("All input feed senders dropped");
                    }
                    self.closed = true;
                    break;
                }
            }
        }
        applied
    }

    /// Returns `true` once every sender is gone and the queue is drained.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::button::ButtonType;

    // ==================== Sender Tests ====================

    #[test]
    fn test_push_reports_full_feed() {
        let (sender, _receiver) = input_feed(2);
        let event = PlatformEvent::TouchUp { id: 0 };

        assert!(sender.push(event).is_ok());
        assert!(sender.push(event).is_ok());
        assert!(matches!(sender.push(event), Err(TouchControllerError::FeedFull)));
    }

    #[test]
    fn test_push_reports_closed_feed() {
        let (sender, receiver) = input_feed(2);
        drop(receiver);
        assert!(matches!(
            sender.push(PlatformEvent::TouchUp { id: 0 }),
            Err(TouchControllerError::FeedClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_waits_and_delivers() {
        let (sender, mut receiver) = input_feed(4);
        let mut device = MultitouchDevice::new();

        sender
            .send(PlatformEvent::TouchDown { id: 3, x: 1, y: 1 })
            .await
            .unwrap();
        assert_eq!(receiver.pump(&mut device), 1);
        assert_eq!(device.active_touches_count(), 1);
    }

    #[test]
    fn test_sender_from_other_thread() {
        let (sender, mut receiver) = input_feed(16);
        let mut device = MultitouchDevice::new();

        let handle = std::thread::spawn(move || {
            for id in 0..4 {
                sender.push(PlatformEvent::TouchDown { id, x: 0, y: 0 }).unwrap();
            }
        });
        handle.join().unwrap();

        assert_eq!(receiver.pump(&mut device), 4);
        assert_eq!(device.active_touches_count(), 4);
    }

    #[test]
    fn test_deliver_drops_moves_when_full() {
        let (sender, _receiver) = input_feed(1);

        sender.deliver(PlatformEvent::TouchDown { id: 1, x: 0, y: 0 }).unwrap();
        assert!(matches!(
            sender.deliver(PlatformEvent::TouchMove { id: 1, x: 5, y: 5 }),
            Err(TouchControllerError::FeedFull)
        ));
        assert!(matches!(
            sender.deliver(PlatformEvent::Accelerometer { x: 9.8, y: 0.0 }),
            Err(TouchControllerError::FeedFull)
        ));
    }

    #[test]
    fn test_deliver_waits_for_touch_up_on_full_feed() {
        let (sender, mut receiver) = input_feed(1);
        let mut device = MultitouchDevice::new();
        device.add_button(ButtonType::Nitro, 0, 0, 100, 100).unwrap();

        sender.deliver(PlatformEvent::TouchDown { id: 1, x: 50, y: 50 }).unwrap();
        let lift = std::thread::spawn(move || sender.deliver(PlatformEvent::TouchUp { id: 1 }));

        assert_eq!(receiver.pump(&mut device), 1);
        device.dispatch();
        assert!(device.button(0).is_pressed());

        lift.join().unwrap().unwrap();
        assert_eq!(receiver.pump(&mut device), 1);
        device.dispatch();
        assert_eq!(device.active_touches_count(), 0);
        assert!(!device.button(0).is_pressed());
    }

    #[test]
    fn test_deliver_reports_closed_feed() {
        let (sender, receiver) = input_feed(1);
        drop(receiver);
        assert!(matches!(
            sender.deliver(PlatformEvent::TouchUp { id: 0 }),
            Err(TouchControllerError::FeedClosed)
        ));
    }

    // ==================== Receiver Tests ====================

    #[test]
    fn test_pump_is_bounded_by_capacity() {
        let (sender, mut receiver) = input_feed(3);
        let mut device = MultitouchDevice::new();

        for id in 0..3 {
            sender.push(PlatformEvent::TouchDown { id, x: 0, y: 0 }).unwrap();
        }
        assert_eq!(receiver.pump(&mut device), 3);
        assert_eq!(receiver.pump(&mut device), 0);
    }

    #[test]
    fn test_pump_marks_closed_after_drain() {
        let (sender, mut receiver) = input_feed(4);
        let mut device = MultitouchDevice::new();

        sender.push(PlatformEvent::TouchUp { id: 0 }).unwrap();
        drop(sender);

        assert_eq!(receiver.pump(&mut device), 1);
        assert!(!receiver.is_closed());
        assert_eq!(receiver.pump(&mut device), 0);
        assert!(receiver.is_closed());
    }

    #[test]
    fn test_tap_within_one_pump_is_seen_by_button() {
        let (sender, mut receiver) = input_feed(8);
        let mut device = MultitouchDevice::new();
        device.add_button(ButtonType::Fire, 0, 0, 100, 100).unwrap();

        sender.push(PlatformEvent::TouchDown { id: 1, x: 50, y: 50 }).unwrap();
        sender.push(PlatformEvent::TouchUp { id: 1 }).unwrap();
        receiver.pump(&mut device);

        let button = device.button(0);
        assert!(!button.is_pressed());
        assert!(button.press_latched);
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&PlatformEvent::TouchMove { id: 2, x: 5, y: 6 }).unwrap();
        assert_eq!(json, r#"{"event":"touch_move","id":2,"x":5,"y":6}"#);

        let parsed: PlatformEvent =
            serde_json::from_str(r#"{"event":"accelerometer","x":9.8,"y":0.0}"#).unwrap();
        assert_eq!(parsed, PlatformEvent::Accelerometer { x: 9.8, y: 0.0 });
    }
}
