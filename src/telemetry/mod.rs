//! # Telemetry Module
//!
//! Handles action telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - Recording every emitted action with a timestamp
//! - Formatting as JSONL (JSON Lines)
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files

pub mod logger;

pub use logger::{ActionLogger, ActionRecord};

use tracing::info;

use crate::controller::action::{ActionSink, ActionValue, PlayerAction};

/// Sink that reports actions through `tracing` only.
///
/// Used by the binary when file telemetry is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn action(&mut self, action: PlayerAction, value: ActionValue) {
        match value {
            ActionValue::Digital(pressed) => info!("{:?} {}", action, if pressed { "pressed" } else { "released" }),
            ActionValue::Analog(amount) => info!("{:?} {:+.3}", action, amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_accepts_actions() {
        let mut sink = TracingSink;
        sink.action(PlayerAction::Fire, ActionValue::Digital(true));
        sink.action(PlayerAction::Steering, ActionValue::Analog(0.25));
    }
}
