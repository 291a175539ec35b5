//! # Player Actions
//!
//! Resolved gameplay actions and the sink they are emitted to.
//!
//! The device decides *when* an action changes; what the action does in the
//! game is up to the [`ActionSink`] receiving it.

use serde::{Deserialize, Serialize};

/// Gameplay action bound to a virtual button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    /// Analog steering, negative = left, positive = right.
    Steering,
    /// Analog throttle, negative = brake, positive = accelerate.
    UpDown,
    Fire,
    Nitro,
    Skidding,
    LookBackwards,
    Rescue,
    Escape,
    Up,
    Down,
    Left,
    Right,
}

impl PlayerAction {
    /// Returns `true` for actions carrying an analog magnitude.
    #[must_use]
    pub fn is_analog(&self) -> bool {
        matches!(self, PlayerAction::Steering | PlayerAction::UpDown)
    }
}

/// Payload of an emitted action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ActionValue {
    /// Press (`true`) or release (`false`) edge.
    Digital(bool),
    /// Signed magnitude in -1.0..=1.0.
    Analog(f32),
}

/// Receiver of resolved actions, typically the game-side controller.
#[cfg_attr(test, mockall::automock)]
pub trait ActionSink: Send {
    /// Delivers one action change.
    fn action(&mut self, action: PlayerAction, value: ActionValue);
}
