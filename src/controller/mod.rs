//! # Controller Module
//!
//! Virtual on-screen controller built from touch contacts and motion sensors.
//!
//! This module handles:
//! - Registering on-screen buttons and binding touches to them
//! - Shaping joystick offsets with center and edge deadzones
//! - Tilt steering from the fused device orientation
//! - Emitting press/release edges and analog axes to an [`ActionSink`]

pub mod action;
pub mod button;
pub mod device;
pub mod steering;

pub use action::{ActionSink, ActionValue, PlayerAction};
pub use button::{ButtonRegistry, ButtonType, VirtualButton};
pub use device::MultitouchDevice;
pub use steering::SteeringShaper;
