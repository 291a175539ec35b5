//! # Touch Controller Library
//!
//! Virtual touchscreen and motion-sensor game controller.
//!
//! This library turns raw touch contacts and accelerometer/gyroscope samples
//! into gameplay actions (steering, throttle, fire, nitro, ...) for players
//! without a physical gamepad.

pub mod config;
pub mod controller;
pub mod error;
pub mod platform;
pub mod sensor;
pub mod telemetry;
pub mod touch;
