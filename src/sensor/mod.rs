//! # Sensor Module
//!
//! Motion sensor processing for tilt steering.
//!
//! This module handles:
//! - Online gyroscope noise calibration (no factory data needed)
//! - Fusing accelerometer tilt and gyroscope rate into one orientation
//! - Gating samples from sensors that are switched off

pub mod noise;
pub mod orientation;

pub use noise::{CalibrationState, GyroNoiseFilter};
pub use orientation::OrientationEstimator;
