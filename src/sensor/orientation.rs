//! # Orientation Estimator
//!
//! Fuses accelerometer tilt and gyroscope rate into one orientation angle.
//!
//! The angle is the device's rotation around the screen normal, in radians,
//! where 0.0 is the neutral landscape pose and ±π/2 is the limit.
//!
//! - The **accelerometer** gives an absolute, drift-free but jittery tilt
//!   from the gravity vector. It is blended in slowly
//!   ([`ACCEL_WEIGHT`] per sample, at most [`ACCEL_MAX_STEP`] rad).
//! - The **gyroscope** gives a smooth but drift-prone angular rate. Rates are
//!   passed through a [`GyroNoiseFilter`] and integrated over the time since
//!   the previous sample.
//!
//! Each source can be switched off independently; samples delivered to a
//! switched-off source are dropped without touching any state.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use tracing::{info, trace};

use super::noise::GyroNoiseFilter;

/// Minimum in-plane gravity magnitude for a usable tilt reading (m/s²).
pub const ACCEL_DISCARD_THRESHOLD: f32 = 4.0;

/// Fraction of the tilt error corrected per accelerometer sample.
pub const ACCEL_WEIGHT: f32 = 0.05;

/// Largest correction applied by a single accelerometer sample (rad).
pub const ACCEL_MAX_STEP: f32 = 0.01;

/// Gaps between gyroscope samples longer than this are not integrated.
pub const GYRO_MAX_GAP: Duration = Duration::from_millis(500);

/// Orientation limit in either direction (rad).
pub const ORIENTATION_LIMIT: f32 = FRAC_PI_2;

/// Complementary accelerometer/gyroscope orientation filter.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use touch_controller::sensor::orientation::OrientationEstimator;
///
/// let mut estimator = OrientationEstimator::new();
/// estimator.activate_gyroscope();
///
/// estimator.update_from_gyroscope(0.0, Duration::from_millis(0));
/// estimator.update_from_gyroscope(1.0, Duration::from_millis(100));
///
/// assert!((estimator.orientation() - 0.1).abs() < 0.001);
/// ```
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    orientation: f32,
    last_gyro_timestamp: Option<Duration>,
    accelerometer_active: bool,
    gyroscope_active: bool,
    gyro_filter: GyroNoiseFilter,
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationEstimator {
    /// Creates an estimator at neutral orientation with both sensors off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orientation: 0.0,
            last_gyro_timestamp: None,
            accelerometer_active: false,
            gyroscope_active: false,
            gyro_filter: GyroNoiseFilter::new(),
        }
    }

    /// Current fused orientation in radians.
    #[must_use]
    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    /// Timestamp of the last integrated gyroscope sample.
    #[must_use]
    pub fn last_gyro_timestamp(&self) -> Option<Duration> {
        self.last_gyro_timestamp
    }

    /// Noise filter applied to the gyroscope rate.
    #[must_use]
    pub fn gyro_filter(&self) -> &GyroNoiseFilter {
        &self.gyro_filter
    }

    pub fn activate_accelerometer(&mut self) {
        if !self.accelerometer_active {
            info!("Accelerometer activated");
        }
        self.accelerometer_active = true;
    }

    pub fn deactivate_accelerometer(&mut self) {
        if self.accelerometer_active {
            info!("Accelerometer deactivated");
        }
        self.accelerometer_active = false;
    }

    #[must_use]
    pub fn is_accelerometer_active(&self) -> bool {
        self.accelerometer_active
    }

    pub fn activate_gyroscope(&mut self) {
        if !self.gyroscope_active {
            info!("Gyroscope activated");
        }
        self.gyroscope_active = true;
    }

    /// Switches the gyroscope off.
    ///
    /// The integration timestamp is forgotten so that re-activation does not
    /// integrate over the time the sensor was off.
    pub fn deactivate_gyroscope(&mut self) {
        if self.gyroscope_active {
            info!("Gyroscope deactivated");
        }
        self.gyroscope_active = false;
        self.last_gyro_timestamp = None;
    }

    #[must_use]
    pub fn is_gyroscope_active(&self) -> bool {
        self.gyroscope_active
    }

    /// Blends an accelerometer tilt reading into the orientation.
    ///
    /// # Arguments
    ///
    /// * `x` - Gravity component along the screen's horizontal axis (m/s²).
    ///   In the neutral landscape pose gravity points along +x.
    /// * `y` - Gravity component along the screen's vertical axis (m/s²)
    pub fn update_from_accelerometer(&mut self, x: f32, y: f32) {
        if !self.accelerometer_active {
            return;
        }

        if !x.is_finite() || !y.is_finite() || x.hypot(y) < ACCEL_DISCARD_THRESHOLD {
            // Device lying flat, gravity is out of the screen plane
            trace!("Discarding accelerometer sample ({:.3}, {:.3})", x, y);
            return;
        }

        let angle = y.atan2(x).clamp(-ORIENTATION_LIMIT, ORIENTATION_LIMIT);
        let delta = ((angle - self.orientation) * ACCEL_WEIGHT).clamp(-ACCEL_MAX_STEP, ACCEL_MAX_STEP);
        self.orientation = (self.orientation + delta).clamp(-ORIENTATION_LIMIT, ORIENTATION_LIMIT);
    }

    /// Integrates a gyroscope rate sample into the orientation.
    ///
    /// # Arguments
    ///
    /// * `z` - Raw angular rate around the screen normal (rad/s)
    /// * `timestamp` - Monotonic sample time
    pub fn update_from_gyroscope(&mut self, z: f32, timestamp: Duration) {
        if !self.gyroscope_active || !z.is_finite() {
            return;
        }

        let rate = self.gyro_filter.process(z);

        let previous = self.last_gyro_timestamp.replace(timestamp);
        let elapsed = match previous.and_then(|prev| timestamp.checked_sub(prev)) {
            Some(elapsed) if elapsed <= GYRO_MAX_GAP => elapsed,
            _ => return,
        };

        self.orientation = (self.orientation + rate * elapsed.as_secs_f32())
            .clamp(-ORIENTATION_LIMIT, ORIENTATION_LIMIT);
    }

    /// Returns to neutral orientation and restarts gyroscope calibration.
    ///
    /// Sensor activation is left unchanged.
    pub fn reset(&mut self) {
        self.orientation = 0.0;
        self.last_gyro_timestamp = None;
        self.gyro_filter = GyroNoiseFilter::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::noise::NOISE_DATA_SIZE;

    const GRAVITY: f32 = 9.81;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn active() -> OrientationEstimator {
        let mut estimator = OrientationEstimator::new();
        estimator.activate_accelerometer();
        estimator.activate_gyroscope();
        estimator
    }

    // ==================== Activation Tests ====================

    #[test]
    fn test_sensors_start_inactive() {
        let estimator = OrientationEstimator::new();
        assert!(!estimator.is_accelerometer_active());
        assert!(!estimator.is_gyroscope_active());
        assert_eq!(estimator.orientation(), 0.0);
    }

    #[test]
    fn test_activation_toggles() {
        let mut estimator = OrientationEstimator::new();
        estimator.activate_accelerometer();
        estimator.activate_gyroscope();
        assert!(estimator.is_accelerometer_active());
        assert!(estimator.is_gyroscope_active());

        estimator.deactivate_accelerometer();
        estimator.deactivate_gyroscope();
        assert!(!estimator.is_accelerometer_active());
        assert!(!estimator.is_gyroscope_active());
    }

    #[test]
    fn test_inactive_accelerometer_is_ignored() {
        let mut estimator = OrientationEstimator::new();
        for _ in 0..100 {
            estimator.update_from_accelerometer(GRAVITY * 0.5, GRAVITY * 0.8);
        }
        assert_eq!(estimator.orientation(), 0.0);
    }

    #[test]
    fn test_inactive_gyroscope_has_no_side_effects() {
        let mut estimator = OrientationEstimator::new();
        estimator.update_from_gyroscope(2.0, ms(0));
        estimator.update_from_gyroscope(2.0, ms(100));

        assert_eq!(estimator.orientation(), 0.0);
        assert_eq!(estimator.last_gyro_timestamp(), None);
        assert_eq!(estimator.gyro_filter().buffered(), 0);
        assert_eq!(estimator.gyro_filter().movement_backoff(), 0);
    }

    #[test]
    fn test_deactivated_gyroscope_after_use() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(0));
        estimator.update_from_gyroscope(1.0, ms(100));
        let before = estimator.orientation();

        estimator.deactivate_gyroscope();
        estimator.update_from_gyroscope(1.0, ms(200));
        estimator.update_from_gyroscope(1.0, ms(300));
        assert_eq!(estimator.orientation(), before);
    }

    // ==================== Accelerometer Tests ====================

    #[test]
    fn test_accelerometer_neutral_pose() {
        let mut estimator = active();
        for _ in 0..100 {
            estimator.update_from_accelerometer(GRAVITY, 0.0);
        }
        assert!(estimator.orientation().abs() < 1e-6);
    }

    #[test]
    fn test_accelerometer_converges_slowly_to_tilt() {
        let mut estimator = active();
        let tilt: f32 = 0.4;
        let (x, y) = (GRAVITY * tilt.cos(), GRAVITY * tilt.sin());

        estimator.update_from_accelerometer(x, y);
        assert!((estimator.orientation() - ACCEL_MAX_STEP).abs() < 1e-6);

        for _ in 0..1_000 {
            estimator.update_from_accelerometer(x, y);
        }
        assert!((estimator.orientation() - tilt).abs() < 0.001);
    }

    #[test]
    fn test_accelerometer_small_error_uses_weight() {
        let mut estimator = active();
        let tilt: f32 = 0.1;
        estimator.update_from_accelerometer(GRAVITY * tilt.cos(), GRAVITY * tilt.sin());
        assert!((estimator.orientation() - tilt * ACCEL_WEIGHT).abs() < 1e-6);
    }

    #[test]
    fn test_accelerometer_flat_device_discarded() {
        let mut estimator = active();
        estimator.update_from_accelerometer(1.0, 2.0);
        assert_eq!(estimator.orientation(), 0.0);
    }

    #[test]
    fn test_accelerometer_clamps_to_limit() {
        let mut estimator = active();
        for _ in 0..10_000 {
            estimator.update_from_accelerometer(-GRAVITY, 0.1);
        }
        assert!(estimator.orientation() <= ORIENTATION_LIMIT);
        assert!((estimator.orientation() - ORIENTATION_LIMIT).abs() < 0.01);
    }

    // ==================== Gyroscope Tests ====================

    #[test]
    fn test_first_gyro_sample_only_records_timestamp() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(50));
        assert_eq!(estimator.orientation(), 0.0);
        assert_eq!(estimator.last_gyro_timestamp(), Some(ms(50)));
    }

    #[test]
    fn test_gyro_integrates_rate() {
        let mut estimator = active();
        estimator.update_from_gyroscope(0.5, ms(0));
        for i in 1..=10 {
            estimator.update_from_gyroscope(0.5, ms(i * 20));
        }
        // 0.5 rad/s for 200 ms
        assert!((estimator.orientation() - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_gyro_rate_inside_band_ignored() {
        let mut estimator = active();
        for i in 0..100 {
            estimator.update_from_gyroscope(0.03, ms(i * 10));
        }
        assert_eq!(estimator.orientation(), 0.0);
    }

    #[test]
    fn test_gyro_long_gap_not_integrated() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(0));
        estimator.update_from_gyroscope(1.0, ms(2_000));
        assert_eq!(estimator.orientation(), 0.0);

        // Integration resumes from the new timestamp
        estimator.update_from_gyroscope(1.0, ms(2_100));
        assert!((estimator.orientation() - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_gyro_timestamp_going_backwards() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(500));
        estimator.update_from_gyroscope(1.0, ms(400));
        assert_eq!(estimator.orientation(), 0.0);
    }

    #[test]
    fn test_held_still_gyro_does_not_drift() {
        let mut estimator = OrientationEstimator::new();
        estimator.activate_gyroscope();

        let bias = 0.012;
        let mut t = 0;
        // Calibrate with a small alternating jitter around the bias
        for i in 0..(NOISE_DATA_SIZE * 20) {
            let jitter = if i % 3 == 0 { 0.002 } else { -0.001 };
            estimator.update_from_gyroscope(bias + jitter, ms(t));
            t += 10;
        }
        assert!(estimator.gyro_filter().is_converged());
        let settled = estimator.orientation();

        // Ten minutes at 100 Hz
        for i in 0..60_000 {
            let jitter = if i % 3 == 0 { 0.002 } else { -0.001 };
            estimator.update_from_gyroscope(bias + jitter, ms(t));
            t += 10;
        }
        assert_eq!(estimator.orientation(), settled);
    }

    // ==================== Fusion Tests ====================

    #[test]
    fn test_accelerometer_corrects_gyro_drift() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(0));
        estimator.update_from_gyroscope(1.0, ms(300));
        assert!((estimator.orientation() - 0.3).abs() < 0.001);

        for _ in 0..2_000 {
            estimator.update_from_accelerometer(GRAVITY, 0.0);
        }
        assert!(estimator.orientation().abs() < 0.001);
    }

    #[test]
    fn test_reset_restores_neutral() {
        let mut estimator = active();
        estimator.update_from_gyroscope(1.0, ms(0));
        estimator.update_from_gyroscope(1.0, ms(300));

        estimator.reset();
        assert_eq!(estimator.orientation(), 0.0);
        assert_eq!(estimator.last_gyro_timestamp(), None);
        assert_eq!(estimator.gyro_filter().iteration(), 0);
        assert!(estimator.is_gyroscope_active());
    }
}
