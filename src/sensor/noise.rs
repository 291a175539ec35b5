//! # Gyroscope Noise Filter
//!
//! Learns the noise band of one gyroscope axis at runtime.
//!
//! A gyroscope at rest still reports a small, device-specific rate. There is
//! no factory calibration to read, so the band of values that are "only
//! noise" is measured online while the device is in use:
//!
//! 1. Incoming samples are compared against the noise band of the previous
//!    iteration. A sample outside the band is movement, not noise: the last
//!    few buffered samples are dropped (they were recorded during the onset
//!    of the motion) and a backoff window skips the samples that follow.
//! 2. Other samples fill a buffer of [`NOISE_DATA_SIZE`] values.
//! 3. Each full buffer is one iteration. The band shrinks to the buffer's
//!    extent plus a margin, never beyond the previous band.
//! 4. Once the band's width stops changing, or after [`MAX_ITERATIONS`], the
//!    band is frozen as the operative filter.
//!
//! Until convergence a sane default band (±0.05 rad/s), later the latest
//! measured band, is used as a best-effort filter, so the device can be
//! moved from the very first sample.

use tracing::{debug, info, trace};

/// Number of samples per measurement iteration.
pub const NOISE_DATA_SIZE: usize = 200;

/// Iteration bound after which the band is frozen regardless of convergence.
pub const MAX_ITERATIONS: u32 = 15;

/// Filter band used before the first iteration completes (rad/s).
pub const INITIAL_FILTER_LIMIT: f32 = 0.05;

/// Noise band before anything has been measured (rad/s).
pub const INITIAL_NOISE_LIMIT: f32 = 1.0;

/// Buffered samples dropped when movement is detected.
pub const MOVEMENT_DISCARD: usize = 10;

/// Samples skipped after each movement detection.
pub const MOVEMENT_BACKOFF_STEP: u32 = 20;

/// Upper bound for the accumulated backoff.
pub const MOVEMENT_BACKOFF_MAX: u32 = 200;

/// Margin added to each side of the measured extent, as a fraction of it.
pub const NOISE_MARGIN: f32 = 0.25;

/// Relative range change below which the band counts as converged.
pub const CONVERGENCE_RATIO: f32 = 0.05;

/// Calibration phase of a [`GyroNoiseFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// Still collecting noise data.
    Measuring,
    /// Band frozen; the filter no longer changes.
    Converged,
}

/// Per-axis noise model and filter.
///
/// # Examples
///
/// ```
/// use touch_controller::sensor::noise::{GyroNoiseFilter, CalibrationState};
///
/// let mut filter = GyroNoiseFilter::new();
/// assert_eq!(filter.state(), CalibrationState::Measuring);
///
/// // Rates inside the default band count as no rotation
/// assert_eq!(filter.filter(0.01), 0.0);
/// assert_eq!(filter.filter(0.5), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct GyroNoiseFilter {
    filter_min: f32,
    filter_max: f32,
    filter_center: f32,

    noise_min: f32,
    noise_max: f32,

    noise_data: [f32; NOISE_DATA_SIZE],
    noise_data_idx: usize,

    movement_backoff: u32,

    /// Band width after the previous iteration, negative before the first.
    measured_range: f32,

    iteration: u32,
    state: CalibrationState,
}

impl Default for GyroNoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl GyroNoiseFilter {
    /// Creates an uncalibrated filter with sane initial bands.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter_min: -INITIAL_FILTER_LIMIT,
            filter_max: INITIAL_FILTER_LIMIT,
            filter_center: 0.0,
            noise_min: -INITIAL_NOISE_LIMIT,
            noise_max: INITIAL_NOISE_LIMIT,
            noise_data: [0.0; NOISE_DATA_SIZE],
            noise_data_idx: 0,
            movement_backoff: 0,
            measured_range: -1.0,
            iteration: 0,
            state: CalibrationState::Measuring,
        }
    }

    /// Lower bound of the operative filter band.
    #[must_use]
    pub fn filter_min(&self) -> f32 {
        self.filter_min
    }

    /// Upper bound of the operative filter band.
    #[must_use]
    pub fn filter_max(&self) -> f32 {
        self.filter_max
    }

    /// Estimated bias: the middle of the operative filter band.
    #[must_use]
    pub fn filter_center(&self) -> f32 {
        self.filter_center
    }

    /// Lower bound of the measured noise band.
    #[must_use]
    pub fn noise_min(&self) -> f32 {
        self.noise_min
    }

    /// Upper bound of the measured noise band.
    #[must_use]
    pub fn noise_max(&self) -> f32 {
        self.noise_max
    }

    /// Completed measurement iterations.
    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Samples buffered in the current iteration.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.noise_data_idx
    }

    /// Samples still to be skipped after detected movement.
    #[must_use]
    pub fn movement_backoff(&self) -> u32 {
        self.movement_backoff
    }

    /// Current calibration phase.
    #[must_use]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Returns `true` once the band is frozen.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.state == CalibrationState::Converged
    }

    /// Feeds one raw sample into the noise measurement.
    ///
    /// Does nothing once the filter has converged.
    pub fn collect_noise_data(&mut self, data: f32) {
        if self.is_converged() || !data.is_finite() {
            return;
        }

        if data < self.noise_min || data > self.noise_max {
            self.noise_data_idx = self.noise_data_idx.saturating_sub(MOVEMENT_DISCARD);
            self.movement_backoff =
                (self.movement_backoff + MOVEMENT_BACKOFF_STEP).min(MOVEMENT_BACKOFF_MAX);
            trace!(
                "Gyro movement detected ({:.4} outside [{:.4}, {:.4}]), backing off",
                data,
                self.noise_min,
                self.noise_max
            );
            return;
        }

        if self.movement_backoff > 0 {
            self.movement_backoff -= 1;
            return;
        }

        self.noise_data[self.noise_data_idx] = data;
        self.noise_data_idx += 1;

        if self.noise_data_idx == NOISE_DATA_SIZE {
            self.noise_data_idx = 0;
            self.finish_iteration();
        }
    }

    /// Closes one measurement iteration over a full buffer.
    fn finish_iteration(&mut self) {
        let (lowest, highest) = self
            .noise_data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let margin = (highest - lowest) * NOISE_MARGIN;
        self.noise_min = self.noise_min.max(lowest - margin);
        self.noise_max = self.noise_max.min(highest + margin);
        self.iteration += 1;

        let range = self.noise_max - self.noise_min;
        let settled = self.measured_range >= 0.0
            && (range - self.measured_range).abs() <= self.measured_range * CONVERGENCE_RATIO;
        self.measured_range = range;

        self.filter_min = self.noise_min;
        self.filter_max = self.noise_max;
        self.filter_center = (self.noise_min + self.noise_max) / 2.0;

        debug!(
            "Gyro noise iteration {}: band [{:.5}, {:.5}], range {:.5}",
            self.iteration, self.noise_min, self.noise_max, range
        );

        if settled || self.iteration >= MAX_ITERATIONS {
            self.state = CalibrationState::Converged;
            info!(
                "Gyro calibration converged after {} iterations: band [{:.5}, {:.5}], bias {:.5}",
                self.iteration, self.filter_min, self.filter_max, self.filter_center
            );
        }
    }

    /// Applies the operative band to a raw rate.
    ///
    /// Rates inside the band are clamped to the band center, i.e. treated as
    /// no rotation. Rates outside have the estimated bias removed.
    #[must_use]
    pub fn filter(&self, data: f32) -> f32 {
        if data >= self.filter_min && data <= self.filter_max {
            0.0
        } else {
            data - self.filter_center
        }
    }

    /// Collects a sample and returns its filtered value.
    pub fn process(&mut self, data: f32) -> f32 {
        self.collect_noise_data(data);
        self.filter(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic Gaussian jitter, clipped at `CLIP` standard deviations
    /// the way a saturating sensor reading is.
    struct Jitter {
        seed: u32,
        sigma: f32,
    }

    impl Jitter {
        const CLIP: f32 = 2.5;

        fn new(sigma: f32) -> Self {
            Self {
                seed: 0x1234_5678,
                sigma,
            }
        }

        /// Box-Muller transform over two uniforms in (0, 1].
        fn next(&mut self) -> f32 {
            let u1 = self.uniform();
            let u2 = self.uniform();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
            z.clamp(-Self::CLIP, Self::CLIP) * self.sigma
        }

        fn uniform(&mut self) -> f32 {
            self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((self.seed >> 8) + 1) as f32 / (1u32 << 24) as f32
        }
    }

    fn feed(filter: &mut GyroNoiseFilter, bias: f32, jitter: &mut Jitter, count: usize) {
        for _ in 0..count {
            filter.collect_noise_data(bias + jitter.next());
        }
    }

    // ==================== Initial State Tests ====================

    #[test]
    fn test_initial_bands() {
        let filter = GyroNoiseFilter::new();
        assert_eq!(filter.filter_min(), -INITIAL_FILTER_LIMIT);
        assert_eq!(filter.filter_max(), INITIAL_FILTER_LIMIT);
        assert_eq!(filter.filter_center(), 0.0);
        assert_eq!(filter.noise_min(), -INITIAL_NOISE_LIMIT);
        assert_eq!(filter.noise_max(), INITIAL_NOISE_LIMIT);
        assert_eq!(filter.iteration(), 0);
        assert_eq!(filter.state(), CalibrationState::Measuring);
    }

    #[test]
    fn test_default_matches_new() {
        let filter = GyroNoiseFilter::default();
        assert_eq!(filter.buffered(), 0);
        assert!(!filter.is_converged());
    }

    // ==================== Filtering Tests ====================

    #[test]
    fn test_filter_inside_band_is_zero() {
        let filter = GyroNoiseFilter::new();
        assert_eq!(filter.filter(0.0), 0.0);
        assert_eq!(filter.filter(0.049), 0.0);
        assert_eq!(filter.filter(-0.05), 0.0);
    }

    #[test]
    fn test_filter_outside_band_passes_through() {
        let filter = GyroNoiseFilter::new();
        assert_eq!(filter.filter(0.3), 0.3);
        assert_eq!(filter.filter(-1.2), -1.2);
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let mut filter = GyroNoiseFilter::new();
        filter.collect_noise_data(f32::NAN);
        filter.collect_noise_data(f32::INFINITY);
        assert_eq!(filter.buffered(), 0);
        assert_eq!(filter.movement_backoff(), 0);
    }

    // ==================== Iteration Tests ====================

    #[test]
    fn test_first_iteration_tightens_band() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.002);
        feed(&mut filter, 0.02, &mut jitter, NOISE_DATA_SIZE);

        assert_eq!(filter.iteration(), 1);
        assert_eq!(filter.buffered(), 0);
        assert!(filter.noise_min() > 0.01);
        assert!(filter.noise_max() < 0.03);
        assert!(filter.noise_min() <= 0.02 && 0.02 <= filter.noise_max());
        // Best-effort filter follows the measured band
        assert_eq!(filter.filter_min(), filter.noise_min());
        assert_eq!(filter.filter_max(), filter.noise_max());
    }

    #[test]
    fn test_band_never_widens() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.002);
        let mut previous = (filter.noise_min(), filter.noise_max());

        for _ in 0..MAX_ITERATIONS {
            feed(&mut filter, -0.01, &mut jitter, NOISE_DATA_SIZE);
            assert!(filter.noise_min() >= previous.0);
            assert!(filter.noise_max() <= previous.1);
            previous = (filter.noise_min(), filter.noise_max());
        }
    }

    // ==================== Convergence Tests ====================

    #[test]
    fn test_converges_within_iteration_bound() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.003);
        let bias = 0.015;

        feed(&mut filter, bias, &mut jitter, 20_000);

        assert!(filter.is_converged());
        assert!(filter.iteration() <= MAX_ITERATIONS);
        assert!(filter.filter_min() <= filter.filter_max());
        assert!(filter.filter_min() <= bias && bias <= filter.filter_max());
        assert!((filter.filter_center() - bias).abs() < 0.003);
    }

    #[test]
    fn test_converged_filter_suppresses_resting_noise() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.003);
        feed(&mut filter, 0.015, &mut jitter, 20_000);
        assert!(filter.is_converged());

        // Ten minutes at 100 Hz without a single nonzero rate
        for _ in 0..60_000 {
            assert_eq!(filter.process(0.015 + jitter.next()), 0.0);
        }
    }

    #[test]
    fn test_converged_filter_is_frozen() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.002);
        feed(&mut filter, 0.0, &mut jitter, 20_000);
        assert!(filter.is_converged());

        let band = (filter.filter_min(), filter.filter_max(), filter.iteration());
        feed(&mut filter, 0.5, &mut jitter, 1_000);
        assert_eq!(
            band,
            (filter.filter_min(), filter.filter_max(), filter.iteration())
        );
    }

    #[test]
    fn test_bias_removed_outside_band() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.002);
        feed(&mut filter, 0.02, &mut jitter, 20_000);
        assert!(filter.is_converged());

        let filtered = filter.filter(1.02);
        assert!((filtered - 1.0).abs() < 0.003);
    }

    #[test]
    fn test_iteration_bound_forces_convergence() {
        let mut filter = GyroNoiseFilter::new();
        // Halve the amplitude every iteration so the range keeps shrinking
        // by more than the convergence ratio until the bound
        let mut amplitude = 0.5;
        while !filter.is_converged() {
            for i in 0..NOISE_DATA_SIZE {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                filter.collect_noise_data(sign * amplitude);
            }
            amplitude *= 0.5;
        }
        assert_eq!(filter.iteration(), MAX_ITERATIONS);
        assert!(filter.filter_min() <= filter.filter_max());
    }

    // ==================== Movement Rejection Tests ====================

    #[test]
    fn test_step_change_triggers_movement_rejection() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.003);
        feed(&mut filter, 0.0, &mut jitter, NOISE_DATA_SIZE + 50);
        assert_eq!(filter.iteration(), 1);
        assert_eq!(filter.buffered(), 50);
        let band = (filter.noise_min(), filter.noise_max());

        filter.collect_noise_data(0.8);

        assert_eq!(filter.buffered(), 50 - MOVEMENT_DISCARD);
        assert_eq!(filter.movement_backoff(), MOVEMENT_BACKOFF_STEP);
        assert_eq!(band, (filter.noise_min(), filter.noise_max()));
    }

    #[test]
    fn test_sustained_motion_does_not_widen_band() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.003);
        feed(&mut filter, 0.0, &mut jitter, NOISE_DATA_SIZE + 100);

        for _ in 0..1_000 {
            filter.collect_noise_data(0.6 + jitter.next());
        }
        assert_eq!(filter.movement_backoff(), MOVEMENT_BACKOFF_MAX);
        assert_eq!(filter.buffered(), 0);

        feed(&mut filter, 0.0, &mut jitter, 20_000);
        assert!(filter.is_converged());
        assert!(filter.filter_max() < 0.6);
        assert_eq!(filter.filter(0.6), 0.6 - filter.filter_center());
    }

    #[test]
    fn test_backoff_skips_following_samples() {
        let mut filter = GyroNoiseFilter::new();
        let mut jitter = Jitter::new(0.003);
        feed(&mut filter, 0.0, &mut jitter, NOISE_DATA_SIZE + 30);

        filter.collect_noise_data(0.9);
        let buffered = filter.buffered();

        feed(&mut filter, 0.0, &mut jitter, MOVEMENT_BACKOFF_STEP as usize);
        assert_eq!(filter.buffered(), buffered);
        assert_eq!(filter.movement_backoff(), 0);

        feed(&mut filter, 0.0, &mut jitter, 1);
        assert_eq!(filter.buffered(), buffered + 1);
    }

    #[test]
    fn test_discard_saturates_at_empty_buffer() {
        let mut filter = GyroNoiseFilter::new();
        filter.collect_noise_data(0.0);
        filter.collect_noise_data(0.0);
        filter.collect_noise_data(5.0);
        assert_eq!(filter.buffered(), 0);
    }
}
