//! # Steering Module
//!
//! Shapes a normalized touch offset into a signed analog axis value.
//!
//! ## Dual Deadzone
//!
//! Two deadzones shape the response of an on-screen steering control:
//!
//! - **Center deadzone**: offsets closer to the center than `deadzone_center`
//!   map to 0.0, so a resting finger does not jitter the wheel.
//! - **Edge deadzone**: offsets within `deadzone_edge` of the button edge map
//!   to full lock (±1.0), so full lock is reachable without hitting the exact
//!   edge.
//!
//! Between the two the input is remapped linearly:
//!
//! `output = sign(u) * (|u| - center) / (1 - edge - center)`
//!
//! The curve is continuous at both boundaries and monotonic over `[-1, 1]`.
//!
//! ## Usage
//!
//! ```
//! use touch_controller::controller::steering::SteeringShaper;
//!
//! let shaper = SteeringShaper::new(0.1, 0.1);
//!
//! // Input near center (within center deadzone)
//! assert_eq!(shaper.apply(0.05), 0.0);
//!
//! // Input near the edge (within edge deadzone)
//! assert_eq!(shaper.apply(-0.95), -1.0);
//! ```

/// Largest accepted value for either deadzone.
pub const MAX_DEADZONE: f32 = 0.45;

/// Applies the center and edge deadzones to a normalized axis.
///
/// Input and output are in the range -1.0 to 1.0, where 0.0 is center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringShaper {
    /// Dead area around the center (0.0 to 0.45).
    deadzone_center: f32,
    /// Saturation area at the edge (0.0 to 0.45).
    deadzone_edge: f32,
}

impl Default for SteeringShaper {
    fn default() -> Self {
        Self {
            deadzone_center: 0.1,
            deadzone_edge: 0.1,
        }
    }
}

impl SteeringShaper {
    /// Creates a new shaper with the given center and edge deadzones.
    ///
    /// # Arguments
    ///
    /// * `deadzone_center` - Dead area around center (0.0 to 0.45). Values outside this range are clamped.
    /// * `deadzone_edge` - Saturation area at the edge (0.0 to 0.45). Values outside this range are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::steering::SteeringShaper;
    ///
    /// let shaper = SteeringShaper::new(0.2, 0.15);
    /// assert!((shaper.deadzone_center() - 0.2).abs() < 0.001);
    /// ```
    #[must_use]
    pub fn new(deadzone_center: f32, deadzone_edge: f32) -> Self {
        Self {
            deadzone_center: deadzone_center.clamp(0.0, MAX_DEADZONE),
            deadzone_edge: deadzone_edge.clamp(0.0, MAX_DEADZONE),
        }
    }

    /// Creates a linear shaper (no deadzones).
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::steering::SteeringShaper;
    ///
    /// let shaper = SteeringShaper::linear();
    /// assert!((shaper.apply(0.5) - 0.5).abs() < 0.001);
    /// ```
    #[must_use]
    pub fn linear() -> Self {
        Self {
            deadzone_center: 0.0,
            deadzone_edge: 0.0,
        }
    }

    /// Returns the configured center deadzone.
    #[must_use]
    pub fn deadzone_center(&self) -> f32 {
        self.deadzone_center
    }

    /// Returns the configured edge deadzone.
    #[must_use]
    pub fn deadzone_edge(&self) -> f32 {
        self.deadzone_edge
    }

    /// Shapes a normalized offset into a signed axis value.
    ///
    /// # Arguments
    ///
    /// * `input` - Normalized offset from the button center (-1.0 to 1.0).
    ///   Values beyond the range (a finger dragged past the edge) saturate.
    ///
    /// # Returns
    ///
    /// Shaped axis value (-1.0 to 1.0)
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::steering::SteeringShaper;
    ///
    /// let shaper = SteeringShaper::new(0.1, 0.1);
    ///
    /// // Within center deadzone
    /// assert_eq!(shaper.apply(0.09), 0.0);
    ///
    /// // Halfway through the live band
    /// assert!((shaper.apply(0.5) - 0.5).abs() < 0.001);
    ///
    /// // Edge deadzone saturates
    /// assert_eq!(shaper.apply(0.9), 1.0);
    /// ```
    #[must_use]
    pub fn apply(&self, input: f32) -> f32 {
        let magnitude = input.abs();

        if magnitude < self.deadzone_center {
            return 0.0;
        }

        let sign = input.signum();
        if magnitude >= 1.0 - self.deadzone_edge {
            return sign;
        }

        sign * self.steering_factor(magnitude)
    }

    /// Remaps a magnitude from the live band onto 0..1.
    #[inline]
    fn steering_factor(&self, magnitude: f32) -> f32 {
        let span = 1.0 - self.deadzone_edge - self.deadzone_center;
        if span <= 0.0 {
            return 0.0;
        }
        ((magnitude - self.deadzone_center) / span).clamp(0.0, 1.0)
    }
}

/// Converts a touch coordinate inside a button into a normalized offset.
///
/// # Arguments
///
/// * `position` - Touch coordinate along the axis
/// * `origin` - Button origin along the axis
/// * `extent` - Button width or height along the axis
///
/// # Returns
///
/// Offset from the button center in units of its half extent, clamped to
/// -1.0..=1.0. The left/top edge maps to -1.0, the right/bottom edge to 1.0.
///
/// # Examples
///
/// ```
/// use touch_controller::controller::steering::normalize_offset;
///
/// assert_eq!(normalize_offset(0, 0, 100), -1.0);
/// assert_eq!(normalize_offset(50, 0, 100), 0.0);
/// assert_eq!(normalize_offset(100, 0, 100), 1.0);
/// assert_eq!(normalize_offset(250, 0, 100), 1.0);
/// ```
#[must_use]
pub fn normalize_offset(position: i32, origin: i32, extent: i32) -> f32 {
    if extent <= 0 {
        return 0.0;
    }
    let half = extent as f32 / 2.0;
    let local = (i64::from(position) - i64::from(origin)) as f32;
    (local / half - 1.0).clamp(-1.0, 1.0)
}
