//! # Multitouch Device
//!
//! Turns touch contacts and motion samples into player actions.
//!
//! ## Per-Frame Flow
//!
//! 1. Platform events are applied as they arrive ([`MultitouchDevice::handle_event`]);
//!    each touch event reconciles its slot against the buttons right away
//! 2. [`MultitouchDevice::dispatch`] re-reconciles every slot
//! 3. [`MultitouchDevice::update_controller`] emits whatever changed since the
//!    previous frame to the attached [`ActionSink`]
//!
//! Digital buttons emit press/release edges. Joystick buttons emit shaped
//! analog axes. With a motion sensor active and no steering button held, the
//! fused orientation drives the steering axis.
//!
//! ## Usage
//!
//! ```
//! use touch_controller::controller::button::ButtonType;
//! use touch_controller::controller::MultitouchDevice;
//!
//! let mut device = MultitouchDevice::new();
//! device.add_button(ButtonType::Nitro, 0, 0, 100, 100)?;
//!
//! device.touch_down(3, 50, 50);
//! assert!(device.button(0).is_pressed());
//!
//! device.touch_up(3);
//! assert!(!device.button(0).is_pressed());
//! # Ok::<(), touch_controller::error::TouchControllerError>(())
//! ```

use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, trace};

use super::action::{ActionSink, ActionValue, PlayerAction};
use super::button::{ButtonRegistry, ButtonType, VirtualButton};
use super::steering::SteeringShaper;
use crate::config::{LayoutConfig, SteeringConfig};
use crate::error::Result;
use crate::sensor::OrientationEstimator;
use crate::touch::{PlatformEvent, TouchSlotTable, NUMBER_OF_MULTI_TOUCHES};

/// Smallest analog change worth reporting.
pub const ANALOG_THRESHOLD: f32 = 0.01;

type Controller = Option<Box<dyn ActionSink>>;

/// Virtual touchscreen and motion-sensor controller.
pub struct MultitouchDevice {
    slots: TouchSlotTable,
    buttons: ButtonRegistry,
    shaper: SteeringShaper,
    steering_config: SteeringConfig,
    estimator: OrientationEstimator,
    controller: Controller,
    /// Last tilt steering value sent, `None` when tilt is not driving steering.
    reported_tilt: Option<f32>,
}

impl Default for MultitouchDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MultitouchDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultitouchDevice")
            .field("slots", &self.slots)
            .field("buttons", &self.buttons)
            .field("shaper", &self.shaper)
            .field("steering_config", &self.steering_config)
            .field("estimator", &self.estimator)
            .field("controller", &self.controller.is_some())
            .field("reported_tilt", &self.reported_tilt)
            .finish()
    }
}

impl MultitouchDevice {
    /// Creates a device with default steering parameters and no controller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&SteeringConfig::default())
    }

    /// Creates a device with the given steering parameters.
    #[must_use]
    pub fn with_config(config: &SteeringConfig) -> Self {
        Self {
            slots: TouchSlotTable::new(),
            buttons: ButtonRegistry::new(),
            shaper: SteeringShaper::new(config.deadzone_center, config.deadzone_edge),
            steering_config: config.clone(),
            estimator: OrientationEstimator::new(),
            controller: None,
            reported_tilt: None,
        }
    }

    /// Attaches (or detaches) the receiver of emitted actions.
    ///
    /// Without a controller, state is still tracked but nothing is emitted.
    pub fn set_controller(&mut self, controller: Option<Box<dyn ActionSink>>) {
        self.controller = controller;
    }

    #[must_use]
    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    // ==================== Layout ====================

    /// Appends an on-screen button and returns its index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidButtonGeometry` if `width` or `height` is not positive.
    pub fn add_button(
        &mut self,
        button_type: ButtonType,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<usize> {
        self.buttons.add(button_type, x, y, width, height)
    }

    /// Replaces the current buttons with a configured layout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidButtonGeometry` for the first button without area;
    /// buttons before it stay registered.
    pub fn apply_layout(&mut self, layout: &LayoutConfig) -> Result<()> {
        self.clear_buttons();
        for button in &layout.buttons {
            self.add_button(
                button.button_type,
                button.x,
                button.y,
                button.width,
                button.height,
            )?;
        }
        info!("Applied layout with {} buttons", self.buttons.len());
        Ok(())
    }

    /// Removes every button.
    ///
    /// Buttons the controller still believes pressed are released first so
    /// no action stays stuck.
    pub fn clear_buttons(&mut self) {
        for button in self.buttons.iter_mut() {
            release_reported(&mut self.controller, button);
        }
        self.buttons.clear();
    }

    /// Clears buttons and touches and returns steering and orientation to
    /// their initial state.
    ///
    /// The configured deadzones and sensor activation are kept. Gyroscope
    /// calibration starts over.
    pub fn reset(&mut self) {
        self.clear_buttons();
        self.slots.clear();
        self.estimator.reset();
        self.shaper = SteeringShaper::new(
            self.steering_config.deadzone_center,
            self.steering_config.deadzone_edge,
        );
        if let Some(reported) = self.reported_tilt.take() {
            if reported != 0.0 {
                emit(&mut self.controller, PlayerAction::Steering, ActionValue::Analog(0.0));
            }
        }
        debug!("Multitouch device reset");
    }

    #[must_use]
    pub fn buttons_count(&self) -> usize {
        self.buttons.len()
    }

    /// Returns the button at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= buttons_count()`.
    #[must_use]
    #[track_caller]
    pub fn button(&self, index: usize) -> &VirtualButton {
        self.buttons.get(index)
    }

    #[must_use]
    pub fn buttons(&self) -> &ButtonRegistry {
        &self.buttons
    }

    // ==================== Touch Input ====================

    #[must_use]
    pub fn slots(&self) -> &TouchSlotTable {
        &self.slots
    }

    /// Number of contacts currently down, bound to a button or not.
    #[must_use]
    pub fn active_touches_count(&self) -> usize {
        self.slots.active_count()
    }

    /// Applies one platform event.
    ///
    /// Events for unknown contacts and samples for inactive sensors are
    /// dropped.
    pub fn handle_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::TouchDown { id, x, y } => self.touch_down(id, x, y),
            PlatformEvent::TouchMove { id, x, y } => self.touch_move(id, x, y),
            PlatformEvent::TouchUp { id } => self.touch_up(id),
            PlatformEvent::Accelerometer { x, y } => {
                self.update_orientation_from_accelerometer(x, y)
            }
            PlatformEvent::Gyroscope { z, timestamp } => {
                self.update_orientation_from_gyroscope(z, timestamp)
            }
        }
    }

    pub fn touch_down(&mut self, id: i32, x: i32, y: i32) {
        if let Some(slot) = self.slots.touch_down(id, x, y) {
            self.update_device_state(slot);
        }
    }

    pub fn touch_move(&mut self, id: i32, x: i32, y: i32) {
        if let Some(slot) = self.slots.touch_move(id, x, y) {
            self.update_device_state(slot);
        }
    }

    pub fn touch_up(&mut self, id: i32) {
        if let Some(slot) = self.slots.touch_up(id) {
            self.update_device_state(slot);
        }
    }

    /// Reconciles one touch slot against the buttons.
    ///
    /// A button bound to the slot is released when the contact lifted, when
    /// the slot now holds a different contact, or (for non-joystick buttons)
    /// when the contact left the rectangle. Otherwise it follows the contact.
    /// A live contact bound to nothing binds the first free button containing
    /// it, in registration order.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= NUMBER_OF_MULTI_TOUCHES`.
    pub fn update_device_state(&mut self, slot: usize) {
        let contact = *self.slots.contact(slot);
        let mut bound = false;

        for button in self.buttons.iter_mut() {
            let Some(binding) = button.binding() else {
                continue;
            };
            if binding.slot != slot {
                continue;
            }

            let held = contact.touched
                && contact.id == binding.id
                && (button.button_type().is_joystick() || button.contains(contact.x, contact.y));

            if held {
                button.track(contact.x, contact.y);
                bound = true;
            } else {
                button.release();
            }
        }

        if !contact.touched || bound {
            return;
        }

        if let Some(button) = self
            .buttons
            .iter_mut()
            .find(|button| !button.is_bound() && button.contains(contact.x, contact.y))
        {
            button.bind(slot, contact.id);
            button.track(contact.x, contact.y);
        }
    }

    /// Reconciles every touch slot.
    pub fn dispatch(&mut self) {
        for slot in 0..NUMBER_OF_MULTI_TOUCHES {
            self.update_device_state(slot);
        }
    }

    // ==================== Motion Sensors ====================

    pub fn update_orientation_from_accelerometer(&mut self, x: f32, y: f32) {
        self.estimator.update_from_accelerometer(x, y);
    }

    pub fn update_orientation_from_gyroscope(&mut self, z: f32, timestamp: Duration) {
        self.estimator.update_from_gyroscope(z, timestamp);
    }

    /// Fused device orientation in radians.
    #[must_use]
    pub fn orientation(&self) -> f32 {
        self.estimator.orientation()
    }

    #[must_use]
    pub fn estimator(&self) -> &OrientationEstimator {
        &self.estimator
    }

    pub fn activate_accelerometer(&mut self) {
        self.estimator.activate_accelerometer();
    }

    pub fn deactivate_accelerometer(&mut self) {
        self.estimator.deactivate_accelerometer();
    }

    #[must_use]
    pub fn is_accelerometer_active(&self) -> bool {
        self.estimator.is_accelerometer_active()
    }

    pub fn activate_gyroscope(&mut self) {
        self.estimator.activate_gyroscope();
    }

    pub fn deactivate_gyroscope(&mut self) {
        self.estimator.deactivate_gyroscope();
    }

    #[must_use]
    pub fn is_gyroscope_active(&self) -> bool {
        self.estimator.is_gyroscope_active()
    }

    /// Steering value derived from the current orientation.
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::MultitouchDevice;
    ///
    /// let device = MultitouchDevice::new();
    /// assert_eq!(device.tilt_steering(), 0.0);
    /// ```
    #[must_use]
    pub fn tilt_steering(&self) -> f32 {
        let normalized = (self.orientation() / FRAC_PI_2
            * self.steering_config.tilt_sensitivity)
            .clamp(-1.0, 1.0);
        self.shaper.apply(normalized)
    }

    // ==================== Action Output ====================

    /// Shapes a raw horizontal axis and emits it as steering.
    pub fn update_axis_x(&mut self, value: f32) {
        let shaped = self.shaper.apply(value);
        emit(&mut self.controller, PlayerAction::Steering, ActionValue::Analog(shaped));
    }

    /// Shapes a raw vertical axis (down positive) and emits it as throttle
    /// (up positive).
    pub fn update_axis_y(&mut self, value: f32) {
        let shaped = self.shaper.apply(-value);
        emit(&mut self.controller, PlayerAction::UpDown, ActionValue::Analog(shaped));
    }

    /// Emits every button and axis change since the previous call.
    ///
    /// A press and release that both happened since the previous call are
    /// emitted as a press followed by a release.
    pub fn update_controller(&mut self) {
        let shaper = self.shaper;
        let tilt = self.reported_tilt;
        let mut steering_held = false;

        for button in self.buttons.iter_mut() {
            let steering = shaper.apply(button.axis_x());
            let throttle = shaper.apply(-button.axis_y());

            match button.button_type() {
                ButtonType::Steering => {
                    steering_held |= button.is_pressed();
                    if let Some(tilt) = tilt.filter(|_| button.is_pressed()) {
                        // The controller last saw the tilt value
                        button.reported_axis_x = tilt;
                    }
                    report_axis(
                        &mut self.controller,
                        PlayerAction::Steering,
                        &mut button.reported_axis_x,
                        steering,
                    );
                    report_axis(
                        &mut self.controller,
                        PlayerAction::UpDown,
                        &mut button.reported_axis_y,
                        throttle,
                    );
                }
                ButtonType::UpDown => {
                    report_axis(
                        &mut self.controller,
                        PlayerAction::UpDown,
                        &mut button.reported_axis_y,
                        throttle,
                    );
                }
                _ => {
                    report_press(&mut self.controller, button);
                    continue;
                }
            }

            button.reported_pressed = button.is_pressed();
            button.press_latched = false;
        }

        self.update_tilt(steering_held);
    }

    fn update_tilt(&mut self, steering_held: bool) {
        if steering_held {
            self.reported_tilt = None;
            return;
        }

        if self.is_accelerometer_active() || self.is_gyroscope_active() {
            let value = self.tilt_steering();
            let changed = self
                .reported_tilt
                .map_or(true, |reported| analog_changed(reported, value));
            if changed {
                emit(&mut self.controller, PlayerAction::Steering, ActionValue::Analog(value));
                self.reported_tilt = Some(value);
            }
        } else if let Some(reported) = self.reported_tilt.take() {
            if reported != 0.0 {
                emit(&mut self.controller, PlayerAction::Steering, ActionValue::Analog(0.0));
            }
        }
    }

    /// Re-applies steering parameters, e.g. after a config reload.
    pub fn update_config_params(&mut self, config: &SteeringConfig) {
        self.shaper = SteeringShaper::new(config.deadzone_center, config.deadzone_edge);
        self.steering_config = config.clone();
        info!(
            "Steering updated: deadzone center {:.2}, edge {:.2}, tilt sensitivity {:.2}",
            config.deadzone_center, config.deadzone_edge, config.tilt_sensitivity
        );
    }

    #[must_use]
    pub fn shaper(&self) -> &SteeringShaper {
        &self.shaper
    }

    #[must_use]
    pub fn steering_config(&self) -> &SteeringConfig {
        &self.steering_config
    }
}

fn emit(controller: &mut Controller, action: PlayerAction, value: ActionValue) {
    trace!("Action {:?} -> {:?}", action, value);
    if let Some(controller) = controller.as_mut() {
        controller.action(action, value);
    }
}

fn analog_changed(reported: f32, value: f32) -> bool {
    (value - reported).abs() > ANALOG_THRESHOLD
        || (value != reported && (value == 0.0 || value.abs() == 1.0))
}

fn report_axis(controller: &mut Controller, action: PlayerAction, reported: &mut f32, value: f32) {
    if analog_changed(*reported, value) {
        emit(controller, action, ActionValue::Analog(value));
        *reported = value;
    }
}

fn report_press(controller: &mut Controller, button: &mut VirtualButton) {
    let action = button.action();

    if button.press_latched {
        // Released and pressed again since the last report
        if button.reported_pressed {
            emit(controller, action, ActionValue::Digital(false));
        }
        emit(controller, action, ActionValue::Digital(true));
        button.reported_pressed = true;
        button.press_latched = false;
    }

    if button.reported_pressed != button.is_pressed() {
        emit(controller, action, ActionValue::Digital(button.is_pressed()));
        button.reported_pressed = button.is_pressed();
    }
}

fn release_reported(controller: &mut Controller, button: &mut VirtualButton) {
    if button.button_type().is_joystick() {
        report_axis(controller, PlayerAction::Steering, &mut button.reported_axis_x, 0.0);
        report_axis(controller, PlayerAction::UpDown, &mut button.reported_axis_y, 0.0);
    } else if button.reported_pressed {
        emit(controller, button.action(), ActionValue::Digital(false));
    }
    button.reported_pressed = false;
    button.press_latched = false;
}
