//! # Virtual Buttons
//!
//! On-screen button regions and the registry that owns them.
//!
//! ## Button Types
//!
//! | Type | Action | Style |
//! |------|--------|-------|
//! | Steering | Steering (X) + UpDown (Y) | Joystick |
//! | UpDown | UpDown (Y) | Joystick |
//! | Fire | Fire | Button |
//! | Nitro | Nitro | Button |
//! | Skidding | Skidding | Button |
//! | LookBackwards | LookBackwards | Button |
//! | Rescue | Rescue | Button |
//! | Escape | Escape | Button |
//! | Up / Down / Left / Right | Up / Down / Left / Right | Button |
//!
//! A **joystick** stays bound to its touch until the finger lifts, even when
//! dragged outside the rectangle. A **button** is released as soon as the
//! finger leaves its rectangle.
//!
//! Rectangles may overlap; a new touch binds to the first free button in
//! registration order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::action::PlayerAction;
use super::steering::normalize_offset;
use crate::error::{Result, TouchControllerError};

/// Kind of on-screen control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Steering,
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

impl ButtonType {
    /// Action emitted by buttons of this type.
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::action::PlayerAction;
    /// use touch_controller::controller::button::ButtonType;
    ///
    /// assert_eq!(ButtonType::Skidding.action(), PlayerAction::Skidding);
    /// assert_eq!(ButtonType::Left.action(), PlayerAction::Left);
    /// ```
    #[must_use]
    pub fn action(&self) -> PlayerAction {
        match self {
            ButtonType::Steering => PlayerAction::Steering,
            ButtonType::UpDown => PlayerAction::UpDown,
            ButtonType::Fire => PlayerAction::Fire,
            ButtonType::Nitro => PlayerAction::Nitro,
            ButtonType::Skidding => PlayerAction::Skidding,
            ButtonType::LookBackwards => PlayerAction::LookBackwards,
            ButtonType::Rescue => PlayerAction::Rescue,
            ButtonType::Escape => PlayerAction::Escape,
            ButtonType::Up => PlayerAction::Up,
            ButtonType::Down => PlayerAction::Down,
            ButtonType::Left => PlayerAction::Left,
            ButtonType::Right => PlayerAction::Right,
        }
    }

    /// Returns `true` for analog controls that keep their touch when dragged
    /// outside the rectangle.
    #[must_use]
    pub fn is_joystick(&self) -> bool {
        matches!(self, ButtonType::Steering | ButtonType::UpDown)
    }
}

/// Association between a button and the touch slot pressing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchBinding {
    /// Slot index in the touch table.
    pub slot: usize,
    /// Platform id of the contact that was in the slot when bound.
    pub id: i32,
}

/// One on-screen control with its live state.
#[derive(Debug, Clone)]
pub struct VirtualButton {
    button_type: ButtonType,
    action: PlayerAction,
    pressed: bool,
    binding: Option<TouchBinding>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    axis_x: f32,
    axis_y: f32,

    // What the controller has been told so far
    pub(crate) reported_pressed: bool,
    pub(crate) press_latched: bool,
    pub(crate) reported_axis_x: f32,
    pub(crate) reported_axis_y: f32,
}

impl VirtualButton {
    fn new(button_type: ButtonType, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            button_type,
            action: button_type.action(),
            pressed: false,
            binding: None,
            x,
            y,
            width,
            height,
            axis_x: 0.0,
            axis_y: 0.0,
            reported_pressed: false,
            press_latched: false,
            reported_axis_x: 0.0,
            reported_axis_y: 0.0,
        }
    }

    #[must_use]
    pub fn button_type(&self) -> ButtonType {
        self.button_type
    }

    #[must_use]
    pub fn action(&self) -> PlayerAction {
        self.action
    }

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    #[must_use]
    pub fn binding(&self) -> Option<TouchBinding> {
        self.binding
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Platform id of the contact pressing this button.
    #[must_use]
    pub fn bound_touch_id(&self) -> Option<i32> {
        self.binding.map(|binding| binding.id)
    }

    #[must_use]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Horizontal offset of the touch from the center, -1.0..=1.0.
    #[must_use]
    pub fn axis_x(&self) -> f32 {
        self.axis_x
    }

    /// Vertical offset of the touch from the center, -1.0..=1.0 (down positive).
    #[must_use]
    pub fn axis_y(&self) -> f32 {
        self.axis_y
    }

    /// Returns `true` if the point lies within the rectangle (edges included).
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let within = |point: i32, origin: i32, extent: i32| {
            let (point, origin) = (i64::from(point), i64::from(origin));
            point >= origin && point <= origin + i64::from(extent)
        };
        within(x, self.x, self.width) && within(y, self.y, self.height)
    }

    pub(crate) fn bind(&mut self, slot: usize, id: i32) {
        debug!("{:?} button pressed by contact {} (slot {})", self.button_type, id, slot);
        self.binding = Some(TouchBinding { slot, id });
        self.pressed = true;
        self.press_latched = true;
    }

    /// Updates the axes from the bound touch position.
    pub(crate) fn track(&mut self, x: i32, y: i32) {
        if self.button_type.is_joystick() {
            self.axis_x = normalize_offset(x, self.x, self.width);
            self.axis_y = normalize_offset(y, self.y, self.height);
        }
    }

    pub(crate) fn release(&mut self) {
        if let Some(binding) = self.binding.take() {
            debug!("{:?} button released by contact {}", self.button_type, binding.id);
        }
        self.pressed = false;
        self.axis_x = 0.0;
        self.axis_y = 0.0;
    }
}

/// Ordered collection of the current on-screen layout.
#[derive(Debug, Clone, Default)]
pub struct ButtonRegistry {
    buttons: Vec<VirtualButton>,
}

impl ButtonRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a button and returns its index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidButtonGeometry` if `width` or `height` is not positive.
    ///
    /// # Examples
    ///
    /// ```
    /// use touch_controller::controller::button::{ButtonRegistry, ButtonType};
    ///
    /// let mut registry = ButtonRegistry::new();
    /// let index = registry.add(ButtonType::Fire, 10, 10, 80, 80)?;
    /// assert_eq!(index, 0);
    /// assert!(!registry.get(0).is_pressed());
    /// # Ok::<(), touch_controller::error::TouchControllerError>(())
    /// ```
    pub fn add(
        &mut self,
        button_type: ButtonType,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<usize> {
        if width <= 0 || height <= 0 {
            return Err(TouchControllerError::InvalidButtonGeometry { width, height });
        }
        self.buttons.push(VirtualButton::new(button_type, x, y, width, height));
        Ok(self.buttons.len() - 1)
    }

    /// Removes every button.
    pub fn clear(&mut self) {
        self.buttons.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Returns the button at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; indices come from [`ButtonRegistry::add`].
    #[must_use]
    #[track_caller]
    pub fn get(&self, index: usize) -> &VirtualButton {
        match self.buttons.get(index) {
            Some(button) => button,
            None => panic!(
                "button index {} out of range ({} buttons registered)",
                index,
                self.buttons.len()
            ),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualButton> {
        self.buttons.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut VirtualButton> {
        self.buttons.iter_mut()
    }
}
