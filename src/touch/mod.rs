//! # Touch Module
//!
//! Fixed-capacity table of touch contact slots.
//!
//! The platform reports contacts by a small integer id that stays stable
//! while the finger is down. Each live contact occupies one of
//! [`NUMBER_OF_MULTI_TOUCHES`] pre-allocated slots; the slot index is what
//! buttons bind to.
//!
//! ## Usage
//!
//! ```
//! use touch_controller::touch::TouchSlotTable;
//!
//! let mut slots = TouchSlotTable::new();
//! let slot = slots.touch_down(7, 120, 340).unwrap();
//! assert_eq!(slots.active_count(), 1);
//!
//! slots.touch_move(7, 125, 338);
//! assert_eq!(slots.contact(slot).x, 125);
//!
//! slots.touch_up(7);
//! assert_eq!(slots.active_count(), 0);
//! ```

pub mod feed;

pub use feed::{input_feed, FeedReceiver, FeedSender, PlatformEvent};

use tracing::{debug, trace};

/// Number of touch contacts tracked at the same time.
pub const NUMBER_OF_MULTI_TOUCHES: usize = 10;

/// Contact id of a slot that has never been used.
pub const UNUSED_CONTACT_ID: i32 = -1;

/// One touch contact slot.
///
/// After touch-up the slot keeps the contact's id and last position with
/// `touched = false` until it is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchContact {
    /// Platform contact id, [`UNUSED_CONTACT_ID`] for a never-used slot.
    pub id: i32,
    /// Whether the contact is currently down.
    pub touched: bool,
    /// Screen X coordinate.
    pub x: i32,
    /// Screen Y coordinate.
    pub y: i32,
}

impl Default for TouchContact {
    fn default() -> Self {
        Self {
            id: UNUSED_CONTACT_ID,
            touched: false,
            x: 0,
            y: 0,
        }
    }
}

/// Slot table written from platform touch events.
#[derive(Debug, Clone)]
pub struct TouchSlotTable {
    contacts: [TouchContact; NUMBER_OF_MULTI_TOUCHES],
}

impl Default for TouchSlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchSlotTable {
    /// Creates a table with every slot unused.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contacts: [TouchContact::default(); NUMBER_OF_MULTI_TOUCHES],
        }
    }

    /// Returns all slots.
    #[must_use]
    pub fn contacts(&self) -> &[TouchContact; NUMBER_OF_MULTI_TOUCHES] {
        &self.contacts
    }

    /// Returns the contact in a slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= NUMBER_OF_MULTI_TOUCHES`.
    #[must_use]
    pub fn contact(&self, slot: usize) -> &TouchContact {
        &self.contacts[slot]
    }

    /// Finds the slot of a live contact.
    #[must_use]
    pub fn slot_of(&self, id: i32) -> Option<usize> {
        self.contacts
            .iter()
            .position(|contact| contact.touched && contact.id == id)
    }

    /// Records a touch-down.
    ///
    /// A down for an id that is already live is treated as a move. Returns
    /// the slot written, or `None` if the id is invalid or all slots are
    /// taken.
    pub fn touch_down(&mut self, id: i32, x: i32, y: i32) -> Option<usize> {
        if id < 0 {
            debug!("Ignoring touch-down with invalid contact id {}", id);
            return None;
        }

        if let Some(slot) = self.slot_of(id) {
            return self.write(slot, x, y);
        }

        let Some(slot) = self.contacts.iter().position(|contact| !contact.touched) else {
            debug!(
                "All {} touch slots in use, ignoring contact {}",
                NUMBER_OF_MULTI_TOUCHES, id
            );
            return None;
        };

        self.contacts[slot] = TouchContact {
            id,
            touched: true,
            x,
            y,
        };
        trace!("Contact {} down in slot {} at ({}, {})", id, slot, x, y);
        Some(slot)
    }

    /// Records a move of a live contact. Unknown ids are ignored.
    pub fn touch_move(&mut self, id: i32, x: i32, y: i32) -> Option<usize> {
        match self.slot_of(id) {
            Some(slot) => self.write(slot, x, y),
            None => {
                trace!("Ignoring move for unknown contact {}", id);
                None
            }
        }
    }

    /// Records a touch-up of a live contact. Unknown ids are ignored.
    pub fn touch_up(&mut self, id: i32) -> Option<usize> {
        let Some(slot) = self.slot_of(id) else {
            trace!("Ignoring touch-up for unknown contact {}", id);
            return None;
        };
        self.contacts[slot].touched = false;
        trace!("Contact {} up in slot {}", id, slot);
        Some(slot)
    }

    fn write(&mut self, slot: usize, x: i32, y: i32) -> Option<usize> {
        let contact = &mut self.contacts[slot];
        contact.x = x;
        contact.y = y;
        Some(slot)
    }

    /// Number of contacts currently down.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.contacts.iter().filter(|contact| contact.touched).count()
    }

    /// Returns every slot to the unused state.
    pub fn clear(&mut self) {
        self.contacts = [TouchContact::default(); NUMBER_OF_MULTI_TOUCHES];
    }
}
