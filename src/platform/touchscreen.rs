//! # Touchscreen Module
//!
//! Linux evdev touchscreen detection and multitouch decoding.
//!
//! ## Device Detection
//!
//! A touchscreen is an input device that:
//! - Reports `ABS_MT_SLOT`, `ABS_MT_POSITION_X` and `ABS_MT_POSITION_Y`
//! - Has the `INPUT_PROP_DIRECT` property (touches map to screen positions,
//!   unlike a touchpad)
//!
//! ## Multitouch Protocol B
//!
//! | Event | Meaning |
//! |-------|---------|
//! | ABS_MT_SLOT | Following events refer to this slot |
//! | ABS_MT_TRACKING_ID >= 0 | New contact in the slot |
//! | ABS_MT_TRACKING_ID = -1 | Contact in the slot lifted |
//! | ABS_MT_POSITION_X/Y | Contact position |
//! | SYN_REPORT | Frame complete, changes take effect |
//! | SYN_DROPPED | Kernel buffer overrun, events until next SYN_REPORT are unreliable |
//!
//! The tracking id becomes the contact id of the emitted [`PlatformEvent`]s.
//! Coordinates are passed through in device units, so button layouts are
//! given in the same units.

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, PropType, Synchronization};
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TouchControllerError};
use crate::touch::{FeedSender, PlatformEvent};

/// Highest number of kernel slots decoded.
pub const MT_MAX_SLOTS: usize = 16;

const NO_CONTACT: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MtSlot {
    tracking_id: i32,
    x: i32,
    y: i32,
    /// Contact id currently reported down for this slot.
    reported_id: i32,
    dirty: bool,
}

impl Default for MtSlot {
    fn default() -> Self {
        Self {
            tracking_id: NO_CONTACT,
            x: 0,
            y: 0,
            reported_id: NO_CONTACT,
            dirty: false,
        }
    }
}

/// Decodes multitouch protocol B events into touch down/move/up events.
#[derive(Debug, Clone)]
pub struct MtDecoder {
    slots: [MtSlot; MT_MAX_SLOTS],
    current_slot: usize,
    dropped: bool,
}

impl Default for MtDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MtDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [MtSlot::default(); MT_MAX_SLOTS],
            current_slot: 0,
            dropped: false,
        }
    }

    /// Number of contacts reported down so far.
    #[must_use]
    pub fn active_contacts(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.reported_id != NO_CONTACT)
            .count()
    }

    /// Processes a single evdev input event.
    ///
    /// Returns the touch events completed by this event, which is non-empty
    /// only for `SYN_REPORT`.
    ///
    /// # Examples
    ///
    /// ```
    /// use evdev::{AbsoluteAxisType, EventType, InputEvent, Synchronization};
    /// use touch_controller::platform::touchscreen::MtDecoder;
    /// use touch_controller::touch::PlatformEvent;
    ///
    /// let mut decoder = MtDecoder::new();
    /// decoder.process_event(&InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_MT_TRACKING_ID.0, 7));
    /// decoder.process_event(&InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_MT_POSITION_X.0, 100));
    /// decoder.process_event(&InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_MT_POSITION_Y.0, 200));
    ///
    /// let events = decoder.process_event(&InputEvent::new(
    ///     EventType::SYNCHRONIZATION,
    ///     Synchronization::SYN_REPORT.0,
    ///     0,
    /// ));
    /// assert_eq!(events, vec![PlatformEvent::TouchDown { id: 7, x: 100, y: 200 }]);
    /// ```
    pub fn process_event(&mut self, event: &InputEvent) -> Vec<PlatformEvent> {
        match event.kind() {
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                if self.dropped {
                    self.dropped = false;
                    return Vec::new();
                }
                self.commit()
            }
            InputEventKind::Synchronization(Synchronization::SYN_DROPPED) => {
                debug!("Touchscreen events dropped by kernel, skipping to next report");
                self.dropped = true;
                Vec::new()
            }
            InputEventKind::AbsAxis(axis) if !self.dropped => {
                self.process_axis_event(axis, event.value());
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        if axis == AbsoluteAxisType::ABS_MT_SLOT {
            match usize::try_from(value) {
                Ok(slot) if slot < MT_MAX_SLOTS => self.current_slot = slot,
                _ => {
                    trace!("Ignoring touchscreen slot {}", value);
                    self.current_slot = MT_MAX_SLOTS;
                }
            }
            return;
        }

        let Some(slot) = self.slots.get_mut(self.current_slot) else {
            return;
        };

        match axis {
            AbsoluteAxisType::ABS_MT_TRACKING_ID => slot.tracking_id = value.max(NO_CONTACT),
            AbsoluteAxisType::ABS_MT_POSITION_X => slot.x = value,
            AbsoluteAxisType::ABS_MT_POSITION_Y => slot.y = value,
            _ => return,
        }
        slot.dirty = true;
    }

    fn commit(&mut self) -> Vec<PlatformEvent> {
        let mut events = Vec::new();

        for slot in self.slots.iter_mut().filter(|slot| slot.dirty) {
            slot.dirty = false;

            if slot.reported_id != NO_CONTACT && slot.reported_id != slot.tracking_id {
                events.push(PlatformEvent::TouchUp { id: slot.reported_id });
                slot.reported_id = NO_CONTACT;
            }

            if slot.tracking_id == NO_CONTACT {
                continue;
            }

            if slot.reported_id == NO_CONTACT {
                events.push(PlatformEvent::TouchDown {
                    id: slot.tracking_id,
                    x: slot.x,
                    y: slot.y,
                });
                slot.reported_id = slot.tracking_id;
            } else {
                events.push(PlatformEvent::TouchMove {
                    id: slot.tracking_id,
                    x: slot.x,
                    y: slot.y,
                });
            }
        }

        events
    }
}

/// Returns `true` if the device looks like a multitouch touchscreen.
#[must_use]
pub fn is_touchscreen(device: &Device) -> bool {
    let has_mt_axes = device.supported_absolute_axes().is_some_and(|axes| {
        axes.contains(AbsoluteAxisType::ABS_MT_SLOT)
            && axes.contains(AbsoluteAxisType::ABS_MT_POSITION_X)
            && axes.contains(AbsoluteAxisType::ABS_MT_POSITION_Y)
    });
    has_mt_axes && device.properties().contains(PropType::DIRECT)
}

/// Multitouch touchscreen handle
pub struct Touchscreen {
    device: Device,
    device_path: String,
    decoder: MtDecoder,
}

impl Touchscreen {
    /// Detect and open the first available touchscreen
    ///
    /// Scans all `/dev/input/event*` devices in path order.
    ///
    /// # Errors
    ///
    /// - `TouchscreenNotFound`: No multitouch touchscreen on the system
    /// - `Touchscreen`: `/dev/input` cannot be read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use touch_controller::platform::touchscreen::Touchscreen;
    ///
    /// let touchscreen = Touchscreen::open()?;
    /// println!("Using touchscreen at: {}", touchscreen.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(TouchControllerError::Touchscreen(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| TouchControllerError::Touchscreen(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                TouchControllerError::Touchscreen(format!("Failed to read directory entry: {}", e))
            })?;

        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if is_touchscreen(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found touchscreen at: {}", device_path);
                        return Ok(Self::from_device(device, device_path));
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(TouchControllerError::TouchscreenNotFound)
    }

    /// Open a specific event device
    ///
    /// # Errors
    ///
    /// - `Io`: the device cannot be opened
    /// - `Touchscreen`: the device is not a multitouch touchscreen
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path)?;

        if !is_touchscreen(&device) {
            return Err(TouchControllerError::Touchscreen(format!(
                "{} is not a multitouch touchscreen",
                path.display()
            )));
        }

        let device_path = path.to_string_lossy().to_string();
        info!("Opened touchscreen at: {}", device_path);
        Ok(Self::from_device(device, device_path))
    }

    fn from_device(device: Device, device_path: String) -> Self {
        Self {
            device,
            device_path,
            decoder: MtDecoder::new(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Fetch touch events
    ///
    /// Blocks until the kernel delivers input, then returns the decoded
    /// touch events (possibly none).
    ///
    /// # Errors
    ///
    /// Returns `Touchscreen` error if reading fails (e.g., device unplugged).
    pub fn fetch_events(&mut self) -> Result<Vec<PlatformEvent>> {
        let raw = self
            .device
            .fetch_events()
            .map_err(|e| TouchControllerError::Touchscreen(format!("Failed to fetch events: {}", e)))?;

        let mut events = Vec::new();
        for event in raw {
            events.extend(self.decoder.process_event(&event));
        }
        Ok(events)
    }
}

/// Runs the touchscreen on a dedicated thread, delivering events into the feed.
///
/// The thread ends when the device fails or the feed is closed.
pub fn spawn_reader(mut touchscreen: Touchscreen, sender: FeedSender) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("touchscreen".to_string())
        .spawn(move || loop {
            let events = match touchscreen.fetch_events() {
                Ok(events) => events,
                Err(e) => {
                    warn!("Touchscreen reader stopped: {}", e);
                    return;
                }
            };

            for event in events {
                if let Err(TouchControllerError::FeedClosed) = sender.deliver(event) {
                    debug!("Input feed closed, stopping touchscreen reader");
                    return;
                }
            }
        })
}
