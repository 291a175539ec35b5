//! # Platform Module
//!
//! Sources of raw platform events.
//!
//! This module handles:
//! - Linux evdev touchscreen detection and multitouch decoding
//! - Replaying recorded sessions from JSON Lines files
//!
//! Both sources deliver [`PlatformEvent`](crate::touch::PlatformEvent)s
//! through the input feed.

pub mod replay;
pub mod touchscreen;

pub use touchscreen::Touchscreen;
