//! # Error Types
//!
//! Custom error types for the touch controller using `thiserror`.

use thiserror::Error;

/// Main error type for the touch controller
#[derive(Debug, Error)]
pub enum TouchControllerError {
    /// Configuration errors (parse and validation)
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Touchscreen device errors
    #[error("Touchscreen error: {0}")]
    Touchscreen(String),

    /// No multitouch touchscreen present on the system
    #[error("No multitouch touchscreen found")]
    TouchscreenNotFound,

    /// Button added with an empty rectangle
    #[error("Invalid button geometry: {width}x{height}")]
    InvalidButtonGeometry { width: i32, height: i32 },

    /// Input feed queue is full, the event was dropped
    #[error("Input feed is full")]
    FeedFull,

    /// Receiving side of the input feed was dropped
    #[error("Input feed is closed")]
    FeedClosed,

    /// Malformed line in a replay recording
    #[error("Replay error at line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Telemetry serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Result type alias for the touch controller
pub type Result<T> = std::result::Result<T, TouchControllerError>;
