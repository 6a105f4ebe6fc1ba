//! Error types for a3s-trackify

use thiserror::Error;

/// Errors that can occur while loading drivers or tracking events
#[derive(Debug, Error)]
pub enum TrackError {
    /// A configured driver token has no catalog entry
    #[error("Unknown driver token: {0}")]
    UnknownDriver(String),

    /// A driver variant module could not be resolved
    #[error("Failed to load driver module '{module}': {reason}")]
    ModuleLoad { module: String, reason: String },

    /// A driver constructor rejected its configuration
    #[error("Failed to construct driver '{driver}': {reason}")]
    Construct { driver: String, reason: String },

    /// `track` was called with an event the driver does not declare
    #[error("Event {event} not supported by {driver}")]
    UnsupportedEvent { driver: String, event: String },

    /// A custom event negotiated a payload missing a required field
    #[error("Custom event {event} has to provide a valid {field} for {driver} [forDriver.{field}]")]
    MalformedPayload {
        event: String,
        driver: String,
        field: &'static str,
    },

    /// The vendor SDK call failed
    #[error("Vendor call failed in {driver}: {reason}")]
    Vendor { driver: String, reason: String },

    /// Event construction received data of the wrong shape
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackError {
    /// Build a vendor-call failure for the named driver
    pub fn vendor(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Vendor {
            driver: driver.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackError>;
