//! Driver contract — the core abstraction for vendor integrations
//!
//! Every vendor integration (Synerise, debug logging, …) implements
//! `AnalyticsDriver`. A driver declares which events it understands, loads
//! its vendor SDK once, and maps generic events onto vendor calls. Failure
//! isolation between drivers is the dispatcher's job, not the driver's.

use crate::config::AvailabilityPolicy;
use crate::environment::Variant;
use crate::error::Result;
use crate::event::Event;
use crate::host::HostGlobals;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod availability;
pub mod debug;
pub mod routes;
pub mod synerise;

pub use availability::wait_for_global;
pub use routes::{EventRoutes, Handler, RoutesBuilder};

/// Well-known driver tokens
pub mod tokens {
    /// Logs every event through `tracing`
    pub const DEBUG: &str = "debug";
    /// Synerise customer data platform
    pub const SYNERISE: &str = "synerise";
}

/// Stable identifier of a vendor integration, shared by both variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverToken(String);

impl DriverToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DriverToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for DriverToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Everything a constructor may use to build a driver instance
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Where vendor SDK handles are published
    pub globals: HostGlobals,

    /// Bounded availability poll used by `load()`
    pub availability: AvailabilityPolicy,

    /// Variant selected for this instance
    pub variant: Variant,
}

impl DriverContext {
    pub fn new(globals: HostGlobals, availability: AvailabilityPolicy, variant: Variant) -> Self {
        Self {
            globals,
            availability,
            variant,
        }
    }
}

/// Core trait for analytics drivers
///
/// Implementations must keep `supports_event` and `track` consistent:
/// the dispatcher only calls `track` for events `supports_event` accepts.
#[async_trait]
pub trait AnalyticsDriver: Send + Sync {
    /// Stable driver name, also the key for custom-event negotiation
    fn name(&self) -> &str;

    /// Initialize the vendor SDK
    ///
    /// Resolves `true` once the vendor is available and `false` after the
    /// bounded availability poll gives up. Never panics on vendor absence;
    /// repeated calls return the first outcome without polling again.
    async fn load(&self) -> bool;

    /// Whether the driver recognizes `event.name()`
    fn supports_event(&self, event: &Event) -> bool;

    /// Map the event onto a vendor call and perform it
    ///
    /// Custom events the driver opts out of resolve `Ok(())` without a
    /// vendor call. Vendor failures are returned, never swallowed.
    async fn track(&self, event: &Event) -> Result<()>;
}

/// Builds a driver instance from a resolved variant module
pub type DriverConstructor =
    Arc<dyn Fn(&DriverContext) -> Result<Arc<dyn AnalyticsDriver>> + Send + Sync>;
