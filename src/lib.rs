//! # a3s-trackify
//!
//! Analytics event dispatch with lazily loaded, pluggable vendor drivers for
//! the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-trackify` takes a single application-level event ("page viewed",
//! "item added to cart", …) and fans it out to every configured analytics
//! vendor. Each vendor is a driver selected by a short token; drivers are
//! loaded on first use, in their browser or server variant, and only receive
//! the events they declare support for. A failing vendor never affects the
//! application or the other vendors.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_trackify::{Dispatcher, DispatcherConfig, EnvironmentMode, Event, HostGlobals};
//! use a3s_trackify::event::PageViewConfig;
//!
//! # async fn example() -> a3s_trackify::Result<()> {
//! let config = DispatcherConfig::with_drivers(["debug"]).environment(EnvironmentMode::Server);
//! let dispatcher = Dispatcher::from_config(config, HostGlobals::new())?;
//!
//! let event = Event::page_view(PageViewConfig {
//!     page_path: "home".to_string(),
//!     page_title: "Home".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let report = dispatcher.dispatch(&event).await;
//! println!("{}: delivered to {} driver(s)", report.dispatch_id, report.delivered());
//! # Ok(())
//! # }
//! ```
//!
//! ## Drivers
//!
//! - **debug** — Logs every event through `tracing`
//! - **synerise** — Synerise tracker (`SR` global); inert on servers
//!
//! ## Architecture
//!
//! - **AnalyticsDriver** trait — contract every vendor integration implements
//! - **DriverCatalog** — token → variant-aware lazy factory
//! - **Dispatcher** — loads drivers once, filters by capability, isolates failures
//! - **Event** — closed set of standard events plus negotiated custom events

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod environment;
pub mod error;
pub mod event;
pub mod failures;
pub mod host;

// Re-export core types
pub use catalog::{load_variant, DriverCatalog, DriverCatalogBuilder, DriverFactory, DriverModule};
pub use config::{AvailabilityPolicy, DispatcherConfig, EnvironmentMode};
pub use dispatcher::{DispatchReport, Dispatcher, DriverOutcome, DriverStatus, OutcomeStatus};
pub use driver::{AnalyticsDriver, DriverConstructor, DriverContext, DriverToken};
pub use environment::{EnvironmentResolver, FixedEnvironment, HostEnvironment, Variant};
pub use error::{Result, TrackError};
pub use event::{CustomEvent, DeliveryKind, Event, EventData, EventName, NegotiatedEvent};
pub use failures::{FailureKind, FailureSink, MemoryFailureSink, TrackingFailure};
pub use host::HostGlobals;

// Re-export drivers for convenience
pub use driver::debug::DebugDriver;
pub use driver::synerise::{SyneriseBrowserDriver, SyneriseSdk, SyneriseServerDriver};
