//! Dispatcher — fans each event out to the configured drivers
//!
//! ```text
//! dispatch(event)
//!     │
//!     ├──► token 1 ──► load once ──► supports? ──► track ──► outcome
//!     ├──► token 2 ──► load once ──► supports? ──► track ──► outcome
//!     └──► token N ──► (skipped: load failed)     ──────────► outcome
//! ```
//!
//! ## Rules
//! - **At most one load per token**: factory, constructor and `load()` run
//!   once per dispatcher, even under concurrent dispatches or when the
//!   dispatch that started the load is dropped
//! - **Failed loads are sticky**: a driver that failed to load is skipped for
//!   the rest of the session
//! - **Capability filtering**: `track` is only called when `supports_event`
//!   accepts the event
//! - **Isolation**: a failing or panicking driver, including a panic in its
//!   capability check, never affects its siblings; `dispatch` itself never
//!   fails
//! - **Per-driver order**: `track` calls on one driver run one at a time, in
//!   the order dispatches reach it

use crate::catalog::DriverCatalog;
use crate::config::{AvailabilityPolicy, DispatcherConfig};
use crate::driver::{AnalyticsDriver, DriverContext, DriverToken};
use crate::environment::{resolver_for, Variant};
use crate::error::{Result, TrackError};
use crate::event::Event;
use crate::failures::{FailureSink, MemoryFailureSink, TrackingFailure};
use crate::host::HostGlobals;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A loaded driver and the lock that keeps its `track` calls in order
#[derive(Clone)]
struct ReadyDriver {
    driver: Arc<dyn AnalyticsDriver>,
    name: String,
    module: String,
    variant: Variant,
    order: Arc<Mutex<()>>,
}

/// Cached outcome of loading one token
#[derive(Clone)]
enum DriverSlot {
    Ready(ReadyDriver),
    Skipped {
        driver: Option<String>,
        reason: String,
    },
}

impl DriverSlot {
    fn status(&self) -> DriverStatus {
        match self {
            DriverSlot::Ready(ready) => DriverStatus::Ready {
                driver: ready.name.clone(),
                module: ready.module.clone(),
                variant: ready.variant,
            },
            DriverSlot::Skipped { driver, reason } => DriverStatus::Skipped {
                driver: driver.clone(),
                reason: reason.clone(),
            },
        }
    }
}

/// In-flight or finished load of one token, shared by every caller
///
/// The future lives in the dispatcher, not in the caller that started it,
/// so a dispatch cancelled mid-load leaves the load to be finished by the
/// next caller instead of starting it again.
type SlotLoad = Shared<BoxFuture<'static, DriverSlot>>;

/// Load state of one configured driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum DriverStatus {
    /// Loaded and receiving events
    Ready {
        driver: String,
        module: String,
        variant: Variant,
    },
    /// Excluded from dispatch for the rest of the session
    Skipped {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver: Option<String>,
        reason: String,
    },
}

/// What happened to one driver during a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum OutcomeStatus {
    /// `track` completed
    Delivered,
    /// The driver does not handle this event
    NotSupported,
    /// The driver is not loaded
    Skipped { reason: String },
    /// `track` returned an error or panicked
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOutcome {
    pub token: DriverToken,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Aggregate of per-driver outcomes for one dispatched event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Correlation id (dsp-<uuid>)
    pub dispatch_id: String,

    /// Name of the dispatched event
    pub event: String,

    /// One outcome per configured token, in configuration order
    pub outcomes: Vec<DriverOutcome>,
}

impl DispatchReport {
    pub fn outcome(&self, token: &str) -> Option<&DriverOutcome> {
        self.outcomes.iter().find(|o| o.token.as_str() == token)
    }

    pub fn delivered(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Delivered))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, OutcomeStatus::Skipped { .. }))
    }

    pub fn failures(&self) -> Vec<&DriverOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
            .collect()
    }

    /// No driver failed to track the event
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }

    fn count(&self, predicate: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Fans events out to lazily loaded drivers
///
/// Holds the immutable catalog plus the mutable per-session cache of
/// loaded driver instances. Safe to share across tasks.
pub struct Dispatcher {
    catalog: Arc<DriverCatalog>,
    tokens: Vec<DriverToken>,
    globals: HostGlobals,
    availability: AvailabilityPolicy,

    /// token → load-once future
    slots: Mutex<HashMap<DriverToken, SlotLoad>>,

    failures: Arc<dyn FailureSink>,
}

impl Dispatcher {
    /// Create a dispatcher over an explicit catalog
    ///
    /// Variant selection belongs to the catalog's resolver; the config's
    /// `environment` is only consulted by [`Dispatcher::from_config`].
    pub fn new(
        catalog: Arc<DriverCatalog>,
        config: DispatcherConfig,
        globals: HostGlobals,
    ) -> Result<Self> {
        config.validate()?;

        for token in &config.drivers {
            if !catalog.contains(&DriverToken::new(token.as_str())) {
                tracing::warn!(token = %token, "Configured driver has no catalog entry");
            }
        }

        Ok(Self {
            catalog,
            tokens: config.drivers.iter().map(|t| DriverToken::new(t.as_str())).collect(),
            globals,
            availability: config.availability,
            slots: Mutex::new(HashMap::new()),
            failures: Arc::new(MemoryFailureSink::new(config.failure_log_capacity)),
        })
    }

    /// Create a dispatcher over the built-in catalog
    pub fn from_config(config: DispatcherConfig, globals: HostGlobals) -> Result<Self> {
        let catalog = DriverCatalog::standard(resolver_for(config.environment));
        Self::new(Arc::new(catalog), config, globals)
    }

    /// Replace the failure sink
    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failures = sink;
        self
    }

    pub fn tokens(&self) -> &[DriverToken] {
        &self.tokens
    }

    pub fn failures(&self) -> Arc<dyn FailureSink> {
        Arc::clone(&self.failures)
    }

    pub fn catalog(&self) -> &DriverCatalog {
        &self.catalog
    }

    /// Deliver an event to every loaded driver that supports it
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        let dispatch_id = format!("dsp-{}", uuid::Uuid::new_v4());

        let outcomes =
            join_all(self.tokens.iter().map(|token| self.deliver(token, event))).await;

        for outcome in &outcomes {
            if let OutcomeStatus::Failed { error } = &outcome.status {
                let failure = TrackingFailure::track(
                    outcome.token.as_str(),
                    outcome.driver.clone().unwrap_or_default(),
                    event.name(),
                    error.clone(),
                );
                if let Err(e) = self.failures.record(failure).await {
                    tracing::warn!(error = %e, "Failed to record tracking failure");
                }
            }
        }

        let report = DispatchReport {
            dispatch_id,
            event: event.name().to_string(),
            outcomes,
        };

        tracing::debug!(
            dispatch_id = %report.dispatch_id,
            event = %report.event,
            delivered = report.delivered(),
            failed = report.failures().len(),
            skipped = report.skipped(),
            "Event dispatched"
        );

        report
    }

    /// Load every configured driver without dispatching anything
    pub async fn preload(&self) -> Vec<(DriverToken, DriverStatus)> {
        let slots = join_all(self.tokens.iter().map(|token| self.slot(token))).await;
        self.tokens
            .iter()
            .cloned()
            .zip(slots.iter().map(DriverSlot::status))
            .collect()
    }

    /// Load state of a token, `None` until its first load completes
    pub async fn driver_status(&self, token: &str) -> Option<DriverStatus> {
        let slots = self.slots.lock().await;
        let status = slots
            .get(&DriverToken::new(token))
            .and_then(|load| load.peek())
            .map(DriverSlot::status);
        status
    }

    /// Names of loaded drivers, in configuration order
    pub async fn loaded_drivers(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let names = self
            .tokens
            .iter()
            .filter_map(|token| slots.get(token)?.peek())
            .filter_map(|slot| match slot {
                DriverSlot::Ready(ready) => Some(ready.name.clone()),
                DriverSlot::Skipped { .. } => None,
            })
            .collect();
        names
    }

    async fn slot(&self, token: &DriverToken) -> DriverSlot {
        let load = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(token.clone())
                .or_insert_with(|| self.loader().load(token.clone()).boxed().shared())
                .clone()
        };
        load.await
    }

    fn loader(&self) -> Loader {
        Loader {
            catalog: Arc::clone(&self.catalog),
            globals: self.globals.clone(),
            availability: self.availability,
            failures: Arc::clone(&self.failures),
        }
    }

    async fn deliver(&self, token: &DriverToken, event: &Event) -> DriverOutcome {
        let ready = match self.slot(token).await {
            DriverSlot::Ready(ready) => ready,
            DriverSlot::Skipped { driver, reason } => {
                return DriverOutcome {
                    token: token.clone(),
                    driver,
                    status: OutcomeStatus::Skipped { reason },
                }
            }
        };

        let name = ready.name.clone();
        let supported = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            ready.driver.supports_event(event)
        })) {
            Ok(supported) => supported,
            Err(panic) => {
                let error = format!(
                    "driver panicked in supports_event: {}",
                    panic_message(&*panic)
                );
                tracing::warn!(
                    driver = %name,
                    event = %event.name(),
                    error = %error,
                    "Capability check failed"
                );
                return DriverOutcome {
                    token: token.clone(),
                    driver: Some(name),
                    status: OutcomeStatus::Failed { error },
                };
            }
        };

        if !supported {
            tracing::debug!(driver = %name, event = %event.name(), "Event not supported");
            return DriverOutcome {
                token: token.clone(),
                driver: Some(name),
                status: OutcomeStatus::NotSupported,
            };
        }

        let status = {
            let _order = ready.order.lock().await;
            match AssertUnwindSafe(ready.driver.track(event)).catch_unwind().await {
                Ok(Ok(())) => OutcomeStatus::Delivered,
                Ok(Err(e)) => OutcomeStatus::Failed {
                    error: e.to_string(),
                },
                Err(panic) => OutcomeStatus::Failed {
                    error: format!("driver panicked: {}", panic_message(&*panic)),
                },
            }
        };

        if let OutcomeStatus::Failed { error } = &status {
            tracing::warn!(driver = %name, event = %event.name(), error = %error, "Tracking failed");
        }

        DriverOutcome {
            token: token.clone(),
            driver: Some(name),
            status,
        }
    }
}

/// Everything a token load needs, detached from the dispatcher's lifetime
struct Loader {
    catalog: Arc<DriverCatalog>,
    globals: HostGlobals,
    availability: AvailabilityPolicy,
    failures: Arc<dyn FailureSink>,
}

impl Loader {
    async fn load(self, token: DriverToken) -> DriverSlot {
        let slot = match AssertUnwindSafe(self.try_load(&token)).catch_unwind().await {
            Ok(slot) => slot,
            Err(panic) => DriverSlot::Skipped {
                driver: None,
                reason: format!("driver panicked while loading: {}", panic_message(&*panic)),
            },
        };

        match &slot {
            DriverSlot::Ready(ready) => tracing::info!(
                token = %token,
                driver = %ready.name,
                module = %ready.module,
                variant = %ready.variant,
                "Driver loaded"
            ),
            DriverSlot::Skipped { driver, reason } => {
                tracing::warn!(token = %token, ?driver, reason = %reason, "Driver skipped");
                let failure = TrackingFailure::load(token.as_str(), driver.clone(), reason.clone());
                if let Err(e) = self.failures.record(failure).await {
                    tracing::warn!(error = %e, "Failed to record load failure");
                }
            }
        }

        slot
    }

    async fn try_load(&self, token: &DriverToken) -> DriverSlot {
        let skipped = |driver: Option<String>, reason: String| DriverSlot::Skipped { driver, reason };

        let factory = match self.catalog.factory(token) {
            Some(factory) => factory,
            None => return skipped(None, TrackError::UnknownDriver(token.to_string()).to_string()),
        };

        let resolved = match factory().await {
            Ok(resolved) => resolved,
            Err(e) => return skipped(None, e.to_string()),
        };

        let ctx = DriverContext::new(self.globals.clone(), self.availability, resolved.variant);
        let driver = match (resolved.constructor)(&ctx) {
            Ok(driver) => driver,
            Err(e) => return skipped(None, e.to_string()),
        };

        let name = driver.name().to_string();
        if !driver.load().await {
            return skipped(Some(name.clone()), format!("{} did not become available", name));
        }

        DriverSlot::Ready(ReadyDriver {
            driver,
            name,
            module: resolved.module,
            variant: resolved.variant,
            order: Arc::new(Mutex::new(())),
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
