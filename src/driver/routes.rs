//! Event routing table for drivers
//!
//! A driver's capability set and its per-event handlers are declared
//! together and checked against each other when the driver is built, so
//! `supports_event` and `track` cannot drift apart.

use crate::error::{Result, TrackError};
use crate::event::{is_custom_name, Event, EventData, EventName};
use futures::future::BoxFuture;
use std::collections::{BTreeSet, HashMap};

/// Per-event handler operating on driver state `S`
pub type Handler<S> = for<'a> fn(&'a S, &'a EventData) -> BoxFuture<'a, Result<()>>;

/// Validated mapping from standard event names to handlers
pub struct EventRoutes<S> {
    driver: String,
    handlers: HashMap<EventName, Handler<S>>,
    accepts_custom: bool,
}

impl<S> EventRoutes<S> {
    pub fn builder(driver: impl Into<String>) -> RoutesBuilder<S> {
        RoutesBuilder {
            driver: driver.into(),
            declared: Vec::new(),
            handlers: Vec::new(),
            accepts_custom: false,
        }
    }

    /// Capability check used by `AnalyticsDriver::supports_event`
    pub fn supports(&self, event: &Event) -> bool {
        match event {
            Event::Standard(data) => self.handlers.contains_key(&data.name()),
            Event::Custom(custom) => self.accepts_custom && is_custom_name(custom.name()),
        }
    }

    /// Declared standard events, sorted
    pub fn capabilities(&self) -> Vec<EventName> {
        let mut names: Vec<EventName> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }

    pub fn accepts_custom(&self) -> bool {
        self.accepts_custom
    }

    /// Run the handler registered for the payload's event name
    pub async fn route(&self, state: &S, data: &EventData) -> Result<()> {
        let handler = self.handlers.get(&data.name()).ok_or_else(|| {
            TrackError::UnsupportedEvent {
                driver: self.driver.clone(),
                event: data.name().to_string(),
            }
        })?;
        handler(state, data).await
    }

    /// Error for an event that reached `track` without being declared
    pub fn unsupported(&self, event: &Event) -> TrackError {
        TrackError::UnsupportedEvent {
            driver: self.driver.clone(),
            event: event.name().to_string(),
        }
    }
}

/// Collects declarations and handlers before validation
pub struct RoutesBuilder<S> {
    driver: String,
    declared: Vec<EventName>,
    handlers: Vec<(EventName, Handler<S>)>,
    accepts_custom: bool,
}

impl<S> RoutesBuilder<S> {
    /// Declare the standard events the driver supports
    pub fn declare(mut self, names: &[EventName]) -> Self {
        self.declared.extend_from_slice(names);
        self
    }

    /// Register the handler for one event name
    pub fn route(mut self, name: EventName, handler: Handler<S>) -> Self {
        self.handlers.push((name, handler));
        self
    }

    /// Register one handler for several event names
    pub fn route_all(mut self, names: &[EventName], handler: Handler<S>) -> Self {
        for name in names {
            self.handlers.push((*name, handler));
        }
        self
    }

    /// Accept every event in the `custom.` namespace
    pub fn accept_custom(mut self) -> Self {
        self.accepts_custom = true;
        self
    }

    /// Check declarations and handlers match one-to-one
    pub fn build(self) -> Result<EventRoutes<S>> {
        let construct = |reason: String| TrackError::Construct {
            driver: self.driver.clone(),
            reason,
        };

        let declared: BTreeSet<EventName> = self.declared.iter().copied().collect();
        if declared.len() != self.declared.len() {
            return Err(construct("an event is declared more than once".to_string()));
        }

        let mut handlers = HashMap::with_capacity(self.handlers.len());
        for (name, handler) in &self.handlers {
            if handlers.insert(*name, *handler).is_some() {
                return Err(construct(format!("event {} has two handlers", name)));
            }
            if !declared.contains(name) {
                return Err(construct(format!(
                    "event {} has a handler but is not declared",
                    name
                )));
            }
        }

        if let Some(missing) = declared.iter().find(|name| !handlers.contains_key(*name)) {
            return Err(construct(format!(
                "event {} is declared but has no handler",
                missing
            )));
        }

        Ok(EventRoutes {
            driver: self.driver,
            handlers,
            accepts_custom: self.accepts_custom,
        })
    }
}
