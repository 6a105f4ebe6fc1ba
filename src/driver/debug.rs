//! Debug driver — logs every event instead of calling a vendor
//!
//! Useful while wiring a new site: enable the `debug` token next to real
//! vendors and every dispatched event shows up in the `tracing` output,
//! custom events rendered the way they were negotiated for this driver.

use crate::driver::routes::EventRoutes;
use crate::driver::{AnalyticsDriver, DriverContext};
use crate::environment::Variant;
use crate::error::Result;
use crate::event::{Event, EventData, EventName};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

pub const BROWSER_DRIVER_NAME: &str = "DebugBrowserDriver";
pub const SERVER_DRIVER_NAME: &str = "DebugServerDriver";

pub struct DebugDriver {
    name: &'static str,
    variant: Variant,
    routes: EventRoutes<DebugDriver>,
}

impl DebugDriver {
    pub fn new(variant: Variant) -> Result<Self> {
        let name = match variant {
            Variant::Browser => BROWSER_DRIVER_NAME,
            Variant::Server => SERVER_DRIVER_NAME,
        };
        let routes = EventRoutes::<DebugDriver>::builder(name)
            .declare(&EventName::ALL)
            .route_all(&EventName::ALL, log_event)
            .accept_custom()
            .build()?;

        Ok(Self {
            name,
            variant,
            routes,
        })
    }
}

#[async_trait]
impl AnalyticsDriver for DebugDriver {
    fn name(&self) -> &str {
        self.name
    }

    async fn load(&self) -> bool {
        tracing::debug!(driver = self.name, "Load");
        true
    }

    fn supports_event(&self, event: &Event) -> bool {
        self.routes.supports(event)
    }

    async fn track(&self, event: &Event) -> Result<()> {
        match event {
            Event::Standard(data) => self.routes.route(self, data).await,
            Event::Custom(custom) => {
                if !self.routes.supports(event) {
                    return Err(self.routes.unsupported(event));
                }
                match custom.negotiate(self.name)? {
                    Some(negotiated) => {
                        let kind = negotiated.event_type;
                        let payload = negotiated.into_value();
                        tracing::info!(
                            driver = self.name,
                            variant = %self.variant,
                            event = %custom.name(),
                            ?kind,
                            %payload,
                            "Custom event"
                        );
                    }
                    None => tracing::info!(
                        driver = self.name,
                        event = %custom.name(),
                        "Custom event opted out"
                    ),
                }
                Ok(())
            }
        }
    }
}

fn log_event<'a>(driver: &'a DebugDriver, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let payload = serde_json::to_string(data)?;
        tracing::info!(
            driver = driver.name,
            variant = %driver.variant,
            event = %data.name(),
            %payload,
            "Event"
        );
        Ok(())
    })
}

pub fn construct_browser(_ctx: &DriverContext) -> Result<Arc<dyn AnalyticsDriver>> {
    Ok(Arc::new(DebugDriver::new(Variant::Browser)?))
}

pub fn construct_server(_ctx: &DriverContext) -> Result<Arc<dyn AnalyticsDriver>> {
    Ok(Arc::new(DebugDriver::new(Variant::Server)?))
}
