//! Synerise server driver
//!
//! The Synerise tracker only exists in the browser. On the server the
//! driver loads successfully but declares no events, so the dispatcher
//! routes nothing to it.

use crate::driver::routes::EventRoutes;
use crate::driver::{AnalyticsDriver, DriverContext};
use crate::error::Result;
use crate::event::Event;
use async_trait::async_trait;
use std::sync::Arc;

pub const DRIVER_NAME: &str = "SyneriseServerDriver";

pub struct SyneriseServerDriver {
    routes: EventRoutes<()>,
}

impl SyneriseServerDriver {
    pub fn new(_ctx: &DriverContext) -> Result<Self> {
        Ok(Self {
            routes: EventRoutes::<()>::builder(DRIVER_NAME).build()?,
        })
    }
}

#[async_trait]
impl AnalyticsDriver for SyneriseServerDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn load(&self) -> bool {
        true
    }

    fn supports_event(&self, event: &Event) -> bool {
        self.routes.supports(event)
    }

    async fn track(&self, event: &Event) -> Result<()> {
        Err(self.routes.unsupported(event))
    }
}

pub fn construct(ctx: &DriverContext) -> Result<Arc<dyn AnalyticsDriver>> {
    Ok(Arc::new(SyneriseServerDriver::new(ctx)?))
}
