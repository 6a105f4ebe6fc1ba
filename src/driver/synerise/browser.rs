//! Synerise browser driver — maps commerce events onto the `SR` tracker

use super::sdk::{PageVisit, SyneriseHandle, GLOBAL_NAME};
use crate::config::AvailabilityPolicy;
use crate::driver::availability::wait_for_global;
use crate::driver::routes::EventRoutes;
use crate::driver::{AnalyticsDriver, DriverContext};
use crate::error::{Result, TrackError};
use crate::event::{
    CustomEvent, DeliveryKind, Event, EventData, EventName, Item, LoginConfig, PageViewConfig,
    SignUpConfig, SubscribeConfig, UserDataConfig, ViewCartConfig,
};
use crate::host::HostGlobals;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const DRIVER_NAME: &str = "SyneriseBrowserDriver";

/// Standard events the browser driver declares
pub const SUPPORTED_EVENTS: [EventName; 12] = [
    EventName::PageView,
    EventName::UserDataUpdate,
    EventName::Subscribe,
    EventName::Unsubscribe,
    EventName::AddPaymentInfo,
    EventName::AddToCart,
    EventName::Purchase,
    EventName::ViewCart,
    EventName::ViewItem,
    EventName::ViewItemList,
    EventName::Login,
    EventName::SignUp,
];

/// Declared events Synerise collects on its own; accepted without a call
const PASSIVE_EVENTS: [EventName; 5] = [
    EventName::AddPaymentInfo,
    EventName::AddToCart,
    EventName::Purchase,
    EventName::ViewItem,
    EventName::ViewItemList,
];

/// Acquired vendor handle plus the calls built on it
pub struct SyneriseClient {
    sdk: SyneriseHandle,
}

impl SyneriseClient {
    pub fn new(sdk: SyneriseHandle) -> Self {
        Self { sdk }
    }

    async fn page_visit(&self, visit: PageVisit) -> Result<()> {
        self.sdk
            .page_visit(visit)
            .await
            .map_err(|e| TrackError::vendor(DRIVER_NAME, e.to_string()))?;

        // Refresh failure leaves the recorded visit intact
        if let Err(e) = self.sdk.refresh_dynamic_content() {
            tracing::warn!(driver = DRIVER_NAME, error = %e, "Dynamic content refresh failed");
        }
        Ok(())
    }

    fn push(
        &self,
        event_name: &str,
        payload: Option<&Map<String, Value>>,
        label: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(driver = DRIVER_NAME, event_name, ?label, "trackCustomEvent");
        self.sdk
            .track_custom_event(event_name, payload, label)
            .map_err(|e| TrackError::vendor(DRIVER_NAME, e.to_string()))
    }

    fn send_form(
        &self,
        event_name: &str,
        payload: Option<&Map<String, Value>>,
        mapping: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        tracing::debug!(driver = DRIVER_NAME, event_name, "sendFormData");
        self.sdk
            .send_form_data(event_name, payload, mapping)
            .map_err(|e| TrackError::vendor(DRIVER_NAME, e.to_string()))
    }
}

/// Browser variant of the Synerise driver
pub struct SyneriseBrowserDriver {
    globals: HostGlobals,
    availability: AvailabilityPolicy,
    client: OnceCell<Option<SyneriseClient>>,
    routes: EventRoutes<SyneriseClient>,
}

impl SyneriseBrowserDriver {
    pub fn new(ctx: &DriverContext) -> Result<Self> {
        let routes = EventRoutes::<SyneriseClient>::builder(DRIVER_NAME)
            .declare(&SUPPORTED_EVENTS)
            .route(EventName::PageView, track_page_view)
            .route(EventName::UserDataUpdate, update_user_data)
            .route(EventName::Subscribe, subscribe)
            .route(EventName::Unsubscribe, unsubscribe)
            .route(EventName::ViewCart, track_view_cart)
            .route(EventName::Login, track_login)
            .route(EventName::SignUp, track_sign_up)
            .route_all(&PASSIVE_EVENTS, passive)
            .accept_custom()
            .build()?;

        Ok(Self {
            globals: ctx.globals.clone(),
            availability: ctx.availability,
            client: OnceCell::new(),
            routes,
        })
    }

    fn client(&self) -> Result<&SyneriseClient> {
        self.client
            .get()
            .and_then(Option::as_ref)
            .ok_or_else(|| TrackError::vendor(DRIVER_NAME, "Synerise tracker is not loaded"))
    }

    async fn track_custom(&self, client: &SyneriseClient, event: &CustomEvent) -> Result<()> {
        let negotiated = match event.negotiate(DRIVER_NAME)? {
            Some(negotiated) => negotiated,
            None => {
                tracing::debug!(driver = DRIVER_NAME, event = %event.name(), "Custom event skipped");
                return Ok(());
            }
        };

        match negotiated.event_type {
            DeliveryKind::Form => client.send_form(
                &negotiated.event_name,
                negotiated.event_payload.as_ref(),
                negotiated.event_mapping.as_ref(),
            ),
            DeliveryKind::Push => client.push(
                &negotiated.event_name,
                negotiated.event_payload.as_ref(),
                negotiated.label.as_deref(),
            ),
        }
    }
}

#[async_trait]
impl AnalyticsDriver for SyneriseBrowserDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn load(&self) -> bool {
        tracing::debug!(driver = DRIVER_NAME, "Load");
        self.client
            .get_or_init(|| async {
                wait_for_global::<SyneriseHandle>(&self.globals, GLOBAL_NAME, &self.availability)
                    .await
                    .map(SyneriseClient::new)
            })
            .await
            .is_some()
    }

    fn supports_event(&self, event: &Event) -> bool {
        self.routes.supports(event)
    }

    async fn track(&self, event: &Event) -> Result<()> {
        if !self.routes.supports(event) {
            return Err(self.routes.unsupported(event));
        }
        let client = self.client()?;
        tracing::debug!(driver = DRIVER_NAME, event = %event.name(), "track");

        match event {
            Event::Custom(custom) => self.track_custom(client, custom).await,
            Event::Standard(data) => self.routes.route(client, data).await,
        }
    }
}

/// Build the browser driver behind the catalog's constructor seam
pub fn construct(ctx: &DriverContext) -> Result<Arc<dyn AnalyticsDriver>> {
    Ok(Arc::new(SyneriseBrowserDriver::new(ctx)?))
}

/// Round half-cent noise off monetary amounts
pub fn monetary_value(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

fn to_payload<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(TrackError::vendor(
            DRIVER_NAME,
            format!("expected an object payload, got {}", other),
        )),
    }
}

/// Collect the non-empty fields of a `json!` object
fn compact(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}

fn products(items: &[Item]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| {
                Value::Object(compact(json!({
                    "sku": item.id,
                    "quantity": item.quantity,
                    "brand": item.brand,
                    "category": item.category,
                })))
            })
            .collect(),
    )
}

fn mismatch(data: &EventData) -> TrackError {
    TrackError::UnsupportedEvent {
        driver: DRIVER_NAME.to_string(),
        event: data.name().to_string(),
    }
}

fn track_page_view<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::PageView(PageViewConfig {
            page_path,
            page_title,
            currency,
            ..
        }) = data
        else {
            return Err(mismatch(data));
        };

        client
            .page_visit(PageVisit {
                uri: format!("/{}", page_path),
                title: page_title.clone(),
                currency: currency.clone(),
            })
            .await
    })
}

fn update_user_data<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::UserDataUpdate(config) = data else {
            return Err(mismatch(data));
        };
        let payload = to_payload::<UserDataConfig>(config)?;
        client.push(
            "client.createOrUpdate",
            Some(&payload),
            Some("Client update data in account"),
        )
    })
}

fn subscribe<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::Subscribe(SubscribeConfig {
            email,
            list,
            allow_marketing,
            allow_sms_marketing,
            allow_policy,
            language,
            ..
        }) = data
        else {
            return Err(mismatch(data));
        };

        let payload = compact(json!({
            "email": email,
            "list": list,
            "smsOffers": allow_sms_marketing,
            "emailOffers": allow_marketing,
            "allowPolicy": allow_policy,
            "newsletterLanguage": language,
        }));
        client.send_form("newsletter-agreement", Some(&payload), None)
    })
}

fn unsubscribe<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::Unsubscribe(SubscribeConfig { email, .. }) = data else {
            return Err(mismatch(data));
        };
        let payload = compact(json!({ "email": email }));
        client.send_form("newsletter-unsubscribe", Some(&payload), None)
    })
}

fn track_view_cart<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::ViewCart(ViewCartConfig {
            currency,
            value,
            total_quantity,
            items,
            ..
        }) = data
        else {
            return Err(mismatch(data));
        };

        let payload = compact(json!({
            "currency": currency,
            "totalQuantity": total_quantity,
            "value": monetary_value(*value),
            "products": products(items),
        }));
        client.push("cart.status", Some(&payload), None)
    })
}

fn track_login<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::Login(config) = data else {
            return Err(mismatch(data));
        };
        let payload = to_payload::<LoginConfig>(config)?;
        client.send_form("login", Some(&payload), None)
    })
}

fn track_sign_up<'a>(client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let EventData::SignUp(config) = data else {
            return Err(mismatch(data));
        };
        let payload = to_payload::<SignUpConfig>(config)?;
        client.send_form("signup", Some(&payload), None)
    })
}

fn passive<'a>(_client: &'a SyneriseClient, data: &'a EventData) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        tracing::debug!(driver = DRIVER_NAME, event = %data.name(), "Collected by tracker, no call");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monetary_value() {
        assert_eq!(monetary_value(10.0), 10.0);
        assert_eq!(monetary_value(12.3456), 12.35);
        assert_eq!(monetary_value(19.999), 20.0);
        assert_eq!(monetary_value(0.0), 0.0);
    }

    #[test]
    fn test_compact_drops_nulls() {
        let map = compact(json!({"email": "a@example.com", "list": null}));
        assert_eq!(map.len(), 1);
        assert_eq!(map["email"], "a@example.com");
    }

    #[test]
    fn test_products_mapping() {
        let items = vec![Item::new("sku-1").quantity(2).brand("Acme"), Item::new("sku-2")];
        let value = products(&items);
        assert_eq!(value[0]["sku"], "sku-1");
        assert_eq!(value[0]["quantity"], 2);
        assert_eq!(value[0]["brand"], "Acme");
        assert!(value[0].get("category").is_none());
        assert_eq!(value[1]["quantity"], 1);
    }

    #[test]
    fn test_routes_cover_declared_events() {
        let ctx = DriverContext::new(
            HostGlobals::new(),
            AvailabilityPolicy::default(),
            crate::environment::Variant::Browser,
        );
        let driver = SyneriseBrowserDriver::new(&ctx).unwrap();
        let mut expected = SUPPORTED_EVENTS.to_vec();
        expected.sort();
        assert_eq!(driver.routes.capabilities(), expected);
        assert!(driver.routes.accepts_custom());
    }
}
