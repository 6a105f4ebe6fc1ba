//! Event model — what happened, independent of any vendor
//!
//! A standard event pairs a name from a closed set with a typed payload.
//! A custom event lives in the `custom.` namespace and has its payload
//! negotiated per driver (see [`custom`]).

pub mod config;
pub mod custom;

pub use config::{
    AddPaymentInfoConfig, AddShippingInfoConfig, AddToCartConfig, BeginCheckoutConfig,
    CartConfig, Customer, Item, LoginConfig, PageViewConfig, PurchaseConfig,
    RemoveFromCartConfig, SignUpConfig, SubscribeConfig, UserDataConfig, ViewCartConfig,
    ViewItemConfig, ViewItemListConfig,
};
pub use custom::{is_custom_name, CustomEvent, DeliveryKind, NegotiatedEvent, CUSTOM_PREFIX};

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of standard event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    PageView,
    AddPaymentInfo,
    AddShippingInfo,
    AddToCart,
    BeginCheckout,
    Purchase,
    RemoveFromCart,
    ViewCart,
    ViewItem,
    ViewItemList,
    Login,
    SignUp,
    Subscribe,
    Unsubscribe,
    UserDataUpdate,
}

impl EventName {
    pub const ALL: [EventName; 15] = [
        EventName::PageView,
        EventName::AddPaymentInfo,
        EventName::AddShippingInfo,
        EventName::AddToCart,
        EventName::BeginCheckout,
        EventName::Purchase,
        EventName::RemoveFromCart,
        EventName::ViewCart,
        EventName::ViewItem,
        EventName::ViewItemList,
        EventName::Login,
        EventName::SignUp,
        EventName::Subscribe,
        EventName::Unsubscribe,
        EventName::UserDataUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::PageView => "page_view",
            EventName::AddPaymentInfo => "add_payment_info",
            EventName::AddShippingInfo => "add_shipping_info",
            EventName::AddToCart => "add_to_cart",
            EventName::BeginCheckout => "begin_checkout",
            EventName::Purchase => "purchase",
            EventName::RemoveFromCart => "remove_from_cart",
            EventName::ViewCart => "view_cart",
            EventName::ViewItem => "view_item",
            EventName::ViewItemList => "view_item_list",
            EventName::Login => "login",
            EventName::SignUp => "sign_up",
            EventName::Subscribe => "subscribe",
            EventName::Unsubscribe => "unsubscribe",
            EventName::UserDataUpdate => "user_data_update",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        EventName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| TrackError::InvalidEvent(format!("Unknown event name '{}'", s)))
    }
}

/// Typed payload of a standard event; the variant determines the name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "snake_case")]
pub enum EventData {
    PageView(PageViewConfig),
    AddPaymentInfo(AddPaymentInfoConfig),
    AddShippingInfo(AddShippingInfoConfig),
    AddToCart(AddToCartConfig),
    BeginCheckout(BeginCheckoutConfig),
    Purchase(PurchaseConfig),
    RemoveFromCart(RemoveFromCartConfig),
    ViewCart(ViewCartConfig),
    ViewItem(ViewItemConfig),
    ViewItemList(ViewItemListConfig),
    Login(LoginConfig),
    SignUp(SignUpConfig),
    Subscribe(SubscribeConfig),
    Unsubscribe(SubscribeConfig),
    UserDataUpdate(UserDataConfig),
}

impl EventData {
    pub fn name(&self) -> EventName {
        match self {
            EventData::PageView(_) => EventName::PageView,
            EventData::AddPaymentInfo(_) => EventName::AddPaymentInfo,
            EventData::AddShippingInfo(_) => EventName::AddShippingInfo,
            EventData::AddToCart(_) => EventName::AddToCart,
            EventData::BeginCheckout(_) => EventName::BeginCheckout,
            EventData::Purchase(_) => EventName::Purchase,
            EventData::RemoveFromCart(_) => EventName::RemoveFromCart,
            EventData::ViewCart(_) => EventName::ViewCart,
            EventData::ViewItem(_) => EventName::ViewItem,
            EventData::ViewItemList(_) => EventName::ViewItemList,
            EventData::Login(_) => EventName::Login,
            EventData::SignUp(_) => EventName::SignUp,
            EventData::Subscribe(_) => EventName::Subscribe,
            EventData::Unsubscribe(_) => EventName::Unsubscribe,
            EventData::UserDataUpdate(_) => EventName::UserDataUpdate,
        }
    }

    /// Reject currency codes and amounts no vendor would accept
    pub fn validate(&self) -> Result<()> {
        match self {
            EventData::PageView(c) => check_currency(c.currency.as_deref()),
            EventData::AddPaymentInfo(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::AddShippingInfo(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::AddToCart(c) | EventData::RemoveFromCart(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::BeginCheckout(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::Purchase(c) => {
                if c.transaction_id.trim().is_empty() {
                    return Err(TrackError::InvalidEvent(
                        "purchase requires a transaction id".to_string(),
                    ));
                }
                check_money(&c.currency, c.value)?;
                check_amount("tax", c.tax.unwrap_or(0.0))?;
                check_amount("shipping", c.shipping.unwrap_or(0.0))?;
                check_items(&c.items)
            }
            EventData::ViewCart(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::ViewItem(c) => {
                check_money(&c.currency, c.value)?;
                check_items(&c.items)
            }
            EventData::ViewItemList(c) => check_items(&c.items),
            EventData::Subscribe(c) | EventData::Unsubscribe(c) => {
                if c.email.trim().is_empty() {
                    return Err(TrackError::InvalidEvent(
                        "subscription requires an email".to_string(),
                    ));
                }
                Ok(())
            }
            EventData::Login(_) | EventData::SignUp(_) | EventData::UserDataUpdate(_) => Ok(()),
        }
    }

    /// Line items carried by the payload, empty for non-commerce events
    pub fn items(&self) -> &[Item] {
        match self {
            EventData::AddPaymentInfo(c) => &c.items,
            EventData::AddShippingInfo(c) => &c.items,
            EventData::AddToCart(c) | EventData::RemoveFromCart(c) => &c.items,
            EventData::BeginCheckout(c) => &c.items,
            EventData::Purchase(c) => &c.items,
            EventData::ViewCart(c) => &c.items,
            EventData::ViewItem(c) => &c.items,
            EventData::ViewItemList(c) => &c.items,
            _ => &[],
        }
    }
}

fn check_currency(currency: Option<&str>) -> Result<()> {
    match currency {
        None => Ok(()),
        Some(code) if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) => Ok(()),
        Some(code) => Err(TrackError::InvalidEvent(format!(
            "Currency '{}' is not an ISO 4217 code",
            code
        ))),
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TrackError::InvalidEvent(format!(
            "{} must be a finite, non-negative amount (got {})",
            field, value
        )))
    }
}

fn check_money(currency: &str, value: f64) -> Result<()> {
    check_currency(Some(currency))?;
    check_amount("value", value)
}

fn check_items(items: &[Item]) -> Result<()> {
    for item in items {
        if item.id.trim().is_empty() {
            return Err(TrackError::InvalidEvent("item id cannot be empty".to_string()));
        }
        if let Some(price) = item.price {
            check_amount("item price", price)?;
        }
    }
    Ok(())
}

/// An analytics event handed to the dispatcher
#[derive(Debug, Clone)]
pub enum Event {
    Standard(EventData),
    Custom(CustomEvent),
}

impl Event {
    /// Build a validated standard event
    pub fn standard(data: EventData) -> Result<Self> {
        data.validate()?;
        Ok(Event::Standard(data))
    }

    /// Build a custom event from a loose per-driver negotiator
    pub fn custom<F>(name: impl Into<String>, negotiator: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<serde_json::Value> + Send + Sync + 'static,
    {
        CustomEvent::new(name, negotiator).map(Event::Custom)
    }

    pub fn page_view(config: PageViewConfig) -> Result<Self> {
        Self::standard(EventData::PageView(config))
    }

    /// Name used for capability matching (`custom.*` for custom events)
    pub fn name(&self) -> &str {
        match self {
            Event::Standard(data) => data.name().as_str(),
            Event::Custom(custom) => custom.name(),
        }
    }

    /// The standard name, if this is a standard event
    pub fn standard_name(&self) -> Option<EventName> {
        match self {
            Event::Standard(data) => Some(data.name()),
            Event::Custom(_) => None,
        }
    }

    /// The typed payload, if this is a standard event
    pub fn data(&self) -> Option<&EventData> {
        match self {
            Event::Standard(data) => Some(data),
            Event::Custom(_) => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomEvent> {
        match self {
            Event::Custom(custom) => Some(custom),
            Event::Standard(_) => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Event::Custom(_))
    }
}

impl From<CustomEvent> for Event {
    fn from(custom: CustomEvent) -> Self {
        Event::Custom(custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart(currency: &str, value: f64) -> EventData {
        EventData::AddToCart(CartConfig {
            currency: currency.to_string(),
            value,
            items: vec![Item::new("sku-1")],
            event_id: None,
        })
    }

    #[test]
    fn test_event_name_roundtrip() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
        assert!("custom.promo".parse::<EventName>().is_err());
    }

    #[test]
    fn test_event_data_names() {
        let data = EventData::Unsubscribe(SubscribeConfig {
            email: "a@example.com".to_string(),
            ..Default::default()
        });
        assert_eq!(data.name(), EventName::Unsubscribe);
        assert_eq!(cart("USD", 1.0).name(), EventName::AddToCart);
    }

    #[test]
    fn test_standard_event_accessors() {
        let event = Event::page_view(PageViewConfig {
            page_path: "home".to_string(),
            page_title: "Home".to_string(),
            currency: Some("USD".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(event.name(), "page_view");
        assert_eq!(event.standard_name(), Some(EventName::PageView));
        assert!(!event.is_custom());
        assert!(event.as_custom().is_none());
        assert!(matches!(event.data(), Some(EventData::PageView(_))));
    }

    #[test]
    fn test_custom_event_accessors() {
        let event = Event::custom("promo", |_| None).unwrap();
        assert_eq!(event.name(), "custom.promo");
        assert!(event.is_custom());
        assert!(event.data().is_none());
        assert!(event.standard_name().is_none());
    }

    #[test]
    fn test_validation_rejects_bad_currency() {
        assert!(Event::standard(cart("usd", 1.0)).is_err());
        assert!(Event::standard(cart("EURO", 1.0)).is_err());
        assert!(Event::standard(cart("EUR", 1.0)).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_amount() {
        assert!(Event::standard(cart("USD", -1.0)).is_err());
        assert!(Event::standard(cart("USD", f64::NAN)).is_err());
        assert!(Event::standard(cart("USD", 0.0)).is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_purchase_id() {
        let data = EventData::Purchase(PurchaseConfig {
            transaction_id: " ".to_string(),
            currency: "USD".to_string(),
            value: 10.0,
            ..Default::default()
        });
        assert!(matches!(
            Event::standard(data),
            Err(TrackError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_event_data_serialization_is_tagged() {
        let json = serde_json::to_value(cart("USD", 2.5)).unwrap();
        assert_eq!(json["name"], "add_to_cart");
        assert_eq!(json["data"]["currency"], "USD");
        assert_eq!(json["data"]["items"][0]["id"], "sku-1");
    }

    #[test]
    fn test_items_accessor() {
        assert_eq!(cart("USD", 1.0).items().len(), 1);
        let login = EventData::Login(LoginConfig::default());
        assert!(login.items().is_empty());
    }
}
