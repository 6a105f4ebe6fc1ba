//! Custom events — payloads negotiated per driver
//!
//! A custom event carries a negotiator instead of a fixed payload. Each
//! driver asks the negotiator for its own view of the event by driver name
//! and either gets a description of the vendor call to make, or `None`,
//! which opts that driver out of the event.
//!
//! The negotiated value is loosely typed JSON. Drivers target heterogeneous
//! vendor APIs, so the shape is only checked where it is consumed, by
//! `NegotiatedEvent::parse`.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Namespace prefix shared by every custom event name
pub const CUSTOM_PREFIX: &str = "custom.";

type Negotiator = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Which vendor call shape a negotiated event maps onto
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Form submission taking a field-name mapping
    Form,
    /// Generic event push taking an optional label
    #[default]
    Push,
}

/// A validated per-driver view of a custom event
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedEvent {
    pub event_name: String,
    pub event_payload: Option<Map<String, Value>>,
    pub event_type: DeliveryKind,
    pub event_mapping: Option<HashMap<String, String>>,
    pub label: Option<String>,
}

impl NegotiatedEvent {
    /// A generic push of the named vendor event
    pub fn push(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            event_payload: None,
            event_type: DeliveryKind::Push,
            event_mapping: None,
            label: None,
        }
    }

    /// A form submission of the named vendor event
    pub fn form(event_name: impl Into<String>) -> Self {
        Self {
            event_type: DeliveryKind::Form,
            ..Self::push(event_name)
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.event_payload = Some(payload);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.event_mapping = Some(mapping);
        self
    }

    /// Validate a raw negotiated value for `driver`
    ///
    /// `event_name` must be a string; `event_payload` (an object, never an
    /// array), `event_mapping` and `label` may be absent or null but must
    /// have the right type when set.
    /// Only `event_type == "form"` selects a form submission.
    pub fn parse(event: &str, driver: &str, value: Value) -> Result<Self> {
        let malformed = |field: &'static str| TrackError::MalformedPayload {
            event: event.to_string(),
            driver: driver.to_string(),
            field,
        };

        let mut object = match value {
            Value::Object(object) => object,
            _ => return Err(malformed("event_name")),
        };

        let event_name = match object.remove("event_name") {
            Some(Value::String(name)) => name,
            _ => return Err(malformed("event_name")),
        };

        let event_payload = match object.remove("event_payload") {
            None | Some(Value::Null) => None,
            Some(Value::Object(payload)) => Some(payload),
            Some(_) => return Err(malformed("event_payload")),
        };

        let event_type = match object.get("event_type").and_then(Value::as_str) {
            Some("form") => DeliveryKind::Form,
            _ => DeliveryKind::Push,
        };

        let event_mapping = match object.remove("event_mapping") {
            None | Some(Value::Null) => None,
            Some(Value::Object(mapping)) => {
                let mut fields = HashMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    match value {
                        Value::String(target) => {
                            fields.insert(key, target);
                        }
                        _ => return Err(malformed("event_mapping")),
                    }
                }
                Some(fields)
            }
            Some(_) => return Err(malformed("event_mapping")),
        };

        let label = match object.remove("label") {
            None | Some(Value::Null) => None,
            Some(Value::String(label)) => Some(label),
            Some(_) => return Err(malformed("label")),
        };

        Ok(Self {
            event_name,
            event_payload,
            event_type,
            event_mapping,
            label,
        })
    }

    /// Render back into the loose wire shape
    pub fn into_value(self) -> Value {
        let mut object = Map::new();
        object.insert("event_name".to_string(), Value::String(self.event_name));
        if let Some(payload) = self.event_payload {
            object.insert("event_payload".to_string(), Value::Object(payload));
        }
        let kind = match self.event_type {
            DeliveryKind::Form => "form",
            DeliveryKind::Push => "push",
        };
        object.insert("event_type".to_string(), Value::String(kind.to_string()));
        if let Some(mapping) = self.event_mapping {
            let mapping = mapping
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            object.insert("event_mapping".to_string(), Value::Object(mapping));
        }
        if let Some(label) = self.label {
            object.insert("label".to_string(), Value::String(label));
        }
        Value::Object(object)
    }
}

/// An event whose payload is produced per driver
#[derive(Clone)]
pub struct CustomEvent {
    name: String,
    negotiator: Negotiator,
}

impl CustomEvent {
    /// Create a custom event from a loose negotiator
    ///
    /// `name` is namespaced under `custom.` unless it already is.
    pub fn new<F>(name: impl Into<String>, negotiator: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let name = name.trim();
        let suffix = name.strip_prefix(CUSTOM_PREFIX).unwrap_or(name);
        if suffix.is_empty() {
            return Err(TrackError::InvalidEvent(
                "Custom event name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            name: format!("{}{}", CUSTOM_PREFIX, suffix),
            negotiator: Arc::new(negotiator),
        })
    }

    /// Create a custom event from a negotiator returning typed decisions
    pub fn typed<F>(name: impl Into<String>, negotiator: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<NegotiatedEvent> + Send + Sync + 'static,
    {
        Self::new(name, move |driver| negotiator(driver).map(NegotiatedEvent::into_value))
    }

    /// Namespaced name, e.g. `custom.promo_click`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw negotiated value for the named driver (`None` = opt out)
    pub fn for_driver(&self, driver: &str) -> Option<Value> {
        (self.negotiator)(driver)
    }

    /// Negotiate and validate in one step
    pub fn negotiate(&self, driver: &str) -> Result<Option<NegotiatedEvent>> {
        match self.for_driver(driver) {
            None => Ok(None),
            Some(value) => NegotiatedEvent::parse(&self.name, driver, value).map(Some),
        }
    }
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Whether a raw event name falls in the custom namespace
pub fn is_custom_name(name: &str) -> bool {
    name.starts_with(CUSTOM_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_is_namespaced() {
        let event = CustomEvent::new("promo_click", |_| None).unwrap();
        assert_eq!(event.name(), "custom.promo_click");

        let event = CustomEvent::new("custom.promo_click", |_| None).unwrap();
        assert_eq!(event.name(), "custom.promo_click");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            CustomEvent::new("", |_| None),
            Err(TrackError::InvalidEvent(_))
        ));
        assert!(CustomEvent::new("custom.", |_| None).is_err());
    }

    #[test]
    fn test_for_driver_is_per_driver() {
        let event = CustomEvent::new("promo", |driver| match driver {
            "DriverA" => Some(json!({"event_name": "promo_click", "event_payload": {"id": "42"}})),
            _ => None,
        })
        .unwrap();

        assert!(event.for_driver("DriverA").is_some());
        assert!(event.for_driver("DriverB").is_none());
        assert_eq!(event.for_driver("DriverA"), event.for_driver("DriverA"));
    }

    #[test]
    fn test_parse_push_defaults() {
        let parsed = NegotiatedEvent::parse(
            "custom.promo",
            "DriverA",
            json!({"event_name": "promo_click", "event_payload": {"id": "42"}}),
        )
        .unwrap();

        assert_eq!(parsed.event_name, "promo_click");
        assert_eq!(parsed.event_type, DeliveryKind::Push);
        assert_eq!(parsed.event_payload.unwrap()["id"], "42");
        assert!(parsed.label.is_none());
        assert!(parsed.event_mapping.is_none());
    }

    #[test]
    fn test_parse_form_with_mapping() {
        let parsed = NegotiatedEvent::parse(
            "custom.contact",
            "DriverA",
            json!({
                "event_name": "contact-form",
                "event_type": "form",
                "event_payload": {"mail": "a@example.com"},
                "event_mapping": {"mail": "email"}
            }),
        )
        .unwrap();

        assert_eq!(parsed.event_type, DeliveryKind::Form);
        assert_eq!(parsed.event_mapping.unwrap()["mail"], "email");
    }

    #[test]
    fn test_parse_unknown_type_is_push() {
        let parsed = NegotiatedEvent::parse(
            "custom.x",
            "DriverA",
            json!({"event_name": "x", "event_type": "banner"}),
        )
        .unwrap();
        assert_eq!(parsed.event_type, DeliveryKind::Push);
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        let err = NegotiatedEvent::parse("custom.x", "DriverA", json!({"event_payload": {}}))
            .unwrap_err();
        assert!(matches!(
            err,
            TrackError::MalformedPayload { field: "event_name", .. }
        ));

        let err = NegotiatedEvent::parse("custom.x", "DriverA", json!({"event_name": 5}))
            .unwrap_err();
        assert!(matches!(
            err,
            TrackError::MalformedPayload { field: "event_name", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_scalar_payload() {
        let err = NegotiatedEvent::parse(
            "custom.x",
            "DriverA",
            json!({"event_name": "x", "event_payload": "oops"}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrackError::MalformedPayload { field: "event_payload", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_array_payload() {
        let err = NegotiatedEvent::parse(
            "custom.x",
            "DriverA",
            json!({"event_name": "x", "event_payload": [{"id": "42"}]}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrackError::MalformedPayload { field: "event_payload", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_bad_label_and_mapping() {
        let err = NegotiatedEvent::parse("custom.x", "D", json!({"event_name": "x", "label": 1}))
            .unwrap_err();
        assert!(matches!(err, TrackError::MalformedPayload { field: "label", .. }));

        let err = NegotiatedEvent::parse(
            "custom.x",
            "D",
            json!({"event_name": "x", "event_mapping": {"a": 1}}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrackError::MalformedPayload { field: "event_mapping", .. }
        ));
    }

    #[test]
    fn test_typed_negotiator() {
        let event = CustomEvent::typed("newsletter", |driver| {
            (driver == "DriverA").then(|| {
                NegotiatedEvent::form("newsletter-agreement")
                    .with_label("Footer form")
                    .with_mapping(HashMap::from([("mail".to_string(), "email".to_string())]))
            })
        })
        .unwrap();

        let negotiated = event.negotiate("DriverA").unwrap().unwrap();
        assert_eq!(negotiated.event_name, "newsletter-agreement");
        assert_eq!(negotiated.event_type, DeliveryKind::Form);
        assert_eq!(negotiated.label.as_deref(), Some("Footer form"));
        assert!(event.negotiate("DriverB").unwrap().is_none());
    }

    #[test]
    fn test_is_custom_name() {
        assert!(is_custom_name("custom.anything"));
        assert!(!is_custom_name("page_view"));
    }
}
