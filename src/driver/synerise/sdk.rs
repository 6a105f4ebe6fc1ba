//! Synerise vendor handle
//!
//! The Synerise tracker installs its client under the `SR` global. The
//! driver reaches it only through `SyneriseSdk`, acquired once in `load()`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Global name the Synerise tracker installs itself under
pub const GLOBAL_NAME: &str = "SR";

/// Shared handle stored in `HostGlobals`
pub type SyneriseHandle = Arc<dyn SyneriseSdk>;

/// Error raised by the vendor SDK itself
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SdkError(pub String);

/// Page visit payload (`SR.event.pageVisit`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub uri: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Calls the driver makes against the Synerise tracker
#[async_trait]
pub trait SyneriseSdk: Send + Sync {
    /// `SR.event.pageVisit`
    async fn page_visit(&self, visit: PageVisit) -> Result<(), SdkError>;

    /// `SR.dynamicContent.get`, refreshes personalised page fragments
    fn refresh_dynamic_content(&self) -> Result<(), SdkError>;

    /// `SR.event.trackCustomEvent`
    fn track_custom_event(
        &self,
        event_name: &str,
        payload: Option<&Map<String, Value>>,
        label: Option<&str>,
    ) -> Result<(), SdkError>;

    /// `SR.event.sendFormData`
    fn send_form_data(
        &self,
        event_name: &str,
        payload: Option<&Map<String, Value>>,
        mapping: Option<&HashMap<String, String>>,
    ) -> Result<(), SdkError>;
}
