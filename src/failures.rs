//! Failure log — per-driver load skips and tracking failures
//!
//! Driver failures never reach the application as errors. The dispatcher
//! records them here instead so they can be inspected, alerted on, or
//! forwarded. Failed deliveries are not retried.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stage at which a driver failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Factory, constructor or `load()` failed; the driver is excluded
    Load,
    /// `track` rejected; only this event/driver pair is lost
    Track,
}

/// One recorded driver failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingFailure {
    pub kind: FailureKind,

    /// Driver token from the dispatcher configuration
    pub token: String,

    /// Driver name, when an instance was constructed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Event being dispatched when the failure happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    pub reason: String,

    pub failed_at: DateTime<Utc>,
}

impl TrackingFailure {
    /// A driver that could not be made ready
    pub fn load(token: impl Into<String>, driver: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Load,
            token: token.into(),
            driver,
            event: None,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    /// A driver whose `track` call failed
    pub fn track(
        token: impl Into<String>,
        driver: impl Into<String>,
        event: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: FailureKind::Track,
            token: token.into(),
            driver: Some(driver.into()),
            event: Some(event.into()),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Destination for driver failures
#[async_trait]
pub trait FailureSink: Send + Sync {
    /// Record a failure
    async fn record(&self, failure: TrackingFailure) -> Result<()>;

    /// Number of failures currently held
    async fn count(&self) -> Result<usize>;

    /// Most recent failures first
    async fn list(&self, limit: usize) -> Result<Vec<TrackingFailure>>;
}

/// In-memory failure log with a capacity bound
///
/// When full, the oldest failures are dropped. A capacity of 0 keeps everything.
pub struct MemoryFailureSink {
    failures: Arc<RwLock<Vec<TrackingFailure>>>,
    max_failures: usize,
}

impl MemoryFailureSink {
    pub fn new(max_failures: usize) -> Self {
        Self {
            failures: Arc::new(RwLock::new(Vec::new())),
            max_failures,
        }
    }
}

impl Default for MemoryFailureSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl FailureSink for MemoryFailureSink {
    async fn record(&self, failure: TrackingFailure) -> Result<()> {
        tracing::warn!(
            kind = ?failure.kind,
            token = %failure.token,
            driver = ?failure.driver,
            event = ?failure.event,
            reason = %failure.reason,
            "Driver failure recorded"
        );

        let mut failures = self.failures.write().await;
        failures.push(failure);

        if self.max_failures > 0 && failures.len() > self.max_failures {
            let drain_count = failures.len() - self.max_failures;
            failures.drain(..drain_count);
        }

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.failures.read().await.len())
    }

    async fn list(&self, limit: usize) -> Result<Vec<TrackingFailure>> {
        let failures = self.failures.read().await;
        Ok(failures.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_constructors() {
        let load = TrackingFailure::load("synerise", None, "vendor unavailable");
        assert_eq!(load.kind, FailureKind::Load);
        assert!(load.driver.is_none());
        assert!(load.event.is_none());

        let track = TrackingFailure::track("gtm", "GtmBrowserDriver", "purchase", "boom");
        assert_eq!(track.kind, FailureKind::Track);
        assert_eq!(track.driver.as_deref(), Some("GtmBrowserDriver"));
        assert_eq!(track.event.as_deref(), Some("purchase"));
    }

    #[test]
    fn test_failure_serialization() {
        let failure = TrackingFailure::track("gtm", "GtmBrowserDriver", "purchase", "boom");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"kind\":\"track\""));
        assert!(json.contains("\"failedAt\""));

        let load = serde_json::to_string(&TrackingFailure::load("gtm", None, "x")).unwrap();
        assert!(!load.contains("\"driver\""));
    }

    #[tokio::test]
    async fn test_memory_sink_record_and_count() {
        let sink = MemoryFailureSink::default();
        assert_eq!(sink.count().await.unwrap(), 0);

        sink.record(TrackingFailure::load("synerise", None, "timeout"))
            .await
            .unwrap();
        assert_eq!(sink.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_sink_list_newest_first() {
        let sink = MemoryFailureSink::default();
        for i in 0..5 {
            sink.record(TrackingFailure::track("d", "D", "page_view", format!("reason {}", i)))
                .await
                .unwrap();
        }

        let list = sink.list(3).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].reason, "reason 4");
        assert_eq!(list[2].reason, "reason 2");
    }

    #[tokio::test]
    async fn test_memory_sink_capacity() {
        let sink = MemoryFailureSink::new(3);
        for i in 0..5 {
            sink.record(TrackingFailure::load("d", None, format!("reason {}", i)))
                .await
                .unwrap();
        }

        assert_eq!(sink.count().await.unwrap(), 3);
        let list = sink.list(10).await.unwrap();
        assert_eq!(list[0].reason, "reason 4");
        assert_eq!(list[2].reason, "reason 2");
    }

    #[tokio::test]
    async fn test_memory_sink_unbounded() {
        let sink = MemoryFailureSink::new(0);
        for _ in 0..20 {
            sink.record(TrackingFailure::load("d", None, "x")).await.unwrap();
        }
        assert_eq!(sink.count().await.unwrap(), 20);
    }
}
