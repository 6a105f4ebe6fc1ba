//! Bounded availability polling for vendor globals

use crate::config::AvailabilityPolicy;
use crate::host::HostGlobals;
use std::any::Any;
use std::time::Duration;

/// Wait for a vendor global to appear
///
/// Checks immediately, then after every `policy.interval()` until
/// `policy.max_wait()` has elapsed; the last check happens at the max wait
/// itself. Returns `None` once the window is exhausted.
pub async fn wait_for_global<T>(
    globals: &HostGlobals,
    name: &str,
    policy: &AvailabilityPolicy,
) -> Option<T>
where
    T: Any + Clone + Send + Sync,
{
    let interval = policy.interval();
    let max_wait = policy.max_wait();
    let mut waited = Duration::ZERO;

    loop {
        if let Some(handle) = globals.get::<T>(name) {
            tracing::debug!(
                global = %name,
                waited_ms = waited.as_millis() as u64,
                "Vendor global available"
            );
            return Some(handle);
        }

        if waited >= max_wait || interval.is_zero() {
            tracing::debug!(
                global = %name,
                max_wait_ms = policy.max_wait_ms,
                "Vendor global never appeared"
            );
            return None;
        }

        tokio::time::sleep(interval).await;
        waited += interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_immediately_available() {
        let globals = HostGlobals::new();
        globals.install("SR", Arc::new(7u32));

        let found = wait_for_global::<Arc<u32>>(&globals, "SR", &AvailabilityPolicy::default()).await;
        assert_eq!(found.as_deref(), Some(&7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_wait() {
        let globals = HostGlobals::new();
        let started = tokio::time::Instant::now();

        let found = wait_for_global::<u32>(&globals, "SR", &AvailabilityPolicy::new(250, 1500)).await;

        assert!(found.is_none());
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_appears_during_poll() {
        let globals = HostGlobals::new();
        let installer = globals.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            installer.install("SR", 1u32);
        });

        let started = tokio::time::Instant::now();
        let found = wait_for_global::<u32>(&globals, "SR", &AvailabilityPolicy::new(250, 1500)).await;

        assert_eq!(found, Some(1));
        assert_eq!(started.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_checks_once() {
        let globals = HostGlobals::new();
        let found = wait_for_global::<u32>(&globals, "SR", &AvailabilityPolicy::new(0, 1500)).await;
        assert!(found.is_none());
    }
}
