//! Host globals — where vendor SDKs announce themselves
//!
//! A vendor SDK bootstraps asynchronously and installs its client object
//! under a well-known global name (Synerise uses `SR`). Drivers look the
//! handle up while loading and keep it for their lifetime.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Slot = Arc<dyn Any + Send + Sync>;

/// Shared, type-erased registry of vendor globals
#[derive(Clone, Default)]
pub struct HostGlobals {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl HostGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) a global
    pub fn install<T>(&self, name: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        match self.slots.write() {
            Ok(mut slots) => {
                slots.insert(name.clone(), Arc::new(value));
                tracing::debug!(global = %name, "Host global installed");
            }
            Err(e) => tracing::warn!(global = %name, error = %e, "Host globals lock poisoned"),
        }
    }

    /// Remove a global, returning whether it was present
    pub fn remove(&self, name: &str) -> bool {
        self.slots
            .write()
            .map(|mut slots| slots.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Fetch a global of the expected type
    ///
    /// A global installed under the name with a different type reads as absent.
    pub fn get<T>(&self, name: &str) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let slots = self.slots.read().ok()?;
        slots.get(name)?.downcast_ref::<T>().cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots
            .read()
            .map(|slots| slots.contains_key(name))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for HostGlobals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .slots
            .read()
            .map(|slots| slots.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("HostGlobals").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_install_and_get_trait_object() {
        let globals = HostGlobals::new();
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        globals.install("greeter", greeter);

        let found = globals.get::<Arc<dyn Greeter>>("greeter").unwrap();
        assert_eq!(found.greet(), "hello");
    }

    #[test]
    fn test_wrong_type_reads_as_absent() {
        let globals = HostGlobals::new();
        globals.install("SR", 42u32);
        assert!(globals.contains("SR"));
        assert!(globals.get::<String>("SR").is_none());
        assert_eq!(globals.get::<u32>("SR"), Some(42));
    }

    #[test]
    fn test_clones_share_state() {
        let globals = HostGlobals::new();
        let other = globals.clone();
        other.install("SR", "ready".to_string());
        assert_eq!(globals.get::<String>("SR").as_deref(), Some("ready"));

        assert!(globals.remove("SR"));
        assert!(!other.contains("SR"));
        assert!(!globals.remove("SR"));
    }
}
