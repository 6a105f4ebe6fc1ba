//! Environment resolver — browser-like vs server-like host detection
//!
//! The catalog asks the resolver once per factory invocation and loads the
//! matching driver variant. Detection never fails: anything inconclusive
//! resolves to the server variant, which has the smaller capability surface.

use crate::config::EnvironmentMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable that forces browser-like detection on native hosts
pub const HOST_ENV_VAR: &str = "TRACKIFY_HOST";

/// Runtime variant of a driver implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    Browser,
    Server,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Browser => f.write_str("browser"),
            Variant::Server => f.write_str("server"),
        }
    }
}

/// Predicate distinguishing browser-like from server-like hosts
pub trait EnvironmentResolver: Send + Sync {
    /// Whether execution happens inside a browser-like host
    fn is_browser(&self) -> bool;

    /// The variant to load for the current host
    fn variant(&self) -> Variant {
        if self.is_browser() {
            Variant::Browser
        } else {
            Variant::Server
        }
    }
}

/// Detects the ambient host
///
/// Browser-like when compiled for `wasm32-unknown-unknown` (the target that
/// runs under a JS host with a global `window`), or when `TRACKIFY_HOST` is
/// set to `browser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEnvironment;

impl EnvironmentResolver for HostEnvironment {
    fn is_browser(&self) -> bool {
        if cfg!(all(target_arch = "wasm32", target_os = "unknown")) {
            return true;
        }
        match std::env::var(HOST_ENV_VAR) {
            Ok(value) => value.trim().eq_ignore_ascii_case("browser"),
            Err(_) => false,
        }
    }
}

/// Resolver pinned to one variant
#[derive(Debug, Clone, Copy)]
pub struct FixedEnvironment(pub Variant);

impl FixedEnvironment {
    pub fn browser() -> Self {
        Self(Variant::Browser)
    }

    pub fn server() -> Self {
        Self(Variant::Server)
    }
}

impl EnvironmentResolver for FixedEnvironment {
    fn is_browser(&self) -> bool {
        self.0 == Variant::Browser
    }
}

/// Build the resolver described by a configured mode
pub fn resolver_for(mode: EnvironmentMode) -> Arc<dyn EnvironmentResolver> {
    match mode {
        EnvironmentMode::Auto => Arc::new(HostEnvironment),
        EnvironmentMode::Browser => Arc::new(FixedEnvironment::browser()),
        EnvironmentMode::Server => Arc::new(FixedEnvironment::server()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_environment() {
        assert!(FixedEnvironment::browser().is_browser());
        assert!(!FixedEnvironment::server().is_browser());
        assert_eq!(FixedEnvironment::browser().variant(), Variant::Browser);
        assert_eq!(FixedEnvironment::server().variant(), Variant::Server);
    }

    #[test]
    fn test_resolver_for_modes() {
        assert!(resolver_for(EnvironmentMode::Browser).is_browser());
        assert!(!resolver_for(EnvironmentMode::Server).is_browser());
    }

    #[test]
    fn test_host_detection_is_stable() {
        let host = HostEnvironment;
        assert_eq!(host.is_browser(), host.is_browser());
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(Variant::Browser.to_string(), "browser");
        assert_eq!(Variant::Server.to_string(), "server");
    }
}
