//! Driver catalog — token → lazily loaded, variant-aware driver factory
//!
//! Each token maps to two variant modules (browser and server). Invoking a
//! token's factory asks the environment resolver once and resolves exactly
//! one of the two modules. Module load errors propagate to the caller; the
//! dispatcher decides what a failed load means.
//!
//! The catalog is immutable once built and carries no live instances, so
//! one catalog can back any number of dispatchers.

use crate::driver::{
    debug, synerise, tokens, AnalyticsDriver, DriverConstructor, DriverContext, DriverToken,
};
use crate::environment::{EnvironmentResolver, HostEnvironment, Variant};
use crate::error::Result;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ModuleLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<DriverConstructor>> + Send + Sync>;

/// A loadable driver implementation unit
#[derive(Clone)]
pub struct DriverModule {
    id: String,
    loader: ModuleLoader,
}

impl DriverModule {
    /// A module whose constructor is produced by an async loader
    pub fn new<F, Fut>(id: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<DriverConstructor>> + Send + 'static,
    {
        Self {
            id: id.into(),
            loader: Arc::new(move || -> BoxFuture<'static, Result<DriverConstructor>> {
                Box::pin(loader())
            }),
        }
    }

    /// A module compiled into the binary; every load yields the same constructor
    pub fn compiled<C>(id: impl Into<String>, constructor: C) -> Self
    where
        C: Fn(&DriverContext) -> Result<Arc<dyn AnalyticsDriver>> + Send + Sync + 'static,
    {
        let constructor: DriverConstructor = Arc::new(constructor);
        Self::new(id, move || {
            let constructor = Arc::clone(&constructor);
            async move { Ok(constructor) }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve the module's constructor
    pub async fn load(&self) -> Result<DriverConstructor> {
        tracing::debug!(module = %self.id, "Loading driver module");
        (self.loader)().await
    }
}

impl fmt::Debug for DriverModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverModule").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Constructor resolved by a factory, with the variant it came from
#[derive(Clone)]
pub struct ResolvedModule {
    pub module: String,
    pub variant: Variant,
    pub constructor: DriverConstructor,
}

/// Zero-argument async factory for one token
pub type DriverFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<ResolvedModule>> + Send + Sync>;

/// Build a factory that loads the browser or the server module, never both
///
/// The variant is decided when the factory is invoked and stays fixed for
/// the returned result.
pub fn load_variant(
    resolver: Arc<dyn EnvironmentResolver>,
    browser: DriverModule,
    server: DriverModule,
) -> DriverFactory {
    Arc::new(move || -> BoxFuture<'static, Result<ResolvedModule>> {
        let variant = resolver.variant();
        let module = match variant {
            Variant::Browser => browser.clone(),
            Variant::Server => server.clone(),
        };
        Box::pin(async move {
            let constructor = module.load().await?;
            Ok(ResolvedModule {
                module: module.id,
                variant,
                constructor,
            })
        })
    })
}

/// Immutable token → factory table
pub struct DriverCatalog {
    factories: HashMap<DriverToken, DriverFactory>,
}

impl DriverCatalog {
    pub fn builder() -> DriverCatalogBuilder {
        DriverCatalogBuilder {
            resolver: Arc::new(HostEnvironment),
            entries: Vec::new(),
        }
    }

    /// Catalog of the drivers shipped with this crate
    pub fn standard(resolver: Arc<dyn EnvironmentResolver>) -> Self {
        Self::builder()
            .resolver(resolver)
            .register(
                tokens::DEBUG,
                DriverModule::compiled("debug.browser-driver", debug::construct_browser),
                DriverModule::compiled("debug.server-driver", debug::construct_server),
            )
            .register(
                tokens::SYNERISE,
                DriverModule::compiled("synerise.browser-driver", synerise::browser::construct),
                DriverModule::compiled("synerise.server-driver", synerise::server::construct),
            )
            .build()
    }

    /// The factory registered for `token`
    pub fn factory(&self, token: &DriverToken) -> Option<DriverFactory> {
        self.factories.get(token).cloned()
    }

    pub fn contains(&self, token: &DriverToken) -> bool {
        self.factories.contains_key(token)
    }

    /// Registered tokens, sorted
    pub fn tokens(&self) -> Vec<DriverToken> {
        let mut tokens: Vec<DriverToken> = self.factories.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for DriverCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverCatalog").field("tokens", &self.tokens()).finish()
    }
}

/// Collects catalog entries before freezing them
pub struct DriverCatalogBuilder {
    resolver: Arc<dyn EnvironmentResolver>,
    entries: Vec<(DriverToken, DriverModule, DriverModule)>,
}

impl DriverCatalogBuilder {
    /// Resolver consulted by every factory (defaults to host detection)
    pub fn resolver(mut self, resolver: Arc<dyn EnvironmentResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register a token's browser and server modules
    ///
    /// Registering a token twice keeps the last pair.
    pub fn register(
        mut self,
        token: impl Into<DriverToken>,
        browser: DriverModule,
        server: DriverModule,
    ) -> Self {
        self.entries.push((token.into(), browser, server));
        self
    }

    pub fn build(self) -> DriverCatalog {
        let mut factories = HashMap::with_capacity(self.entries.len());
        for (token, browser, server) in self.entries {
            let factory = load_variant(Arc::clone(&self.resolver), browser, server);
            factories.insert(token, factory);
        }
        DriverCatalog { factories }
    }
}
