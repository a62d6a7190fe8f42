//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Catalog resolving implementation names to gRPC handlers."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tonic::transport::server::Router;

use crate::demo::{CheckoutFactory, InventoryFactory};
use crate::ServerError;

/// Registers one business service contract on a server router.
pub trait ServiceFactory: Send + Sync {
    /// Fully qualified gRPC service name, e.g. `rig.v1.CheckoutService`.
    fn contract(&self) -> &'static str;

    /// Add a fresh handler instance to `router`.
    fn register(&self, router: Router) -> Router;
}

/// Implementations a worker binary can serve, keyed by implementation name.
///
/// The orchestrator consults the same catalog before spawning anything so an
/// unknown implementation fails the run up front instead of inside a child.
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    factories: BTreeMap<String, Arc<dyn ServiceFactory>>,
}

impl ServiceCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog shipped with the `rig-worker` binary.
    pub fn builtin() -> Self {
        Self::new()
            .with("checkout", CheckoutFactory)
            .with("inventory", InventoryFactory)
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn with(mut self, name: impl Into<String>, factory: impl ServiceFactory + 'static) -> Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Whether `implementation` can be served.
    pub fn contains(&self, implementation: &str) -> bool {
        self.factories.contains_key(implementation)
    }

    /// Registered implementation names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Contract served by `implementation`, if registered.
    pub fn contract(&self, implementation: &str) -> Option<&'static str> {
        self.factories.get(implementation).map(|f| f.contract())
    }

    /// Resolve an implementation name to its factory.
    pub fn resolve(&self, implementation: &str) -> Result<Arc<dyn ServiceFactory>, ServerError> {
        self.factories
            .get(implementation)
            .cloned()
            .ok_or_else(|| ServerError::UnknownImplementation {
                implementation: implementation.to_owned(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Debug for ServiceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.factories.iter().map(|(k, v)| (k, v.contract())))
            .finish()
    }
}
