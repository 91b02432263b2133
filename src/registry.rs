//! Route registry.
//!
//! Maps route names to immutable [`RouteDefinition`]s. Lookups take a shared
//! read lock; registration takes the write lock, so routes may be added while
//! other tasks are dispatching.

use crate::route::{RouteConfig, RouteDefinition};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe table of named routes.
///
/// # Examples
///
/// ```
/// use routeline::{RouteDefinition, RouteMethod, RouteRegistry};
///
/// let registry = RouteRegistry::new();
/// registry.register(RouteDefinition::new("health", RouteMethod::Get, "/health"));
///
/// let route = registry.resolve("health").unwrap();
/// assert_eq!(route.path, "/health");
/// assert!(registry.resolve("missing").is_err());
/// ```
#[derive(Debug, Default)]
pub struct RouteRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    routes: HashMap<String, Arc<RouteDefinition>>,
    order: Vec<String>,
}

impl RouteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route under its name, replacing any route with that name.
    ///
    /// A replaced route keeps its position in [`names`](Self::names).
    pub fn register(&self, definition: RouteDefinition) {
        let name = definition.name.clone();
        let mut inner = self.inner.write();
        let previous = inner.routes.insert(name.clone(), Arc::new(definition));
        if previous.is_none() {
            inner.order.push(name.clone());
        }
        tracing::debug!(route = %name, replaced = previous.is_some(), "Registered route");
    }

    /// Converts and registers a serialized route.
    ///
    /// # Errors
    ///
    /// Returns an error if the route's headers are invalid.
    pub fn register_config(&self, config: RouteConfig) -> Result<()> {
        self.register(RouteDefinition::try_from(config)?);
        Ok(())
    }

    /// Looks up a route by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoute`] if no route has that name.
    pub fn resolve(&self, name: &str) -> Result<Arc<RouteDefinition>> {
        self.inner
            .read()
            .routes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRoute(name.to_string()))
    }

    /// Removes a route, returning it if it was registered.
    pub fn remove(&self, name: &str) -> Option<Arc<RouteDefinition>> {
        let mut inner = self.inner.write();
        let removed = inner.routes.remove(name);
        if removed.is_some() {
            inner.order.retain(|n| n != name);
        }
        removed
    }

    /// Returns `true` if a route with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().routes.contains_key(name)
    }

    /// Route names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.inner.read().routes.len()
    }

    /// Returns `true` if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteMethod;
    use std::thread;

    #[test]
    fn resolve_returns_registered_definition() {
        let registry = RouteRegistry::new();
        let def = RouteDefinition::new("users", RouteMethod::Get, "/users")
            .with_header("Accept", "application/json")
            .unwrap();

        registry.register(def.clone());

        assert_eq!(*registry.resolve("users").unwrap(), def);
    }

    #[test]
    fn reregistering_overwrites() {
        let registry = RouteRegistry::new();
        registry.register(RouteDefinition::new("a", RouteMethod::Get, "/old"));
        registry.register(RouteDefinition::new("b", RouteMethod::Get, "/b"));
        registry.register(RouteDefinition::new("a", RouteMethod::Post, "/new"));

        let route = registry.resolve("a").unwrap();
        assert_eq!(route.path, "/new");
        assert_eq!(route.method, RouteMethod::Post);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_name_fails() {
        let registry = RouteRegistry::new();
        registry.register(RouteDefinition::new("a", RouteMethod::Get, "/a"));
        registry.resolve("a").unwrap();

        match registry.resolve("nope") {
            Err(Error::UnknownRoute(name)) => assert_eq!(name, "nope"),
            other => panic!("Expected UnknownRoute, got {:?}", other),
        }
    }

    #[test]
    fn resolved_route_survives_replacement() {
        let registry = RouteRegistry::new();
        registry.register(RouteDefinition::new("a", RouteMethod::Get, "/v1"));
        let held = registry.resolve("a").unwrap();

        registry.register(RouteDefinition::new("a", RouteMethod::Get, "/v2"));

        assert_eq!(held.path, "/v1");
        assert_eq!(registry.resolve("a").unwrap().path, "/v2");
    }

    #[test]
    fn remove_drops_name() {
        let registry = RouteRegistry::new();
        registry.register(RouteDefinition::new("a", RouteMethod::Get, "/a"));
        registry.register(RouteDefinition::new("b", RouteMethod::Get, "/b"));

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(!registry.contains("a"));
        assert_eq!(registry.names(), vec!["b"]);
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let registry = Arc::new(RouteRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let name = format!("route-{}", i);
                    registry.register(RouteDefinition::new(
                        name.clone(),
                        RouteMethod::Get,
                        format!("/{}", i),
                    ));
                    registry.resolve(&name).unwrap().path.clone()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("/{}", i));
        }
        assert_eq!(registry.len(), 8);
    }
}
