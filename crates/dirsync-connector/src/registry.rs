//! Service registry
//!
//! Maps the service identifiers declared in task configuration to factory
//! functions producing live service instances. Built-in factories are
//! registered at process start; deployments add their own for custom
//! bindings, so services unknown at build time stay pluggable without any
//! runtime class loading.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{CustomLogic, DestinationService, SourceService};

/// Construction options handed to a service factory.
///
/// One signature covers every factory: implementations ignore the fields
/// they have no use for, which replaces trial-and-error constructor lookup
/// with a plain options struct.
#[derive(Debug, Clone, Default)]
pub struct ServiceSpec {
    /// Flat key/value parameters from the task's service declaration,
    /// merged with the referenced connection settings.
    pub parameters: HashMap<String, String>,
    /// The object class the task maps (e.g. "user", "group"), when declared.
    pub object_class: Option<String>,
}

impl ServiceSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter using the builder pattern.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set the object class using the builder pattern.
    #[must_use]
    pub fn with_object_class(mut self, object_class: impl Into<String>) -> Self {
        self.object_class = Some(object_class.into());
        self
    }

    /// Get a parameter value.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Get a required parameter, failing with `InvalidData` when absent.
    pub fn require_parameter(&self, key: &str) -> ConnectorResult<&str> {
        self.parameter(key)
            .ok_or_else(|| ConnectorError::invalid_data(format!("missing parameter '{key}'")))
    }
}

type SourceFactory =
    Arc<dyn Fn(&ServiceSpec) -> ConnectorResult<Arc<dyn SourceService>> + Send + Sync>;
type DestinationFactory =
    Arc<dyn Fn(&ServiceSpec) -> ConnectorResult<Arc<dyn DestinationService>> + Send + Sync>;
type CustomLogicFactory = Arc<dyn Fn() -> ConnectorResult<Arc<dyn CustomLogic>> + Send + Sync>;

/// Registry resolving declared service identifiers to running instances.
#[derive(Default)]
pub struct ServiceRegistry {
    sources: HashMap<String, SourceFactory>,
    destinations: HashMap<String, DestinationFactory>,
    custom_logic: HashMap<String, CustomLogicFactory>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source service factory under an identifier.
    pub fn register_source<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&ServiceSpec) -> ConnectorResult<Arc<dyn SourceService>> + Send + Sync + 'static,
    {
        self.sources.insert(identifier.into(), Arc::new(factory));
    }

    /// Register a destination service factory under an identifier.
    pub fn register_destination<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&ServiceSpec) -> ConnectorResult<Arc<dyn DestinationService>> + Send + Sync + 'static,
    {
        self.destinations.insert(identifier.into(), Arc::new(factory));
    }

    /// Register a custom-logic factory under an identifier.
    ///
    /// Custom-logic construction is parameterless by contract.
    pub fn register_custom_logic<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn() -> ConnectorResult<Arc<dyn CustomLogic>> + Send + Sync + 'static,
    {
        self.custom_logic.insert(identifier.into(), Arc::new(factory));
    }

    /// Construct the source service declared under `identifier`.
    pub fn resolve_source(
        &self,
        identifier: &str,
        spec: &ServiceSpec,
    ) -> ConnectorResult<Arc<dyn SourceService>> {
        let factory = self
            .sources
            .get(identifier)
            .ok_or_else(|| ConnectorError::ServiceNotFound {
                kind: "source",
                identifier: identifier.to_string(),
            })?;
        debug!(service = %identifier, kind = "source", "constructing service");
        factory(spec).map_err(|e| wrap_construction(identifier, e))
    }

    /// Construct the destination service declared under `identifier`.
    pub fn resolve_destination(
        &self,
        identifier: &str,
        spec: &ServiceSpec,
    ) -> ConnectorResult<Arc<dyn DestinationService>> {
        let factory =
            self.destinations
                .get(identifier)
                .ok_or_else(|| ConnectorError::ServiceNotFound {
                    kind: "destination",
                    identifier: identifier.to_string(),
                })?;
        debug!(service = %identifier, kind = "destination", "constructing service");
        factory(spec).map_err(|e| wrap_construction(identifier, e))
    }

    /// Construct the custom-logic extension declared under `identifier`.
    pub fn resolve_custom_logic(&self, identifier: &str) -> ConnectorResult<Arc<dyn CustomLogic>> {
        let factory =
            self.custom_logic
                .get(identifier)
                .ok_or_else(|| ConnectorError::ServiceNotFound {
                    kind: "custom-logic",
                    identifier: identifier.to_string(),
                })?;
        factory().map_err(|e| wrap_construction(identifier, e))
    }

    /// Whether a source factory is registered under `identifier`.
    pub fn has_source(&self, identifier: &str) -> bool {
        self.sources.contains_key(identifier)
    }

    /// Whether a destination factory is registered under `identifier`.
    pub fn has_destination(&self, identifier: &str) -> bool {
        self.destinations.contains_key(identifier)
    }
}

fn wrap_construction(identifier: &str, cause: ConnectorError) -> ConnectorError {
    match cause {
        // Keep resolution errors as-is; only wrap genuine factory failures.
        e @ ConnectorError::ServiceNotFound { .. } => e,
        e => ConnectorError::ConstructionFailed {
            identifier: identifier.to_string(),
            source: Box::new(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, EntryKey};
    use crate::plan::ReconciliationPlan;
    use async_trait::async_trait;

    struct NullSource;

    #[async_trait]
    impl SourceService for NullSource {
        fn name(&self) -> &str {
            "null"
        }

        async fn fetch_all(&self) -> ConnectorResult<Vec<Entry>> {
            Ok(vec![])
        }

        async fn fetch_matching(&self, _key: &EntryKey) -> ConnectorResult<Option<Entry>> {
            Ok(None)
        }
    }

    struct NullDestination;

    #[async_trait]
    impl DestinationService for NullDestination {
        fn name(&self) -> &str {
            "null"
        }

        fn key_for(&self, entry: &Entry) -> ConnectorResult<EntryKey> {
            entry
                .first("uid")
                .map(|v| EntryKey::new("uid", v))
                .ok_or_else(|| ConnectorError::MissingPivot {
                    attribute: "uid".to_string(),
                })
        }

        async fn fetch_matching(&self, _key: &EntryKey) -> ConnectorResult<Option<Entry>> {
            Ok(None)
        }

        async fn fetch_all_keys(&self) -> ConnectorResult<Vec<EntryKey>> {
            Ok(vec![])
        }

        async fn apply(&self, _plan: &ReconciliationPlan) -> ConnectorResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_registered_services() {
        let mut registry = ServiceRegistry::new();
        registry.register_source("null", |_spec| Ok(Arc::new(NullSource)));
        registry.register_destination("null", |_spec| Ok(Arc::new(NullDestination)));

        let spec = ServiceSpec::new();
        assert!(registry.resolve_source("null", &spec).is_ok());
        assert!(registry.resolve_destination("null", &spec).is_ok());
    }

    #[test]
    fn test_unknown_identifier() {
        let registry = ServiceRegistry::new();
        let err = registry
            .resolve_source("missing", &ServiceSpec::new())
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::ServiceNotFound { .. }));
    }

    #[test]
    fn test_factory_failure_carries_cause() {
        let mut registry = ServiceRegistry::new();
        registry.register_source("broken", |spec| {
            spec.require_parameter("url")?;
            Ok(Arc::new(NullSource) as Arc<dyn SourceService>)
        });

        let err = registry
            .resolve_source("broken", &ServiceSpec::new())
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::ConstructionFailed { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_factory_receives_parameters() {
        let mut registry = ServiceRegistry::new();
        registry.register_source("param", |spec| {
            spec.require_parameter("url")?;
            Ok(Arc::new(NullSource) as Arc<dyn SourceService>)
        });

        let spec = ServiceSpec::new().with_parameter("url", "ldap://localhost");
        assert!(registry.resolve_source("param", &spec).is_ok());
    }

    #[test]
    fn test_custom_logic_resolution() {
        struct Noop;
        impl CustomLogic for Noop {
            fn compute_attribute(&self, _attribute: &str, _source: &Entry) -> Option<Vec<String>> {
                None
            }
        }

        let mut registry = ServiceRegistry::new();
        registry.register_custom_logic("noop", || Ok(Arc::new(Noop)));

        assert!(registry.resolve_custom_logic("noop").is_ok());
        assert!(registry.resolve_custom_logic("absent").is_err());
    }
}
