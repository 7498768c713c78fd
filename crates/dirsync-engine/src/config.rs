//! Synchronization configuration model.
//!
//! The full declarative graph: named connections, the tasks binding a source
//! endpoint to a destination endpoint, and the worker pool size. Parsing a
//! document into this model is the caller's job (the types are plain serde);
//! [`SyncConfig::validate`] rejects inconsistencies at load time, after which
//! the graph is treated as read-only.

use std::collections::{HashMap, HashSet};

use dirsync_connector::ServiceSpec;
use serde::{Deserialize, Serialize};

use crate::condition;
use crate::error::ConfigError;
use crate::policy::SyncOptions;
use crate::transform;

/// Default size of the per-task worker pool.
pub const DEFAULT_THREADS: usize = 5;

/// Connection settings shared by the services that reference them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service URL (e.g. `ldap://directory.example.com:389`).
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConnectionConfig {
    /// Copy with the password masked, for logging.
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}

/// One side of a task: which service to construct and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Identifier of the service factory in the registry.
    pub service: String,

    /// Name of the connection whose settings are handed to the factory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    /// Service-specific parameters.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// One synchronization task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task name; the launcher selects tasks by this name.
    pub name: String,

    /// Object class the task maps (e.g. "user", "group").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_class: Option<String>,

    pub source: ServiceEndpoint,
    pub destination: ServiceEndpoint,

    /// Policies, conditions, and per-attribute overrides.
    #[serde(default)]
    pub options: SyncOptions,

    /// Identifier of a registered custom-logic extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_logic: Option<String>,

    /// Hook invoked after a fully clean sync pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_sync_hook: Option<String>,

    /// Hook invoked after a fully clean clean pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_clean_hook: Option<String>,
}

/// The complete synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Named connections referenced by service endpoints.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,

    /// Declared tasks, in launch order.
    pub tasks: Vec<TaskConfig>,

    /// Worker pool size for per-entry processing.
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

impl SyncConfig {
    /// Validate the configuration graph.
    ///
    /// Checks only what can be known without touching any service: name
    /// uniqueness, connection references, and that every declared condition
    /// and transform expression parses. Unknown policy kinds never reach
    /// this point; serde rejects them during deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for task in &self.tasks {
            if !names.insert(task.name.as_str()) {
                return Err(ConfigError::DuplicateTask {
                    name: task.name.clone(),
                });
            }

            for (endpoint, label) in [(&task.source, "source"), (&task.destination, "destination")]
            {
                if endpoint.service.trim().is_empty() {
                    return Err(ConfigError::EmptyServiceIdentifier {
                        task: task.name.clone(),
                        endpoint: label,
                    });
                }
                if let Some(connection) = &endpoint.connection {
                    if !self.connections.contains_key(connection) {
                        return Err(ConfigError::UnknownConnection {
                            task: task.name.clone(),
                            connection: connection.clone(),
                        });
                    }
                }
            }

            let conditions = &task.options.conditions;
            for expression in [
                conditions.create.as_deref(),
                conditions.update.as_deref(),
                conditions.delete.as_deref(),
                conditions.change_id.as_deref(),
            ]
            .into_iter()
            .flatten()
            {
                condition::validate(expression).map_err(|source| ConfigError::Condition {
                    task: task.name.clone(),
                    source,
                })?;
            }

            for (attribute, policy) in &task.options.attributes {
                if policy.delimiter.as_deref() == Some("") {
                    return Err(ConfigError::EmptyDelimiter {
                        task: task.name.clone(),
                        attribute: attribute.clone(),
                    });
                }
                if let Some(expression) = &policy.transform {
                    transform::validate(expression).map_err(|source| ConfigError::Transform {
                        task: task.name.clone(),
                        attribute: attribute.clone(),
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Find a declared task by name.
    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Assemble the factory options for one endpoint of a task.
    ///
    /// Endpoint parameters are merged with the referenced connection's
    /// settings into one flat bag; explicit endpoint parameters win over
    /// connection-derived ones.
    pub fn service_spec(&self, task: &TaskConfig, endpoint: &ServiceEndpoint) -> ServiceSpec {
        let mut spec = ServiceSpec::new();
        if let Some(connection) = endpoint
            .connection
            .as_ref()
            .and_then(|name| self.connections.get(name))
        {
            spec = spec.with_parameter("url", connection.url.as_str());
            if let Some(username) = &connection.username {
                spec = spec.with_parameter("username", username.as_str());
            }
            if let Some(password) = &connection.password {
                spec = spec.with_parameter("password", password.as_str());
            }
            spec = spec.with_parameter("timeout_secs", connection.timeout_secs.to_string());
        }
        for (key, value) in &endpoint.parameters {
            spec = spec.with_parameter(key.as_str(), value.as_str());
        }
        if let Some(object_class) = &task.object_class {
            spec = spec.with_object_class(object_class.as_str());
        }
        spec
    }
}
