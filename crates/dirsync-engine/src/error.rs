//! Engine error types
//!
//! Three layers of failure, matching where each is handled:
//!
//! - [`ConfigError`] — raised at load time by `SyncConfig::validate`; the
//!   configuration is rejected before any task runs.
//! - [`EngineError`] — task-level failures (service resolution, source
//!   enumeration). One failing task never affects its siblings.
//! - [`EntryError`] — per-entry failures caught at the worker boundary,
//!   logged and counted; the pass continues with the remaining entries.

use dirsync_connector::ConnectorError;
use thiserror::Error;

use crate::condition::ConditionError;
use crate::transform::TransformError;

/// Configuration rejected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two tasks share the same name.
    #[error("duplicate task name '{name}'")]
    DuplicateTask { name: String },

    /// A service endpoint references a connection that is not declared.
    #[error("task '{task}' references undeclared connection '{connection}'")]
    UnknownConnection { task: String, connection: String },

    /// A service endpoint carries an empty service identifier.
    #[error("task '{task}' declares an empty {endpoint} service identifier")]
    EmptyServiceIdentifier {
        task: String,
        endpoint: &'static str,
    },

    /// A per-attribute delimiter override is empty.
    #[error("task '{task}' declares an empty delimiter for attribute '{attribute}'")]
    EmptyDelimiter { task: String, attribute: String },

    /// A condition expression does not parse.
    #[error("task '{task}': {source}")]
    Condition {
        task: String,
        #[source]
        source: ConditionError,
    },

    /// A transform expression does not parse.
    #[error("task '{task}', attribute '{attribute}': {source}")]
    Transform {
        task: String,
        attribute: String,
        #[source]
        source: TransformError,
    },
}

/// Failure of a whole task pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration was invalid.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// A declared service could not be resolved or constructed.
    #[error("task '{task}': could not resolve {kind} service '{identifier}'")]
    ServiceResolution {
        task: String,
        kind: &'static str,
        identifier: String,
        #[source]
        source: ConnectorError,
    },

    /// The task runs in async mode but its source cannot poll for changes.
    #[error("task '{task}': source service does not support asynchronous polling")]
    NotAsynchronous { task: String },

    /// The source enumeration itself failed; no entries were processed.
    #[error("task '{task}': source enumeration failed")]
    Source {
        task: String,
        #[source]
        source: ConnectorError,
    },

    /// The destination key enumeration failed; no entries were processed.
    #[error("task '{task}': destination enumeration failed")]
    Destination {
        task: String,
        #[source]
        source: ConnectorError,
    },

    /// One or more entries failed during the pass.
    #[error("task '{task}': {failed} of {seen} entries failed")]
    EntriesFailed {
        task: String,
        failed: usize,
        seen: usize,
    },
}

/// Failure of one entry within a pass.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The pivot key could not be derived from the source entry.
    #[error("pivot derivation failed")]
    Pivot(#[source] ConnectorError),

    /// Looking up the matching destination entry failed.
    #[error("destination lookup failed")]
    Fetch(#[source] ConnectorError),

    /// The reconciliation engine rejected the entry pair.
    #[error("reconciliation failed")]
    Reconcile(#[from] crate::reconcile::ReconcileError),

    /// Writing the plan to the destination failed.
    #[error("plan application failed")]
    Apply(#[source] ConnectorError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
