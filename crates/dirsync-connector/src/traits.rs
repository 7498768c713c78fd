//! Service capability traits
//!
//! Capability-based trait definitions for the systems a task binds together:
//! a [`SourceService`] that enumerates authoritative entries, a
//! [`DestinationService`] that is converged toward the source, and an
//! optional [`CustomLogic`] extension computing derived attributes.
//!
//! Concrete bindings (directory protocol, database, flat file) live outside
//! this crate; the engine only ever sees these contracts.

use std::time::Duration;

use async_trait::async_trait;

use crate::entry::{Entry, EntryKey};
use crate::error::ConnectorResult;
use crate::plan::ReconciliationPlan;

/// Capability for reading entries from an authoritative source system.
#[async_trait]
pub trait SourceService: Send + Sync {
    /// Display name of this service instance, for logs.
    fn name(&self) -> &str;

    /// Enumerate all entries the source currently holds.
    ///
    /// The sequence is finite and represents one pass over the source; a
    /// second enumeration requires calling this method again.
    async fn fetch_all(&self) -> ConnectorResult<Vec<Entry>>;

    /// Fetch the single entry matching the given pivot key, if any.
    ///
    /// Used by clean mode to decide whether a destination entry still has a
    /// source counterpart.
    async fn fetch_matching(&self, key: &EntryKey) -> ConnectorResult<Option<Entry>>;

    /// Downcast hook for the asynchronous capability.
    ///
    /// Sources that support interval-driven change polling override this to
    /// return `Some(self)`.
    fn as_asynchronous(&self) -> Option<&dyn AsynchronousSource> {
        None
    }
}

/// Kind of change reported by an asynchronous source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The entry did not exist at the previous poll.
    New,
    /// The entry existed before and has changed since.
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::New => write!(f, "new"),
            ChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// One changed entry reported by [`AsynchronousSource::fetch_updates`].
#[derive(Debug, Clone)]
pub struct SourceUpdate {
    /// The current state of the changed entry.
    pub entry: Entry,
    /// Whether the entry is new or modified since the previous poll.
    pub change: ChangeKind,
}

/// Capability for sources that detect changes incrementally.
///
/// Instead of a one-shot full enumeration, an asynchronous source is polled
/// on a fixed interval and reports only the entries that changed since the
/// previous poll.
#[async_trait]
pub trait AsynchronousSource: SourceService {
    /// Recommended interval between polls.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Fetch the entries that changed since the previous poll.
    async fn fetch_updates(&self) -> ConnectorResult<Vec<SourceUpdate>>;
}

/// Capability for reading and writing entries at the destination system.
#[async_trait]
pub trait DestinationService: Send + Sync {
    /// Display name of this service instance, for logs.
    fn name(&self) -> &str;

    /// Derive the pivot key under which a source entry is looked up here.
    ///
    /// The key scheme is service-defined (a DN template, a primary key
    /// column, ...). Fails with `MissingPivot` when the entry carries no
    /// usable pivot value.
    fn key_for(&self, entry: &Entry) -> ConnectorResult<EntryKey>;

    /// Fetch the destination entry matching the given pivot key, if any.
    async fn fetch_matching(&self, key: &EntryKey) -> ConnectorResult<Option<Entry>>;

    /// Enumerate the pivot keys of all entries this service manages.
    ///
    /// Drives the clean-mode traversal over entries that may no longer have
    /// a source counterpart.
    async fn fetch_all_keys(&self) -> ConnectorResult<Vec<EntryKey>>;

    /// Apply a reconciliation plan to the destination.
    ///
    /// Plans with operation `None` are accepted and ignored. An attribute
    /// present in the plan with an empty value list must be removed from the
    /// destination entry.
    async fn apply(&self, plan: &ReconciliationPlan) -> ConnectorResult<()>;
}

/// Extension hook computing derived attribute values during reconciliation.
///
/// When the extension declares a value for an attribute name, that value
/// takes precedence over the raw source value before the attribute policy
/// is applied. Implementations may be native Rust or adapters around an
/// embedded scripting engine; the engine only sees this contract.
pub trait CustomLogic: Send + Sync {
    /// Compute the value of `attribute` for the given source entry.
    ///
    /// Returns `None` when the extension has no opinion about the attribute.
    fn compute_attribute(&self, attribute: &str, source: &Entry) -> Option<Vec<String>>;
}
