//! # dirsync connector framework
//!
//! Capability contracts and the shared data model for dirsync services.
//!
//! A synchronization task binds a [`SourceService`] (the authoritative side)
//! to a [`DestinationService`] (the side being converged). Concrete bindings
//! for directory, database, or flat-file systems implement these traits and
//! register a factory in the [`ServiceRegistry`]; the engine never depends on
//! a concrete transport.
//!
//! The data model is deliberately small: an [`Entry`] is a set of named,
//! multivalued string attributes; an [`EntryKey`] is the pivot under which
//! the two sides are matched; a [`ReconciliationPlan`] is the engine's
//! verdict for one matched pair.

pub mod entry;
pub mod error;
pub mod plan;
pub mod registry;
pub mod traits;

pub use entry::{Entry, EntryKey};
pub use error::{ConnectorError, ConnectorResult};
pub use plan::{PlanOperation, ReconciliationPlan};
pub use registry::{ServiceRegistry, ServiceSpec};
pub use traits::{
    AsynchronousSource, ChangeKind, CustomLogic, DestinationService, SourceService, SourceUpdate,
};
