//! # dirsync engine
//!
//! Attribute-level synchronization between a source and a destination
//! service: the configuration model, the pure reconciliation engine with its
//! policies, conditions, and transforms, the task orchestrator, the async
//! poll scheduler, and the launch surface.
//!
//! Service bindings implement the traits from `dirsync-connector` and
//! register factories in a [`ServiceRegistry`](dirsync_connector::ServiceRegistry);
//! the engine itself never touches a concrete transport.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirsync_connector::ServiceRegistry;
//! use dirsync_engine::{HookRegistry, Launcher, SyncConfig, ALL_TASKS};
//!
//! # async fn run(config: SyncConfig, registry: Arc<ServiceRegistry>) {
//! let launcher = Launcher::new(config, registry, HookRegistry::new());
//! let report = launcher
//!     .launch(&[], &[ALL_TASKS.to_string()], &[])
//!     .await
//!     .expect("invalid configuration");
//! assert!(report.success());
//! # }
//! ```

pub mod condition;
pub mod config;
pub mod error;
pub mod hooks;
pub mod launcher;
pub mod orchestrator;
pub mod policy;
pub mod reconcile;
pub mod scheduler;
pub mod task;
pub mod transform;

pub use config::{ConnectionConfig, ServiceEndpoint, SyncConfig, TaskConfig, DEFAULT_THREADS};
pub use error::{ConfigError, EngineError, EngineResult, EntryError};
pub use hooks::{FnHook, Hook, HookError, HookRegistry};
pub use launcher::{LaunchReport, Launcher, ALL_TASKS};
pub use orchestrator::Orchestrator;
pub use policy::{AttributePolicy, Conditions, Policy, SyncOptions};
pub use reconcile::{reconcile, ReconcileContext, ReconcileError};
pub use scheduler::{ScheduleStats, ScheduledTask};
pub use task::{TaskMode, TaskOutcome, TaskState};
