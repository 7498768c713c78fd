//! Task orchestrator.
//!
//! Resolves a task's declared services, drives one pass in the requested
//! mode, and folds every failure into the task's [`TaskOutcome`]. A task is
//! an isolation boundary: nothing that happens inside one task run can
//! affect a sibling task.
//!
//! Per-entry work runs on a bounded worker pool (`Semaphore` + `JoinSet`).
//! Entry-level failures are caught at the worker boundary, logged, and
//! counted; the pass continues with the remaining entries and the task is
//! reported failed at the end if any entry failed.

use std::sync::Arc;

use dirsync_connector::{
    CustomLogic, DestinationService, Entry, EntryKey, ServiceRegistry, SourceService,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{SyncConfig, TaskConfig, DEFAULT_THREADS};
use crate::error::{EngineError, EngineResult, EntryError};
use crate::hooks::HookRegistry;
use crate::policy::SyncOptions;
use crate::reconcile::{reconcile, ReconcileContext};
use crate::scheduler::{self, ScheduledTask};
use crate::task::{TaskMode, TaskOutcome, TaskState};

/// A task with its services resolved, ready to run passes.
pub(crate) struct ResolvedTask {
    pub name: String,
    pub source: Arc<dyn SourceService>,
    pub destination: Arc<dyn DestinationService>,
    pub custom_logic: Option<Arc<dyn CustomLogic>>,
    pub options: Arc<SyncOptions>,
    pub post_sync_hook: Option<String>,
    pub post_clean_hook: Option<String>,
}

/// Counters accumulated over one pass.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PassStats {
    pub seen: usize,
    pub applied: usize,
    pub failures: usize,
}

/// Runs task passes against a service registry.
pub struct Orchestrator {
    registry: Arc<ServiceRegistry>,
    hooks: HookRegistry,
    threads: usize,
}

impl Orchestrator {
    pub fn new(registry: Arc<ServiceRegistry>, hooks: HookRegistry) -> Self {
        Self {
            registry,
            hooks,
            threads: DEFAULT_THREADS,
        }
    }

    /// Set the worker pool size, normally `SyncConfig.threads`.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Run one pass of a task in the given mode.
    ///
    /// Never panics across the task boundary; every failure is folded into
    /// the returned outcome. `Async` mode runs a single poll tick here; the
    /// continuous loop lives in [`Orchestrator::start_async`].
    pub async fn run_task(
        &self,
        config: &SyncConfig,
        task: &TaskConfig,
        mode: TaskMode,
    ) -> TaskOutcome {
        let resolved = match self.resolve(config, task) {
            Ok(resolved) => Arc::new(resolved),
            Err(error) => {
                warn!(task = %task.name, %mode, %error, "task failed to start");
                return TaskOutcome::failed(&task.name, mode, error);
            }
        };

        info!(task = %resolved.name, %mode, "task started");
        let outcome = match mode {
            TaskMode::Sync => self.run_sync(&resolved).await,
            TaskMode::Clean => self.run_clean(&resolved).await,
            TaskMode::Async => self.run_async_tick(&resolved).await,
        };
        match outcome.state {
            TaskState::Completed => info!(
                task = %outcome.task,
                %mode,
                entries = outcome.entries_seen,
                applied = outcome.applied,
                "task completed"
            ),
            _ => warn!(
                task = %outcome.task,
                %mode,
                entries = outcome.entries_seen,
                failed = outcome.entry_failures,
                "task failed"
            ),
        }
        outcome
    }

    /// Start a continuous async task on the poll scheduler.
    ///
    /// Fails when the task's source does not support incremental polling.
    pub fn start_async(
        &self,
        config: &SyncConfig,
        task: &TaskConfig,
    ) -> EngineResult<ScheduledTask> {
        let resolved = Arc::new(self.resolve(config, task)?);
        let interval = match resolved.source.as_asynchronous() {
            Some(asynchronous) => asynchronous.poll_interval(),
            None => {
                return Err(EngineError::NotAsynchronous {
                    task: task.name.clone(),
                })
            }
        };
        Ok(scheduler::spawn(resolved, interval, self.threads))
    }

    fn resolve(&self, config: &SyncConfig, task: &TaskConfig) -> EngineResult<ResolvedTask> {
        let source = self
            .registry
            .resolve_source(
                &task.source.service,
                &config.service_spec(task, &task.source),
            )
            .map_err(|source| EngineError::ServiceResolution {
                task: task.name.clone(),
                kind: "source",
                identifier: task.source.service.clone(),
                source,
            })?;
        let destination = self
            .registry
            .resolve_destination(
                &task.destination.service,
                &config.service_spec(task, &task.destination),
            )
            .map_err(|source| EngineError::ServiceResolution {
                task: task.name.clone(),
                kind: "destination",
                identifier: task.destination.service.clone(),
                source,
            })?;
        let custom_logic = task
            .custom_logic
            .as_ref()
            .map(|identifier| {
                self.registry.resolve_custom_logic(identifier).map_err(|source| {
                    EngineError::ServiceResolution {
                        task: task.name.clone(),
                        kind: "custom-logic",
                        identifier: identifier.clone(),
                        source,
                    }
                })
            })
            .transpose()?;

        Ok(ResolvedTask {
            name: task.name.clone(),
            source,
            destination,
            custom_logic,
            options: Arc::new(task.options.clone()),
            post_sync_hook: task.post_sync_hook.clone(),
            post_clean_hook: task.post_clean_hook.clone(),
        })
    }

    async fn run_sync(&self, resolved: &Arc<ResolvedTask>) -> TaskOutcome {
        let entries = match resolved.source.fetch_all().await {
            Ok(entries) => entries,
            Err(source) => {
                return TaskOutcome::failed(
                    &resolved.name,
                    TaskMode::Sync,
                    EngineError::Source {
                        task: resolved.name.clone(),
                        source,
                    },
                )
            }
        };

        let stats = process_entries(resolved, entries, self.threads).await;
        if stats.failures == 0 {
            self.fire_hook(&resolved.name, resolved.post_sync_hook.as_deref())
                .await;
        }
        finish(resolved, TaskMode::Sync, stats)
    }

    async fn run_clean(&self, resolved: &Arc<ResolvedTask>) -> TaskOutcome {
        let keys = match resolved.destination.fetch_all_keys().await {
            Ok(keys) => keys,
            Err(source) => {
                return TaskOutcome::failed(
                    &resolved.name,
                    TaskMode::Clean,
                    EngineError::Destination {
                        task: resolved.name.clone(),
                        source,
                    },
                )
            }
        };

        let stats = process_keys(resolved, keys, self.threads).await;
        if stats.failures == 0 {
            self.fire_hook(&resolved.name, resolved.post_clean_hook.as_deref())
                .await;
        }
        finish(resolved, TaskMode::Clean, stats)
    }

    async fn run_async_tick(&self, resolved: &Arc<ResolvedTask>) -> TaskOutcome {
        let updates = match resolved.source.as_asynchronous() {
            Some(asynchronous) => asynchronous.fetch_updates().await,
            None => {
                return TaskOutcome::failed(
                    &resolved.name,
                    TaskMode::Async,
                    EngineError::NotAsynchronous {
                        task: resolved.name.clone(),
                    },
                )
            }
        };
        let updates = match updates {
            Ok(updates) => updates,
            Err(source) => {
                return TaskOutcome::failed(
                    &resolved.name,
                    TaskMode::Async,
                    EngineError::Source {
                        task: resolved.name.clone(),
                        source,
                    },
                )
            }
        };

        let entries = updates
            .into_iter()
            .map(|update| {
                debug!(task = %resolved.name, change = %update.change, "source update");
                update.entry
            })
            .collect();
        let stats = process_entries(resolved, entries, self.threads).await;
        finish(resolved, TaskMode::Async, stats)
    }

    async fn fire_hook(&self, task: &str, hook: Option<&str>) {
        if let Some(name) = hook {
            if let Err(error) = self.hooks.invoke(name).await {
                // Observational only; a hook failure never fails the task.
                warn!(task = %task, hook = %name, %error, "post hook failed");
            } else {
                debug!(task = %task, hook = %name, "post hook ran");
            }
        }
    }
}

fn finish(resolved: &ResolvedTask, mode: TaskMode, stats: PassStats) -> TaskOutcome {
    let (state, error) = if stats.failures == 0 {
        (TaskState::Completed, None)
    } else {
        (
            TaskState::Failed,
            Some(EngineError::EntriesFailed {
                task: resolved.name.clone(),
                failed: stats.failures,
                seen: stats.seen,
            }),
        )
    };
    TaskOutcome {
        task: resolved.name.clone(),
        mode,
        state,
        entries_seen: stats.seen,
        applied: stats.applied,
        entry_failures: stats.failures,
        error,
    }
}

/// Reconcile and apply a batch of source entries on the bounded pool.
pub(crate) async fn process_entries(
    resolved: &Arc<ResolvedTask>,
    entries: Vec<Entry>,
    threads: usize,
) -> PassStats {
    let semaphore = Arc::new(Semaphore::new(threads.max(1)));
    let mut workers: JoinSet<Result<bool, EntryError>> = JoinSet::new();
    let mut stats = PassStats::default();

    for entry in entries {
        stats.seen += 1;
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let resolved = Arc::clone(resolved);
        workers.spawn(async move {
            let _permit = permit;
            sync_one(&resolved, entry).await
        });
    }

    drain(&resolved.name, workers, &mut stats).await;
    stats
}

/// Check a batch of destination keys against the source on the bounded pool.
async fn process_keys(
    resolved: &Arc<ResolvedTask>,
    keys: Vec<EntryKey>,
    threads: usize,
) -> PassStats {
    let semaphore = Arc::new(Semaphore::new(threads.max(1)));
    let mut workers: JoinSet<Result<bool, EntryError>> = JoinSet::new();
    let mut stats = PassStats::default();

    for key in keys {
        stats.seen += 1;
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let resolved = Arc::clone(resolved);
        workers.spawn(async move {
            let _permit = permit;
            clean_one(&resolved, key).await
        });
    }

    drain(&resolved.name, workers, &mut stats).await;
    stats
}

async fn drain(task: &str, mut workers: JoinSet<Result<bool, EntryError>>, stats: &mut PassStats) {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(applied)) => {
                if applied {
                    stats.applied += 1;
                }
            }
            Ok(Err(error)) => {
                warn!(task = %task, %error, "entry failed");
                stats.failures += 1;
            }
            Err(error) => {
                // A panicking worker fails its entry, not the process.
                warn!(task = %task, %error, "entry worker aborted");
                stats.failures += 1;
            }
        }
    }
}

/// Converge one source entry. Returns whether a plan was written.
async fn sync_one(resolved: &ResolvedTask, entry: Entry) -> Result<bool, EntryError> {
    let key = resolved
        .destination
        .key_for(&entry)
        .map_err(EntryError::Pivot)?;
    let existing = resolved
        .destination
        .fetch_matching(&key)
        .await
        .map_err(EntryError::Fetch)?;

    let mut ctx = ReconcileContext::new(&resolved.options);
    if let Some(logic) = &resolved.custom_logic {
        ctx = ctx.with_custom_logic(logic.as_ref());
    }
    let plan = reconcile(Some(&entry), existing.as_ref(), key, ctx)?;
    if !plan.is_write() {
        return Ok(false);
    }

    debug!(task = %resolved.name, key = %plan.key, operation = %plan.operation, "applying plan");
    resolved
        .destination
        .apply(&plan)
        .await
        .map_err(EntryError::Apply)?;
    Ok(true)
}

/// Check one destination key for a vanished source counterpart.
async fn clean_one(resolved: &ResolvedTask, key: EntryKey) -> Result<bool, EntryError> {
    let still_at_source = resolved
        .source
        .fetch_matching(&key)
        .await
        .map_err(EntryError::Fetch)?;
    if still_at_source.is_some() {
        return Ok(false);
    }

    let existing = resolved
        .destination
        .fetch_matching(&key)
        .await
        .map_err(EntryError::Fetch)?;
    let Some(existing) = existing else {
        // Already gone; another pass may have removed it.
        return Ok(false);
    };

    let ctx = ReconcileContext::new(&resolved.options);
    let plan = reconcile(None, Some(&existing), key, ctx)?;
    if !plan.is_write() {
        return Ok(false);
    }

    debug!(task = %resolved.name, key = %plan.key, operation = %plan.operation, "applying plan");
    resolved
        .destination
        .apply(&plan)
        .await
        .map_err(EntryError::Apply)?;
    Ok(true)
}
