//! Launch surface.
//!
//! The process-facing entry point: given the validated configuration and the
//! requested task names per mode, run every selected task and aggregate the
//! outcomes. Sync and clean runs for distinct tasks execute concurrently;
//! async tasks are handed to the poll scheduler and their handles returned
//! for the caller to stop later.

use std::sync::Arc;

use dirsync_connector::ServiceRegistry;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::EngineResult;
use crate::hooks::HookRegistry;
use crate::orchestrator::Orchestrator;
use crate::scheduler::ScheduledTask;
use crate::task::{TaskMode, TaskOutcome};

/// Wildcard selecting every declared task for a mode.
pub const ALL_TASKS: &str = "all";

/// Outcome aggregation for one launch.
pub struct LaunchReport {
    /// Finished sync/clean outcomes plus failed async starts, in
    /// configuration order.
    pub outcomes: Vec<TaskOutcome>,
    /// Handles of the async tasks now running on the scheduler.
    pub scheduled: Vec<ScheduledTask>,
}

impl LaunchReport {
    /// Whether the launch succeeded: at least one task was launched and no
    /// launched task failed. A selection matching nothing is a failure.
    pub fn success(&self) -> bool {
        let launched = self.outcomes.len() + self.scheduled.len();
        launched > 0 && self.outcomes.iter().all(TaskOutcome::is_success)
    }
}

/// Runs a selection of the configured tasks.
pub struct Launcher {
    config: Arc<SyncConfig>,
    orchestrator: Arc<Orchestrator>,
}

impl Launcher {
    pub fn new(config: SyncConfig, registry: Arc<ServiceRegistry>, hooks: HookRegistry) -> Self {
        let threads = config.threads;
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(Orchestrator::new(registry, hooks).with_threads(threads)),
        }
    }

    /// Launch the selected tasks.
    ///
    /// Each list selects declared tasks by name for one mode; the
    /// [`ALL_TASKS`] keyword selects every declared task. Names matching no
    /// declared task launch nothing. Fails early only when the
    /// configuration itself is invalid; task failures are reported per
    /// task in the returned report.
    pub async fn launch(
        &self,
        async_tasks: &[String],
        sync_tasks: &[String],
        clean_tasks: &[String],
    ) -> EngineResult<LaunchReport> {
        self.config.validate()?;

        let mut scheduled = Vec::new();
        let mut failed_starts = Vec::new();
        let mut runs: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        let mut sequence = 0usize;

        // Declared order, not selection order.
        for task in &self.config.tasks {
            if selected(async_tasks, &task.name) {
                match self.orchestrator.start_async(&self.config, task) {
                    Ok(handle) => scheduled.push(handle),
                    Err(err) => {
                        error!(task = %task.name, %err, "async task failed to start");
                        failed_starts.push((
                            sequence,
                            TaskOutcome::failed(&task.name, TaskMode::Async, err),
                        ));
                    }
                }
                sequence += 1;
            }
            for (list, mode) in [(sync_tasks, TaskMode::Sync), (clean_tasks, TaskMode::Clean)] {
                if selected(list, &task.name) {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    let config = Arc::clone(&self.config);
                    let task = task.clone();
                    let index = sequence;
                    sequence += 1;
                    runs.spawn(async move {
                        (index, orchestrator.run_task(&config, &task, mode).await)
                    });
                }
            }
        }

        let mut outcomes = failed_starts;
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(indexed) => outcomes.push(indexed),
                Err(err) => error!(%err, "task run aborted"),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<TaskOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        if outcomes.is_empty() && scheduled.is_empty() {
            warn!("no task matched the requested names");
        } else {
            info!(
                launched = outcomes.len() + scheduled.len(),
                failed = outcomes.iter().filter(|o| !o.is_success()).count(),
                polling = scheduled.len(),
                "launch finished"
            );
        }
        Ok(LaunchReport {
            outcomes,
            scheduled,
        })
    }
}

fn selected(requested: &[String], name: &str) -> bool {
    requested
        .iter()
        .any(|r| r.eq_ignore_ascii_case(ALL_TASKS) || r == name)
}
