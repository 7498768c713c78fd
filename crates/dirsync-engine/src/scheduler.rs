//! Async poll scheduler.
//!
//! One spawned loop per async task, ticking at the source's poll interval.
//! A tick runs inline in the loop, so two ticks of the same task never
//! overlap: when a tick overruns its interval the missed ticks are dropped,
//! not queued (`MissedTickBehavior::Skip`). Entry failures within a tick are
//! logged and counted; the loop keeps polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::orchestrator::{process_entries, PassStats, ResolvedTask};

/// Cumulative counters over the life of a scheduled task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScheduleStats {
    pub ticks: u64,
    pub entries_seen: usize,
    pub applied: usize,
    pub entry_failures: usize,
}

/// Handle to a running async task loop.
pub struct ScheduledTask {
    name: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<ScheduleStats>,
}

impl ScheduledTask {
    /// Name of the task this handle controls.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal shutdown and wait for the loop to drain.
    ///
    /// An in-flight tick runs to completion before this returns.
    pub async fn stop(self) -> ScheduleStats {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(stats) => stats,
            Err(error) => {
                warn!(task = %self.name, %error, "scheduled task aborted");
                ScheduleStats::default()
            }
        }
    }

    /// Whether the loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the poll loop for a resolved async task.
pub(crate) fn spawn(
    resolved: Arc<ResolvedTask>,
    poll_interval: Duration,
    threads: usize,
) -> ScheduledTask {
    let (shutdown, mut rx) = watch::channel(false);
    let name = resolved.name.clone();

    info!(task = %name, interval_ms = poll_interval.as_millis() as u64, "async task scheduled");
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = ScheduleStats::default();

        loop {
            tokio::select! {
                _ = rx.changed() => break,
                _ = interval.tick() => {
                    stats.ticks += 1;
                    let tick = poll_once(&resolved, threads).await;
                    stats.entries_seen += tick.seen;
                    stats.applied += tick.applied;
                    stats.entry_failures += tick.failures;
                }
            }
        }

        info!(
            task = %resolved.name,
            ticks = stats.ticks,
            entries = stats.entries_seen,
            applied = stats.applied,
            "async task stopped"
        );
        stats
    });

    ScheduledTask {
        name,
        shutdown,
        handle,
    }
}

async fn poll_once(resolved: &Arc<ResolvedTask>, threads: usize) -> PassStats {
    let Some(asynchronous) = resolved.source.as_asynchronous() else {
        // Checked before scheduling; a source cannot lose the capability.
        warn!(task = %resolved.name, "source no longer asynchronous");
        return PassStats::default();
    };

    let updates = match asynchronous.fetch_updates().await {
        Ok(updates) => updates,
        Err(error) => {
            // Transient poll failures wait for the next tick.
            warn!(task = %resolved.name, %error, transient = error.is_transient(), "poll failed");
            return PassStats {
                seen: 0,
                applied: 0,
                failures: 1,
            };
        }
    };
    if updates.is_empty() {
        return PassStats::default();
    }

    debug!(task = %resolved.name, updates = updates.len(), "processing source updates");
    let entries = updates
        .into_iter()
        .map(|update| {
            debug!(task = %resolved.name, change = %update.change, "source update");
            update.entry
        })
        .collect();
    process_entries(resolved, entries, threads).await
}
