//! End-to-end synchronization tests against in-memory services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dirsync_connector::{
    AsynchronousSource, ChangeKind, ConnectorError, ConnectorResult, DestinationService, Entry,
    EntryKey, PlanOperation, ReconciliationPlan, ServiceRegistry, SourceService, SourceUpdate,
};
use dirsync_engine::{
    Conditions, HookRegistry, Launcher, Policy, ServiceEndpoint, SyncConfig, SyncOptions,
    TaskConfig, TaskMode, ALL_TASKS,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Source over a fixed entry list, keyed by "uid".
struct MemorySource {
    entries: Mutex<Vec<Entry>>,
}

impl MemorySource {
    fn new(entries: Vec<Entry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
        })
    }
}

#[async_trait]
impl SourceService for MemorySource {
    fn name(&self) -> &str {
        "memory-source"
    }

    async fn fetch_all(&self) -> ConnectorResult<Vec<Entry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn fetch_matching(&self, key: &EntryKey) -> ConnectorResult<Option<Entry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.first(key.attribute()) == Some(key.value()))
            .cloned())
    }
}

/// Destination holding entries in a map keyed by their "uid" value.
struct MemoryDestination {
    entries: Mutex<HashMap<String, Entry>>,
    fail_applies: bool,
}

impl MemoryDestination {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            fail_applies: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            fail_applies: true,
        })
    }

    fn insert(&self, entry: Entry) {
        let uid = entry.first("uid").expect("uid").to_string();
        self.entries.lock().unwrap().insert(uid, entry);
    }

    fn get(&self, uid: &str) -> Option<Entry> {
        self.entries.lock().unwrap().get(uid).cloned()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl DestinationService for MemoryDestination {
    fn name(&self) -> &str {
        "memory-destination"
    }

    fn key_for(&self, entry: &Entry) -> ConnectorResult<EntryKey> {
        entry
            .first("uid")
            .map(|v| EntryKey::new("uid", v))
            .ok_or_else(|| ConnectorError::MissingPivot {
                attribute: "uid".to_string(),
            })
    }

    async fn fetch_matching(&self, key: &EntryKey) -> ConnectorResult<Option<Entry>> {
        Ok(self.entries.lock().unwrap().get(key.value()).cloned())
    }

    async fn fetch_all_keys(&self) -> ConnectorResult<Vec<EntryKey>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .map(|uid| EntryKey::new("uid", uid))
            .collect())
    }

    async fn apply(&self, plan: &ReconciliationPlan) -> ConnectorResult<()> {
        if self.fail_applies {
            return Err(ConnectorError::operation_failed("write rejected"));
        }
        let mut entries = self.entries.lock().unwrap();
        match plan.operation {
            PlanOperation::Create | PlanOperation::Update => {
                let target = plan.attributes.clone().unwrap_or_default();
                let mut stored = entries
                    .get(plan.key.value())
                    .cloned()
                    .unwrap_or_else(|| Entry::new().with_value("uid", plan.key.value()));
                for (name, values) in target.iter() {
                    if values.is_empty() {
                        stored.remove(name);
                    } else {
                        stored.set(name.clone(), values.clone());
                    }
                }
                entries.insert(plan.key.value().to_string(), stored);
            }
            PlanOperation::Delete => {
                entries.remove(plan.key.value());
            }
            PlanOperation::None => {}
        }
        Ok(())
    }
}

/// Async source draining a queue of update batches, one batch per poll.
struct QueueSource {
    batches: Mutex<Vec<Vec<SourceUpdate>>>,
    polls: AtomicUsize,
}

impl QueueSource {
    fn new(batches: Vec<Vec<SourceUpdate>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches),
            polls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceService for QueueSource {
    fn name(&self) -> &str {
        "queue-source"
    }

    async fn fetch_all(&self) -> ConnectorResult<Vec<Entry>> {
        Ok(vec![])
    }

    async fn fetch_matching(&self, _key: &EntryKey) -> ConnectorResult<Option<Entry>> {
        Ok(None)
    }

    fn as_asynchronous(&self) -> Option<&dyn AsynchronousSource> {
        Some(self)
    }
}

#[async_trait]
impl AsynchronousSource for QueueSource {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn fetch_updates(&self) -> ConnectorResult<Vec<SourceUpdate>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            Ok(vec![])
        } else {
            Ok(batches.remove(0))
        }
    }
}

fn task(name: &str, source: &str, destination: &str) -> TaskConfig {
    TaskConfig {
        name: name.to_string(),
        object_class: None,
        source: ServiceEndpoint {
            service: source.to_string(),
            connection: None,
            parameters: HashMap::new(),
        },
        destination: ServiceEndpoint {
            service: destination.to_string(),
            connection: None,
            parameters: HashMap::new(),
        },
        options: SyncOptions::default(),
        custom_logic: None,
        post_sync_hook: None,
        post_clean_hook: None,
    }
}

fn config(tasks: Vec<TaskConfig>) -> SyncConfig {
    SyncConfig {
        connections: HashMap::new(),
        tasks,
        threads: 2,
    }
}

fn registry_with(
    source_id: &str,
    source: Arc<MemorySource>,
    destination_id: &str,
    destination: Arc<MemoryDestination>,
) -> Arc<ServiceRegistry> {
    let mut registry = ServiceRegistry::new();
    registry.register_source(source_id, move |_spec| {
        Ok(Arc::clone(&source) as Arc<dyn SourceService>)
    });
    registry.register_destination(destination_id, move |_spec| {
        Ok(Arc::clone(&destination) as Arc<dyn DestinationService>)
    });
    Arc::new(registry)
}

fn jdoe(mail: &[&str]) -> Entry {
    Entry::new()
        .with_value("uid", "jdoe")
        .with("mail", mail.to_vec())
}

#[tokio::test]
async fn sync_creates_missing_entries() {
    init_tracing();
    let source = MemorySource::new(vec![jdoe(&["jdoe@example.com"])]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&[], &[ALL_TASKS.to_string()], &[])
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].applied, 1);
    let created = destination.get("jdoe").expect("created");
    assert_eq!(created.first("mail"), Some("jdoe@example.com"));
}

#[tokio::test]
async fn merge_policy_unions_mail_values() {
    let source = MemorySource::new(vec![jdoe(&["b@x.com"])]);
    let destination = MemoryDestination::new();
    destination.insert(jdoe(&["a@x.com"]));
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let mut users = task("users", "src", "dst");
    users.options.attributes.insert(
        "mail".to_string(),
        dirsync_engine::AttributePolicy {
            policy: Some(Policy::Merge),
            ..Default::default()
        },
    );

    let launcher = Launcher::new(config(vec![users]), registry, HookRegistry::new());
    let report = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();

    assert!(report.success());
    let entry = destination.get("jdoe").unwrap();
    assert_eq!(
        entry.get("mail"),
        Some(&["a@x.com".to_string(), "b@x.com".to_string()][..])
    );
}

#[tokio::test]
async fn force_policy_replaces_mail_values() {
    let source = MemorySource::new(vec![jdoe(&["b@x.com"])]);
    let destination = MemoryDestination::new();
    destination.insert(jdoe(&["a@x.com"]));
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();

    assert!(report.success());
    let entry = destination.get("jdoe").unwrap();
    assert_eq!(entry.get("mail"), Some(&["b@x.com".to_string()][..]));
}

#[tokio::test]
async fn second_pass_is_idempotent() {
    let source = MemorySource::new(vec![jdoe(&["jdoe@example.com"])]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let first = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();
    assert_eq!(first.outcomes[0].applied, 1);

    let second = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();
    assert!(second.success());
    assert_eq!(second.outcomes[0].applied, 0);
}

#[tokio::test]
async fn clean_without_delete_condition_keeps_orphans() {
    let source = MemorySource::new(vec![]);
    let destination = MemoryDestination::new();
    destination.insert(jdoe(&["a@x.com"]));
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&[], &[], &["users".to_string()])
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(report.outcomes[0].mode, TaskMode::Clean);
    assert_eq!(report.outcomes[0].applied, 0);
    assert_eq!(destination.len(), 1);
}

#[tokio::test]
async fn clean_with_delete_condition_removes_orphans() {
    let source = MemorySource::new(vec![jdoe(&["a@x.com"])]);
    let destination = MemoryDestination::new();
    destination.insert(jdoe(&["a@x.com"]));
    destination.insert(Entry::new().with_value("uid", "ghost"));
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    let mut users = task("users", "src", "dst");
    users.options.conditions = Conditions {
        delete: Some("true".to_string()),
        ..Conditions::default()
    };

    let launcher = Launcher::new(config(vec![users]), registry, HookRegistry::new());
    let report = launcher
        .launch(&[], &[], &["users".to_string()])
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(report.outcomes[0].applied, 1);
    assert!(destination.get("ghost").is_none());
    assert!(destination.get("jdoe").is_some());
}

#[tokio::test]
async fn unmatched_task_name_launches_nothing() {
    let source = MemorySource::new(vec![]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", destination);

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&[], &["groups".to_string()], &[])
        .await
        .unwrap();

    assert!(!report.success());
    assert!(report.outcomes.is_empty());
    assert!(report.scheduled.is_empty());
}

#[tokio::test]
async fn failing_task_does_not_affect_sibling() {
    let source = MemorySource::new(vec![jdoe(&["a@x.com"])]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    // "broken" references a source service nobody registered.
    let launcher = Launcher::new(
        config(vec![
            task("broken", "missing", "dst"),
            task("users", "src", "dst"),
        ]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&[], &[ALL_TASKS.to_string()], &[])
        .await
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.outcomes.len(), 2);
    let broken = report.outcomes.iter().find(|o| o.task == "broken").unwrap();
    let users = report.outcomes.iter().find(|o| o.task == "users").unwrap();
    assert!(!broken.is_success());
    assert!(users.is_success());
    assert!(destination.get("jdoe").is_some());
}

#[tokio::test]
async fn entry_failure_fails_task_and_skips_hook() {
    let source = MemorySource::new(vec![jdoe(&["a@x.com"])]);
    let destination = MemoryDestination::failing();
    let registry = registry_with("src", source, "dst", destination);

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hook_calls);
    let mut hooks = HookRegistry::new();
    hooks.register_fn("notify", move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let mut users = task("users", "src", "dst");
    users.post_sync_hook = Some("notify".to_string());

    let launcher = Launcher::new(config(vec![users]), registry, hooks);
    let report = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.outcomes[0].entry_failures, 1);
    // A dirty pass must not fire the post hook.
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn post_sync_hook_fires_after_clean_pass() {
    let source = MemorySource::new(vec![jdoe(&["a@x.com"])]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", Arc::clone(&destination));

    // The hook observes the destination populated before it runs.
    let seen_at_hook = Arc::new(AtomicUsize::new(usize::MAX));
    let seen = Arc::clone(&seen_at_hook);
    let dest = Arc::clone(&destination);
    let mut hooks = HookRegistry::new();
    hooks.register_fn("notify", move || {
        let seen = Arc::clone(&seen);
        let dest = Arc::clone(&dest);
        async move {
            seen.store(dest.len(), Ordering::SeqCst);
            Ok(())
        }
    });

    let mut users = task("users", "src", "dst");
    users.post_sync_hook = Some("notify".to_string());

    let launcher = Launcher::new(config(vec![users]), registry, hooks);
    let report = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(seen_at_hook.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hook_failure_does_not_fail_task() {
    let source = MemorySource::new(vec![jdoe(&["a@x.com"])]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", destination);

    let mut hooks = HookRegistry::new();
    hooks.register_fn("broken", || async { Err("exit status 1".to_string()) });

    let mut users = task("users", "src", "dst");
    users.post_sync_hook = Some("broken".to_string());

    let launcher = Launcher::new(config(vec![users]), registry, hooks);
    let report = launcher
        .launch(&[], &["users".to_string()], &[])
        .await
        .unwrap();

    assert!(report.success());
}

#[tokio::test]
async fn async_task_polls_and_drains_on_stop() {
    init_tracing();
    let update = SourceUpdate {
        entry: jdoe(&["a@x.com"]),
        change: ChangeKind::New,
    };
    let source = QueueSource::new(vec![vec![update]]);
    let destination = MemoryDestination::new();

    let mut registry = ServiceRegistry::new();
    let src = Arc::clone(&source);
    registry.register_source("queue", move |_spec| {
        Ok(Arc::clone(&src) as Arc<dyn SourceService>)
    });
    let dst = Arc::clone(&destination);
    registry.register_destination("dst", move |_spec| {
        Ok(Arc::clone(&dst) as Arc<dyn DestinationService>)
    });

    let launcher = Launcher::new(
        config(vec![task("users", "queue", "dst")]),
        Arc::new(registry),
        HookRegistry::new(),
    );
    let mut report = launcher
        .launch(&["users".to_string()], &[], &[])
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(report.scheduled.len(), 1);

    // Let a few ticks elapse, then stop and drain.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let handle = report.scheduled.remove(0);
    assert_eq!(handle.name(), "users");
    let stats = handle.stop().await;

    assert!(stats.ticks >= 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.entry_failures, 0);
    assert!(source.polls.load(Ordering::SeqCst) >= 1);
    assert!(destination.get("jdoe").is_some());
}

#[tokio::test]
async fn async_mode_requires_asynchronous_source() {
    let source = MemorySource::new(vec![]);
    let destination = MemoryDestination::new();
    let registry = registry_with("src", source, "dst", destination);

    let launcher = Launcher::new(
        config(vec![task("users", "src", "dst")]),
        registry,
        HookRegistry::new(),
    );
    let report = launcher
        .launch(&["users".to_string()], &[], &[])
        .await
        .unwrap();

    assert!(!report.success());
    assert!(report.scheduled.is_empty());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].mode, TaskMode::Async);
}
