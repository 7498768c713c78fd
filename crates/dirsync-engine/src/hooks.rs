//! Post-pass hook registry.
//!
//! A task may declare a hook to run after a fully clean sync or clean pass.
//! Hooks are in-process invocables registered by name; the orchestrator logs
//! a hook failure and moves on, it never fails the task.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Hook invocation failure.
#[derive(Debug, Error)]
pub enum HookError {
    /// No hook is registered under the declared name.
    #[error("no hook registered under '{name}'")]
    NotFound { name: String },

    /// The hook itself failed.
    #[error("hook '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// A zero-argument invocable run after a task pass.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self) -> Result<(), String>;
}

type BoxedHookFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

/// Adapter turning an async closure into a [`Hook`].
pub struct FnHook {
    inner: BoxedHookFn,
}

impl FnHook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move || Box::pin(f())),
        }
    }
}

#[async_trait]
impl Hook for FnHook {
    async fn run(&self) -> Result<(), String> {
        (self.inner)().await
    }
}

/// Registry mapping declared hook names to invocables.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under a name.
    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) {
        self.hooks.insert(name.into(), hook);
    }

    /// Register an async closure under a name.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.register(name, Arc::new(FnHook::new(f)));
    }

    /// Invoke the hook registered under `name`.
    pub async fn invoke(&self, name: &str) -> Result<(), HookError> {
        let hook = self.hooks.get(name).ok_or_else(|| HookError::NotFound {
            name: name.to_string(),
        })?;
        hook.run().await.map_err(|message| HookError::Failed {
            name: name.to_string(),
            message,
        })
    }

    /// Whether a hook is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }
}
