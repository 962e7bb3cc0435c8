//! Action router
//!
//! The in-process implementation of the backend action boundary: a registry
//! of named async handlers that embedding backends mount their services on.
//! The gateway only ever sees the `ActionDispatcher` trait, so a remote
//! (broker-backed) dispatcher can replace this without touching gateway
//! code.

use async_trait::async_trait;
use beacon_core::{ActionDispatcher, ActionError, ActionMetadata, ActionResult};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type HandlerFn =
    Arc<dyn Fn(Value, ActionMetadata) -> BoxFuture<'static, ActionResult<Value>> + Send + Sync>;

/// Registry of backend action handlers
#[derive(Default)]
pub struct ActionRouter {
    handlers: DashMap<String, HandlerFn>,
    /// Per-action invocation counters
    invocations: DashMap<String, Arc<AtomicU64>>,
}

impl ActionRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a handler under an action name. A later registration under the
    /// same name replaces the earlier one.
    pub fn register<F, Fut>(&self, action: impl Into<String>, handler: F)
    where
        F: Fn(Value, ActionMetadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult<Value>> + Send + 'static,
    {
        let action = action.into();
        let handler: HandlerFn = Arc::new(move |payload, metadata| {
            Box::pin(handler(payload, metadata)) as BoxFuture<'static, ActionResult<Value>>
        });
        self.handlers.insert(action.clone(), handler);
        tracing::debug!(action = %action, "Action handler mounted");
    }

    /// Whether any handler is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// How many times an action has been invoked through this router.
    #[must_use]
    pub fn invocation_count(&self, action: &str) -> u64 {
        self.invocations
            .get(action)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ActionDispatcher for ActionRouter {
    async fn invoke(
        &self,
        action: &str,
        payload: Value,
        metadata: ActionMetadata,
    ) -> ActionResult<Value> {
        let handler = self
            .handlers
            .get(action)
            .map(|h| h.clone())
            .ok_or_else(|| ActionError::UnknownAction(action.to_string()))?;

        self.invocations
            .entry(action.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, Ordering::SeqCst);

        handler(payload, metadata).await
    }
}

impl std::fmt::Debug for ActionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRouter")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
