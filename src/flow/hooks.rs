//! Lifecycle hooks for flow runs
//!
//! Hooks observe a run; they never influence ordering or settlement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::flow::item::Key;

/// Execution discipline of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Serial,
    Parallel,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Serial => write!(f, "serial"),
            Discipline::Parallel => write!(f, "parallel"),
        }
    }
}

/// Context provided to hooks for one run
#[derive(Clone, Debug)]
pub struct HookContext {
    /// Run ID for this invocation
    pub run_id: String,
    pub discipline: Discipline,
}

impl HookContext {
    pub fn new(run_id: impl Into<String>, discipline: Discipline) -> Self {
        Self {
            run_id: run_id.into(),
            discipline,
        }
    }
}

/// Events emitted while a run progresses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    TaskStarted {
        key: Key,
        position: usize,
    },
    TaskSucceeded {
        key: Key,
        position: usize,
    },
    TaskFailed {
        key: Key,
        position: usize,
        error: String,
    },
}

impl FlowEvent {
    pub fn key(&self) -> &Key {
        match self {
            FlowEvent::TaskStarted { key, .. }
            | FlowEvent::TaskSucceeded { key, .. }
            | FlowEvent::TaskFailed { key, .. } => key,
        }
    }
}

/// Observer of run lifecycle events
#[async_trait]
pub trait FlowHook: Send + Sync {
    /// Handle a per-task event
    async fn handle(&self, ctx: &HookContext, event: &FlowEvent);

    /// Optional: called before the first task starts
    async fn on_start(&self, _ctx: &HookContext, _total: usize) {}

    /// Optional: called once the run result is known
    async fn on_complete(&self, _ctx: &HookContext, _success: bool) {}
}

/// Composite hook that chains multiple hooks in registration order
#[derive(Clone, Default)]
pub struct CompositeHook {
    hooks: Vec<Arc<dyn FlowHook>>,
}

impl CompositeHook {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn add_hook(&mut self, hook: Arc<dyn FlowHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl FlowHook for CompositeHook {
    async fn handle(&self, ctx: &HookContext, event: &FlowEvent) {
        for hook in &self.hooks {
            hook.handle(ctx, event).await;
        }
    }

    async fn on_start(&self, ctx: &HookContext, total: usize) {
        for hook in &self.hooks {
            hook.on_start(ctx, total).await;
        }
    }

    async fn on_complete(&self, ctx: &HookContext, success: bool) {
        for hook in &self.hooks {
            hook.on_complete(ctx, success).await;
        }
    }
}

/// Logs every event through `tracing`
pub struct LoggingHook;

#[async_trait]
impl FlowHook for LoggingHook {
    async fn handle(&self, ctx: &HookContext, event: &FlowEvent) {
        match event {
            FlowEvent::TaskStarted { key, position } => {
                tracing::info!(run_id = %ctx.run_id, "Task started: {} (position {})", key, position);
            }
            FlowEvent::TaskSucceeded { key, position } => {
                tracing::info!(run_id = %ctx.run_id, "Task succeeded: {} (position {})", key, position);
            }
            FlowEvent::TaskFailed { key, position, error } => {
                tracing::error!(
                    run_id = %ctx.run_id,
                    "Task failed: {} (position {}) - {}",
                    key,
                    position,
                    error
                );
            }
        }
    }

    async fn on_start(&self, ctx: &HookContext, total: usize) {
        tracing::info!(run_id = %ctx.run_id, "Starting {} run over {} tasks", ctx.discipline, total);
    }

    async fn on_complete(&self, ctx: &HookContext, success: bool) {
        tracing::info!(run_id = %ctx.run_id, success, "{} run complete", ctx.discipline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FlowHook for Recorder {
        async fn handle(&self, _ctx: &HookContext, event: &FlowEvent) {
            self.seen.lock().unwrap().push(event.key().to_string());
        }

        async fn on_start(&self, _ctx: &HookContext, total: usize) {
            self.seen.lock().unwrap().push(format!("start:{}", total));
        }
    }

    #[tokio::test]
    async fn test_composite_fans_out_in_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let mut composite = CompositeHook::new();
        composite.add_hook(first.clone());
        composite.add_hook(Arc::new(LoggingHook));
        composite.add_hook(second.clone());
        assert_eq!(composite.len(), 3);

        let ctx = HookContext::new("run-1", Discipline::Serial);
        composite.on_start(&ctx, 1).await;
        composite
            .handle(
                &ctx,
                &FlowEvent::TaskStarted {
                    key: Key::from("a"),
                    position: 0,
                },
            )
            .await;
        composite.on_complete(&ctx, true).await;

        let expected = vec!["start:1".to_string(), "a".to_string()];
        assert_eq!(*first.seen.lock().unwrap(), expected);
        assert_eq!(*second.seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_event_serialization() {
        let event = FlowEvent::TaskFailed {
            key: Key::Index(1),
            position: 1,
            error: "foo".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "TaskFailed", "key": 1, "position": 1, "error": "foo"})
        );
    }
}
