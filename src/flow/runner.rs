//! Flow runner: executes deferred computations and aggregates their outcomes
//!
//! The runner drives every computation from inside its own future, so a run
//! never blocks a thread and never needs locks: the result buffer belongs to
//! the call that fills it.

use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::core::errors::{FlowError, Result};
use crate::core::options::RunOptions;
use crate::flow::hooks::{Discipline, FlowEvent, FlowHook, HookContext};
use crate::flow::item::Key;
use crate::flow::normalize::DeferredComputation;
use crate::flow::outcome::{Outcome, ResultCollection, Settled};

/// Executes normalized computations under one discipline
#[derive(Clone, Default)]
pub struct FlowRunner {
    pub(crate) options: RunOptions,
    hook: Option<Arc<dyn FlowHook>>,
}

impl FlowRunner {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn FlowHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run one at a time, in position order
    pub async fn run_serial<T: Send + 'static>(
        &self,
        computations: Vec<DeferredComputation<T>>,
    ) -> Result<ResultCollection<T>> {
        self.run(Discipline::Serial, computations).await
    }

    /// Run concurrently, keeping at most `concurrency` tasks in flight
    pub async fn run_parallel<T: Send + 'static>(
        &self,
        computations: Vec<DeferredComputation<T>>,
    ) -> Result<ResultCollection<T>> {
        self.run(Discipline::Parallel, computations).await
    }

    /// Execute `computations` under `discipline`.
    ///
    /// With `settle` the result holds one outcome per computation at its
    /// position. Without it the first failure is returned as
    /// [`FlowError::Task`] and no collection is produced.
    pub async fn run<T: Send + 'static>(
        &self,
        discipline: Discipline,
        mut computations: Vec<DeferredComputation<T>>,
    ) -> Result<ResultCollection<T>> {
        self.options.validate()?;
        let slots = Slots::new(&computations)?;
        computations.sort_by_key(DeferredComputation::position);

        let total = computations.len();
        let ctx = HookContext::new(Uuid::new_v4().to_string(), discipline);
        let span = info_span!(
            "flow_run",
            run_id = %ctx.run_id,
            discipline = %discipline,
            total,
            settle = self.options.settle
        );

        async move {
            info!("Starting {} run over {} tasks", discipline, total);
            self.notify_start(&ctx, total).await;

            let result = match discipline {
                Discipline::Serial => self.drive_serial(&ctx, slots, computations).await,
                Discipline::Parallel => self.drive_parallel(&ctx, slots, computations).await,
            };

            let success = matches!(&result, Ok(results) if results.all_succeeded());
            match &result {
                Ok(results) => info!(
                    succeeded = results.successes(),
                    failed = results.failures(),
                    "Run complete"
                ),
                Err(e) => info!(error = %e, category = %e.category(), "Run stopped"),
            }
            self.notify_complete(&ctx, success).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn notify_start(&self, ctx: &HookContext, total: usize) {
        if let Some(hook) = &self.hook {
            hook.on_start(ctx, total).await;
        }
    }

    async fn notify_complete(&self, ctx: &HookContext, success: bool) {
        if let Some(hook) = &self.hook {
            hook.on_complete(ctx, success).await;
        }
    }

    pub(crate) async fn emit_started(&self, ctx: &HookContext, key: &Key, position: usize) {
        if let Some(hook) = &self.hook {
            let event = FlowEvent::TaskStarted {
                key: key.clone(),
                position,
            };
            hook.handle(ctx, &event).await;
        }
    }

    pub(crate) async fn emit_outcome<T>(
        &self,
        ctx: &HookContext,
        key: &Key,
        position: usize,
        outcome: &Outcome<T>,
    ) {
        if let Some(hook) = &self.hook {
            let event = match outcome {
                Outcome::Success(_) => FlowEvent::TaskSucceeded {
                    key: key.clone(),
                    position,
                },
                Outcome::Failure(failure) => FlowEvent::TaskFailed {
                    key: key.clone(),
                    position,
                    error: failure.message(),
                },
            };
            hook.handle(ctx, &event).await;
        }
    }
}

/// Position-indexed result buffer for one run
pub(crate) struct Slots<T> {
    keys: Vec<Key>,
    outcomes: Vec<Option<Outcome<T>>>,
}

impl<T> Slots<T> {
    /// Positions must cover `0..len` exactly once
    pub(crate) fn new(computations: &[DeferredComputation<T>]) -> Result<Self> {
        let total = computations.len();
        let mut keys: Vec<Option<Key>> = vec![None; total];
        for computation in computations {
            let position = computation.position();
            let slot = keys.get_mut(position).ok_or_else(|| {
                FlowError::invalid_input(format!(
                    "task {} has position {} outside of 0..{}",
                    computation.key(),
                    position,
                    total
                ))
            })?;
            if slot.is_some() {
                return Err(FlowError::invalid_input(format!(
                    "position {} is used by more than one task",
                    position
                )));
            }
            *slot = Some(computation.key().clone());
        }

        Ok(Self {
            keys: keys.into_iter().flatten().collect(),
            outcomes: std::iter::repeat_with(|| None).take(total).collect(),
        })
    }

    pub(crate) fn fill(&mut self, position: usize, outcome: Outcome<T>) -> Result<()> {
        let slot = self
            .outcomes
            .get_mut(position)
            .ok_or_else(|| FlowError::internal(format!("no slot for position {}", position)))?;
        if slot.is_some() {
            return Err(FlowError::internal(format!("position {} settled twice", position)));
        }
        *slot = Some(outcome);
        Ok(())
    }

    pub(crate) fn into_collection(self) -> Result<ResultCollection<T>> {
        let entries = self
            .keys
            .into_iter()
            .zip(self.outcomes)
            .map(|(key, outcome)| match outcome {
                Some(outcome) => Ok(Settled { key, outcome }),
                None => Err(FlowError::internal(format!("task {} never settled", key))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultCollection::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::item::{Collection, Item};
    use crate::flow::normalize::normalize;

    #[tokio::test]
    async fn test_rejects_overlapping_positions() {
        let computations = vec![
            DeferredComputation::new(Key::Index(0), 0, async { Outcome::Success(1) }),
            DeferredComputation::new(Key::Index(1), 0, async { Outcome::Success(2) }),
        ];
        let err = FlowRunner::default().run_serial(computations).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_reordered_computations_keep_positions() {
        let mut computations = normalize(Collection::values(vec!["a", "b", "c"]), None);
        computations.reverse();

        let results = FlowRunner::default().run_parallel(computations).await.unwrap();
        assert_eq!(results.into_values().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_start() {
        let collection = Collection::sequence(vec![Item::producer(|| -> anyhow::Result<Item<i32>> {
            panic!("must not run")
        })]);
        let runner = FlowRunner::new(RunOptions::new().with_concurrency(0));
        let err = runner
            .run_parallel(normalize(collection, None))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration { .. }));
    }
}
