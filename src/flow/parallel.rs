//! Parallel discipline with an optional concurrency limit
//!
//! Computations are polled together from the runner's own future; completion
//! order is free, placement in the result is by position.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::core::errors::{FlowError, Result};
use crate::flow::hooks::HookContext;
use crate::flow::item::Key;
use crate::flow::normalize::DeferredComputation;
use crate::flow::outcome::{Outcome, ResultCollection};
use crate::flow::runner::{FlowRunner, Slots};

type InFlight<T> = FuturesUnordered<BoxFuture<'static, (Key, usize, Outcome<T>)>>;

impl FlowRunner {
    pub(crate) async fn drive_parallel<T: Send + 'static>(
        &self,
        ctx: &HookContext,
        mut slots: Slots<T>,
        computations: Vec<DeferredComputation<T>>,
    ) -> Result<ResultCollection<T>> {
        let total = computations.len();
        let limit = self.options.effective_concurrency(total);
        debug!(total, limit, "Parallel run limits");

        let mut queue = computations.into_iter();
        let mut in_flight: InFlight<T> = FuturesUnordered::new();

        for computation in queue.by_ref().take(limit) {
            self.launch(ctx, &mut in_flight, computation).await;
        }

        loop {
            let Some((key, position, outcome)) = in_flight.next().await else {
                break;
            };
            self.emit_outcome(ctx, &key, position, &outcome).await;

            match outcome {
                Outcome::Failure(failure) if !self.options.settle => {
                    warn!(
                        %key,
                        position,
                        in_flight = in_flight.len(),
                        error = %failure,
                        "Task failed, no further tasks will start"
                    );
                    release_in_flight(in_flight).await;
                    return Err(FlowError::Task(failure));
                }
                outcome => {
                    debug!(
                        %key,
                        position,
                        success = outcome.is_success(),
                        active = in_flight.len(),
                        "Task settled"
                    );
                    slots.fill(position, outcome)?;
                }
            }

            if let Some(next) = queue.next() {
                self.launch(ctx, &mut in_flight, next).await;
            }
        }

        slots.into_collection()
    }

    async fn launch<T: Send + 'static>(
        &self,
        ctx: &HookContext,
        in_flight: &mut InFlight<T>,
        computation: DeferredComputation<T>,
    ) {
        let key = computation.key().clone();
        let position = computation.position();

        self.emit_started(ctx, &key, position).await;
        debug!(%key, position, active = in_flight.len() + 1, "Launching task");

        in_flight.push(
            async move {
                let outcome = computation.await;
                (key, position, outcome)
            }
            .boxed(),
        );
    }
}

/// Let computations that were already started finish after a fail-fast
/// result. Their outcomes are discarded.
///
/// Inside a tokio runtime they are detached onto it so the caller gets the
/// failure right away; otherwise they are drained before returning.
async fn release_in_flight<T: Send + 'static>(in_flight: InFlight<T>) {
    if in_flight.is_empty() {
        return;
    }

    let remaining = in_flight.len();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            info!(remaining, "Detaching in-flight tasks, their outcomes are discarded");
            handle.spawn(async move {
                in_flight.for_each(|_| async {}).await;
            });
        }
        Err(_) => {
            info!(remaining, "Draining in-flight tasks, their outcomes are discarded");
            in_flight.for_each(|_| async {}).await;
        }
    }
}
