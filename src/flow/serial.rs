//! Serial discipline: one computation at a time, in position order

use tracing::{debug, warn};

use crate::core::errors::{FlowError, Result};
use crate::flow::hooks::HookContext;
use crate::flow::normalize::DeferredComputation;
use crate::flow::outcome::{Outcome, ResultCollection};
use crate::flow::runner::{FlowRunner, Slots};

impl FlowRunner {
    pub(crate) async fn drive_serial<T: Send + 'static>(
        &self,
        ctx: &HookContext,
        mut slots: Slots<T>,
        computations: Vec<DeferredComputation<T>>,
    ) -> Result<ResultCollection<T>> {
        let total = computations.len();

        for computation in computations {
            let key = computation.key().clone();
            let position = computation.position();

            debug!(%key, position, total, "Starting task");
            self.emit_started(ctx, &key, position).await;

            let outcome = computation.await;
            self.emit_outcome(ctx, &key, position, &outcome).await;

            match outcome {
                Outcome::Failure(failure) if !self.options.settle => {
                    // Remaining computations are dropped without being started.
                    warn!(%key, position, error = %failure, "Task failed, stopping serial run");
                    return Err(FlowError::Task(failure));
                }
                outcome => {
                    debug!(%key, position, success = outcome.is_success(), "Task settled");
                    slots.fill(position, outcome)?;
                }
            }
        }

        slots.into_collection()
    }
}
