//! Turns a submitted collection into uniform deferred computations
//!
//! Nothing here can fail: mapper errors, task errors and panics all end up as
//! [`Outcome::Failure`] once the runner drives the computation.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

use crate::core::errors::TaskFailure;
use crate::flow::item::{Collection, Key, Mapper};
use crate::flow::outcome::Outcome;

/// A unit of work that yields an [`Outcome`] once started.
///
/// Nothing runs until the computation is polled for the first time.
pub struct DeferredComputation<T> {
    key: Key,
    position: usize,
    future: BoxFuture<'static, Outcome<T>>,
}

impl<T: Send + 'static> DeferredComputation<T> {
    pub fn new<F>(key: Key, position: usize, future: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            key,
            position,
            future: Box::pin(future),
        }
    }
}

impl<T> DeferredComputation<T> {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl<T> IntoFuture for DeferredComputation<T> {
    type Output = Outcome<T>;
    type IntoFuture = BoxFuture<'static, Outcome<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl<T> fmt::Debug for DeferredComputation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredComputation")
            .field("key", &self.key)
            .field("position", &self.position)
            .finish()
    }
}

/// Build one deferred computation per item, in collection order.
///
/// With a mapper, `mapper(item, key, keys)` is invoked when the computation
/// starts and its returned item is what gets resolved.
pub fn normalize<T: Send + 'static>(
    collection: Collection<T>,
    mapper: Option<Mapper<T>>,
) -> Vec<DeferredComputation<T>> {
    let keys: Arc<[Key]> = collection.keys().into();

    collection
        .into_entries()
        .into_iter()
        .enumerate()
        .map(|(position, (key, item))| {
            debug!(%key, position, kind = ?item.kind(), "Normalized item");
            let mapper = mapper.clone();
            let keys = keys.clone();
            let task_key = key.clone();

            let task = async move {
                let item = match mapper {
                    Some(mapper) => mapper(item, &task_key, &keys[..])?,
                    None => item,
                };
                item.resolve().await
            };

            let failure_key = key.clone();
            let future = AssertUnwindSafe(task).catch_unwind().map(move |caught| {
                match caught {
                    Ok(Ok(value)) => Outcome::Success(value),
                    Ok(Err(error)) => Outcome::Failure(TaskFailure::new(failure_key, error)),
                    Err(payload) => {
                        let message = panic_payload_to_string(&payload);
                        Outcome::Failure(TaskFailure::new(
                            failure_key,
                            anyhow::anyhow!("task panicked: {}", message),
                        ))
                    }
                }
            });

            DeferredComputation::new(key, position, future)
        })
        .collect()
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::item::{mapper, Item};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_producers_run_only_when_started() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let collection = Collection::sequence(vec![Item::producer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Item::value(7))
        })]);

        let mut computations = normalize(collection, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let computation = computations.remove(0);
        assert_eq!(computation.position(), 0);
        assert_eq!(computation.await.success(), Some(&7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mapper_receives_key_and_keys() {
        let collection =
            Collection::mapping(vec![("left", Item::value(1)), ("right", Item::value(2))]).unwrap();
        let double = mapper(|item: Item<i32>, key: &Key, keys: &[Key]| {
            assert_eq!(keys.len(), 2);
            let bonus = if key == &Key::from("right") { 100 } else { 0 };
            Ok(Item::deferred(async move {
                anyhow::Ok(item.resolve().await? * 2 + bonus)
            }))
        });

        let mut values = Vec::new();
        for computation in normalize(collection, Some(double)) {
            values.push(computation.await.into_result().unwrap());
        }
        assert_eq!(values, vec![2, 104]);
    }

    #[tokio::test]
    async fn test_failures_are_captured() {
        let collection: Collection<i32> = Collection::sequence(vec![
            Item::failed(anyhow::anyhow!("item failed")),
            Item::producer(|| panic!("producer exploded")),
            Item::value(3),
        ]);
        let reject_third = mapper(|item: Item<i32>, key: &Key, _keys: &[Key]| {
            if key == &Key::Index(2) {
                anyhow::bail!("mapper refused");
            }
            Ok(item)
        });

        let mut messages = Vec::new();
        for computation in normalize(collection, Some(reject_third)) {
            let outcome = computation.await;
            messages.push(outcome.failure().map(TaskFailure::message));
        }
        assert_eq!(
            messages,
            vec![
                Some("item failed".to_string()),
                Some("task panicked: producer exploded".to_string()),
                Some("mapper refused".to_string()),
            ]
        );
    }
}
