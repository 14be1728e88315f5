//! Input model for a flow run
//!
//! Every entry submitted to a run is classified once, at the boundary, as a
//! plain value, a deferred computation or a zero-argument producer.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::core::errors::{FlowError, Result};

/// A future that eventually yields the value of an item
pub type Deferred<T> = BoxFuture<'static, anyhow::Result<T>>;

/// A zero-argument function producing another item when the task starts
pub type Producer<T> = Box<dyn FnOnce() -> anyhow::Result<Item<T>> + Send>;

/// Transform applied to each item right before it runs.
///
/// Receives the item, its key and the keys of the whole collection.
pub type Mapper<T> = Arc<dyn Fn(Item<T>, &Key, &[Key]) -> anyhow::Result<Item<T>> + Send + Sync>;

/// Wrap a closure into a [`Mapper`]
pub fn mapper<T, F>(f: F) -> Mapper<T>
where
    F: Fn(Item<T>, &Key, &[Key]) -> anyhow::Result<Item<T>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Placement identity of an item in its collection
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "#{}", index),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Classification of an item, for logging
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Value,
    Deferred,
    Producer,
}

/// One entry of an input collection
pub enum Item<T> {
    /// Already available value
    Value(T),
    /// Computation awaited when the task starts
    Deferred(Deferred<T>),
    /// Invoked lazily when the task starts
    Producer(Producer<T>),
}

impl<T: Send + 'static> Item<T> {
    pub fn value(value: T) -> Self {
        Item::Value(value)
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Item::Deferred(Box::pin(future))
    }

    pub fn producer<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Item<T>> + Send + 'static,
    {
        Item::Producer(Box::new(f))
    }

    /// An item whose computation fails with `error`
    pub fn failed<E: Into<anyhow::Error>>(error: E) -> Self {
        let error = error.into();
        Item::Deferred(Box::pin(async move { Err(error) }))
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Value(_) => ItemKind::Value,
            Item::Deferred(_) => ItemKind::Deferred,
            Item::Producer(_) => ItemKind::Producer,
        }
    }

    /// Drive the item to its value. Producers are called, and whatever they
    /// return is resolved in turn.
    pub async fn resolve(self) -> anyhow::Result<T> {
        let mut item = self;
        loop {
            item = match item {
                Item::Value(value) => return Ok(value),
                Item::Deferred(future) => return future.await,
                Item::Producer(produce) => produce()?,
            };
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Item<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Item::Deferred(_) => f.write_str("Deferred(..)"),
            Item::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Ordered, key-unique set of items submitted to a run
pub struct Collection<T> {
    entries: Vec<(Key, Item<T>)>,
}

impl<T: Send + 'static> Collection<T> {
    /// Ordered sequence; keys are the positions
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Item<T>>,
    {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Key::Index(index), item))
            .collect();
        Self { entries }
    }

    /// Sequence of plain values
    pub fn values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::sequence(values.into_iter().map(Item::Value))
    }

    /// Named entries in insertion order. Names must be unique.
    pub fn mapping<K, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Item<T>)>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (name, item) in pairs {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(FlowError::invalid_input(format!(
                    "duplicate key '{}' in mapping",
                    name
                )));
            }
            entries.push((Key::Name(name), item));
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    pub(crate) fn into_entries(self) -> Vec<(Key, Item<T>)> {
        self.entries
    }
}

impl Collection<Value> {
    /// Arrays become sequences and objects become mappings in document
    /// order. Every element is a plain value.
    pub fn from_json(document: Value) -> Result<Self> {
        match document {
            Value::Array(values) => Ok(Self::values(values)),
            Value::Object(map) => {
                let entries = map
                    .into_iter()
                    .map(|(name, value)| (Key::Name(name), Item::Value(value)))
                    .collect();
                Ok(Self { entries })
            }
            other => Err(FlowError::invalid_input(format!(
                "expected an array or an object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl<T: Send + 'static> From<Vec<Item<T>>> for Collection<T> {
    fn from(items: Vec<Item<T>>) -> Self {
        Self::sequence(items)
    }
}

impl<T: fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(key, item)| (key, item)))
            .finish()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind() {
        assert_eq!(Item::value(1).kind(), ItemKind::Value);
        assert_eq!(Item::deferred(async { Ok(2) }).kind(), ItemKind::Deferred);
        assert_eq!(Item::producer(|| Ok(Item::value(3))).kind(), ItemKind::Producer);
    }

    #[tokio::test]
    async fn test_resolve_variants() {
        assert_eq!(Item::value(1).resolve().await.unwrap(), 1);
        assert_eq!(Item::deferred(async { Ok(2) }).resolve().await.unwrap(), 2);
        let nested = Item::producer(|| Ok(Item::producer(|| Ok(Item::value(3)))));
        assert_eq!(nested.resolve().await.unwrap(), 3);

        let failed: Item<i32> = Item::failed(anyhow::anyhow!("boom"));
        assert_eq!(failed.resolve().await.unwrap_err().to_string(), "boom");
    }

    #[test]
    fn test_mapping_rejects_duplicates() {
        let result = Collection::mapping(vec![("a", Item::value(1)), ("a", Item::value(2))]);
        assert!(matches!(result, Err(FlowError::InvalidInput { .. })));
    }

    #[test]
    fn test_from_json() {
        let collection = Collection::from_json(json!({"zeta": 1, "alpha": 2})).unwrap();
        assert_eq!(collection.keys(), vec![Key::from("zeta"), Key::from("alpha")]);

        let collection = Collection::from_json(json!([1, "two", null])).unwrap();
        assert_eq!(collection.keys(), vec![Key::Index(0), Key::Index(1), Key::Index(2)]);

        let err = Collection::from_json(json!(42)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: expected an array or an object, got a number"
        );
    }
}
