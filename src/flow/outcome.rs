//! Outcomes of individual tasks and the ordered collection a run returns

use std::fmt;

use crate::core::errors::TaskFailure;
use crate::flow::item::Key;

/// Settled result of one deferred computation
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(TaskFailure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> Result<T, TaskFailure> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(failure),
        }
    }

    /// Plain projection handy for comparisons: the value, or the task error
    /// message
    pub fn as_result(&self) -> Result<&T, String> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(failure.message()),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(value) => write!(f, "success({})", value),
            Outcome::Failure(failure) => write!(f, "failure({})", failure.message()),
        }
    }
}

/// Outcome of an item together with the item's key
#[derive(Debug)]
pub struct Settled<T> {
    pub key: Key,
    pub outcome: Outcome<T>,
}

/// Outcomes of a run, ordered by the position of their source items
#[derive(Debug)]
pub struct ResultCollection<T> {
    entries: Vec<Settled<T>>,
}

impl<T> ResultCollection<T> {
    pub(crate) fn new(entries: Vec<Settled<T>>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Outcome<T>> {
        self.entries.get(position).map(|settled| &settled.outcome)
    }

    pub fn get_by_key(&self, key: &Key) -> Option<&Outcome<T>> {
        self.entries
            .iter()
            .find(|settled| &settled.key == key)
            .map(|settled| &settled.outcome)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Settled<T>> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|settled| settled.key.clone()).collect()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome<T>> {
        self.entries.iter().map(|settled| &settled.outcome)
    }

    pub fn successes(&self) -> usize {
        self.outcomes().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes().filter(|outcome| outcome.is_failure()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }

    /// Every value in order, or the first failure by position
    pub fn into_values(self) -> Result<Vec<T>, TaskFailure> {
        self.entries
            .into_iter()
            .map(|settled| settled.outcome.into_result())
            .collect()
    }

    pub fn into_outcomes(self) -> Vec<Outcome<T>> {
        self.entries
            .into_iter()
            .map(|settled| settled.outcome)
            .collect()
    }

    pub fn into_entries(self) -> Vec<Settled<T>> {
        self.entries
    }
}

impl<T> IntoIterator for ResultCollection<T> {
    type Item = Settled<T>;
    type IntoIter = std::vec::IntoIter<Settled<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ResultCollection<T> {
    type Item = &'a Settled<T>;
    type IntoIter = std::slice::Iter<'a, Settled<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
