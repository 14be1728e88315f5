//! Host surface: persisted default options plus `serial` / `parallel` entry
//! points.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::options::{OptionsPatch, RunOptions};
use crate::flow::hooks::{CompositeHook, Discipline, FlowHook};
use crate::flow::item::{Collection, Mapper};
use crate::flow::normalize::normalize;
use crate::flow::outcome::ResultCollection;
use crate::flow::runner::FlowRunner;

/// Arguments following the collection in a `serial` / `parallel` call.
///
/// Built from `()`, an [`OptionsPatch`], a [`RunOptions`], a [`Mapper`] or a
/// `(Mapper, OptionsPatch)` pair.
pub struct CallArgs<T> {
    mapper: Option<Mapper<T>>,
    patch: OptionsPatch,
}

impl<T> CallArgs<T> {
    pub fn new() -> Self {
        Self {
            mapper: None,
            patch: OptionsPatch::new(),
        }
    }

    pub fn with_mapper(mut self, mapper: Mapper<T>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_options(mut self, patch: OptionsPatch) -> Self {
        self.patch = patch;
        self
    }
}

impl<T> Default for CallArgs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<()> for CallArgs<T> {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl<T> From<OptionsPatch> for CallArgs<T> {
    fn from(patch: OptionsPatch) -> Self {
        Self::new().with_options(patch)
    }
}

impl<T> From<RunOptions> for CallArgs<T> {
    fn from(options: RunOptions) -> Self {
        Self::new().with_options(options.into())
    }
}

impl<T> From<Mapper<T>> for CallArgs<T> {
    fn from(mapper: Mapper<T>) -> Self {
        Self::new().with_mapper(mapper)
    }
}

impl<T> From<(Mapper<T>, OptionsPatch)> for CallArgs<T> {
    fn from((mapper, patch): (Mapper<T>, OptionsPatch)) -> Self {
        Self::new().with_mapper(mapper).with_options(patch)
    }
}

/// Runs collections serially or in parallel with options persisted across
/// calls.
///
/// Every call merges its overrides over the current options and keeps the
/// merged set for later calls.
#[derive(Clone, Default)]
pub struct ControlFlow {
    options: RunOptions,
    hooks: CompositeHook,
}

impl ControlFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RunOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            hooks: CompositeHook::new(),
        })
    }

    /// Load default options from a YAML or JSON file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(RunOptions::from_file(path)?)
    }

    pub fn add_hook(&mut self, hook: Arc<dyn FlowHook>) {
        self.hooks.add_hook(hook);
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub async fn serial<T: Send + 'static>(
        &mut self,
        collection: impl Into<Collection<T>>,
        args: impl Into<CallArgs<T>>,
    ) -> Result<ResultCollection<T>> {
        self.run(Discipline::Serial, collection.into(), args.into()).await
    }

    pub async fn parallel<T: Send + 'static>(
        &mut self,
        collection: impl Into<Collection<T>>,
        args: impl Into<CallArgs<T>>,
    ) -> Result<ResultCollection<T>> {
        self.run(Discipline::Parallel, collection.into(), args.into()).await
    }

    /// Serial run over a JSON array or object, with per-call options given
    /// as a JSON object (`null` for none)
    pub async fn serial_json(
        &mut self,
        document: Value,
        options: Value,
    ) -> Result<ResultCollection<Value>> {
        let collection = Collection::from_json(document)?;
        let patch = OptionsPatch::from_json(options)?;
        self.serial(collection, patch).await
    }

    /// Parallel run over a JSON array or object, with per-call options given
    /// as a JSON object (`null` for none)
    pub async fn parallel_json(
        &mut self,
        document: Value,
        options: Value,
    ) -> Result<ResultCollection<Value>> {
        let collection = Collection::from_json(document)?;
        let patch = OptionsPatch::from_json(options)?;
        self.parallel(collection, patch).await
    }

    async fn run<T: Send + 'static>(
        &mut self,
        discipline: Discipline,
        collection: Collection<T>,
        args: CallArgs<T>,
    ) -> Result<ResultCollection<T>> {
        let CallArgs { mapper, patch } = args;

        // A rejected patch leaves the persisted options untouched.
        let merged = self.options.merged(&patch);
        merged.validate()?;
        self.options = merged;

        debug!(
            %discipline,
            items = collection.len(),
            mapped = mapper.is_some(),
            overrides = !patch.is_empty(),
            "Dispatching flow"
        );

        let computations = normalize(collection, mapper);
        self.runner().run(discipline, computations).await
    }

    fn runner(&self) -> FlowRunner {
        let runner = FlowRunner::new(self.options.clone());
        if self.hooks.is_empty() {
            runner
        } else {
            runner.with_hook(Arc::new(self.hooks.clone()))
        }
    }
}
