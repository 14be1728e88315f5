// Core infrastructure modules
pub mod core;

// Normalizer, runner and hooks
pub mod flow;

// Host surface
pub mod control;

// Re-exports for convenience
pub use control::{CallArgs, ControlFlow};
pub use crate::core::errors::{ErrorCategory, FlowError, Result, TaskFailure};
pub use crate::core::options::{OptionsPatch, RunOptions};
pub use flow::{
    mapper, normalize, Collection, CompositeHook, DeferredComputation, Discipline, FlowEvent,
    FlowHook, FlowRunner, HookContext, Item, ItemKind, Key, LoggingHook, Mapper, Outcome, ResultCollection,
    Settled,
};
