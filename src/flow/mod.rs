pub mod hooks;
pub mod item;
pub mod normalize;
pub mod outcome;
mod parallel;
pub mod runner;
mod serial;

pub use hooks::{CompositeHook, Discipline, FlowEvent, FlowHook, HookContext, LoggingHook};
pub use item::{mapper, Collection, Deferred, Item, ItemKind, Key, Mapper, Producer};
pub use normalize::{normalize, DeferredComputation};
pub use outcome::{Outcome, ResultCollection, Settled};
pub use runner::FlowRunner;
