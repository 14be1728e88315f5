// Infrastructure shared by the normalizer, the runner and the host

pub mod errors;
pub mod options;

// Re-export commonly used types
pub use errors::{ErrorCategory, FlowError, Result, TaskFailure};
pub use options::{OptionsPatch, RunOptions};
