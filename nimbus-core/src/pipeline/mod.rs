//! Run controller and the types it exposes to callers.

pub mod controller;
pub mod options;
pub mod outcome;
pub mod stage;

pub use controller::{ScanPipeline, execute_run};
pub use options::{DataMode, RunOptions};
pub use outcome::{RunFailure, RunOutcome, ScanReport};
pub use stage::{PipelineStage, exit_codes};
