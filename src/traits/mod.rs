pub mod process;

pub use process::{NodeLifecycle, Process, StepContext, StepStatus};
