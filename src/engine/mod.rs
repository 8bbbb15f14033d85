pub mod async_scheduler;
pub mod shared_edge;
pub mod state;
pub(crate) mod step;
pub mod sync_scheduler;

pub use async_scheduler::AsyncPipeline;
pub use shared_edge::SharedEdge;
pub use state::{NodeReport, NodeStats, PipelineReport, PipelineState, StepRecord, TickReport};
pub use sync_scheduler::SyncPipeline;
