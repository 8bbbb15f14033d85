// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Generic processes for wiring, testing and demos. None of them look
//! inside the values they move beyond the integer arithmetic they name.
//! [`SubPipeline`] packages a whole graph as one of them.

pub mod arithmetic;
pub mod collector;
pub mod passthrough;
pub mod sliding_difference;
pub mod source;
pub mod stub;
pub mod sub_pipeline;

pub use arithmetic::{RunningTotal, SumInputs};
pub use collector::{Collector, CollectorHandle};
pub use passthrough::Passthrough;
pub use sliding_difference::SlidingDifference;
pub use source::VecSource;
pub use stub::{PanickingProcess, ScriptStep, ScriptedSource};
pub use sub_pipeline::SubPipeline;
