//! Configuration for the murmur pipeline.
//!
//! This module contains:
//! - Default values for every pipeline knob
//! - `PipelineConfig`, the immutable configuration read at worker boot

mod defaults;
mod pipeline;

pub use defaults::*;
pub use pipeline::PipelineConfig;
