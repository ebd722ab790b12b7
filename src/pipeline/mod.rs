//! # Frame Pipeline
//!
//! The orchestrator that threads frames through the stage chain on a device.

pub mod engine;

// Re-exports for convenience
pub use engine::{FramePipeline, PipelineState, PipelineStats};
