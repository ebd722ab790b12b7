//! # NTSC Compositor
//!
//! Make clean digital video look like it went through an NTSC broadcast and a
//! VHS deck.
//!
//! Frames are converted to YIQ and pushed through a chain of stages that
//! band-limit, modulate, smear and disturb the signal the way analog
//! hardware does, then converted back to RGB. Stages record their work as
//! kernel dispatches on a [`Device`](gpu::Device); the whole frame is
//! submitted as one batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ntsc_compositor::{
//!     config::Config,
//!     frame::Frame,
//!     gpu::CpuDevice,
//!     pipeline::FramePipeline,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let device = Arc::new(CpuDevice::with_config(&config.device)?);
//! let mut pipeline = FramePipeline::new(device, &config.pipeline)?;
//!
//! let input = Frame::color_bars(640, 480);
//! if let Some(output) = pipeline.output_image(&input, &config.effect) {
//!     println!("rendered {}x{}", output.width(), output.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`filter`] - IIR transfer functions and the temporal filter stage
//! - [`gpu`] - Device abstraction, buffer pool and kernel program cache
//! - [`kernels`] - Per-pixel kernel programs
//! - [`effects`] - Effect configuration and the stages of the chain
//! - [`pipeline`] - Frame orchestration and failure containment
//! - [`config`] - Configuration management
//!
//! ## Custom Stages
//!
//! A chain can include your own stages by implementing
//! [`Stage`](effects::Stage):
//!
//! ```rust,no_run
//! use ntsc_compositor::effects::{EffectConfiguration, Stage, StageContext};
//! use ntsc_compositor::error::StageError;
//! use ntsc_compositor::gpu::Texture;
//!
//! struct Freeze;
//!
//! impl Stage for Freeze {
//!     fn name(&self) -> &'static str {
//!         "freeze"
//!     }
//!
//!     fn is_enabled(&self, _config: &EffectConfiguration) -> bool {
//!         true
//!     }
//!
//!     fn run(
//!         &mut self,
//!         ctx: &mut StageContext<'_>,
//!         input: &Texture,
//!         output: &Texture,
//!     ) -> Result<(), StageError> {
//!         ctx.blit(input, output)
//!     }
//! }
//! ```

pub mod config;
pub mod effects;
pub mod error;
pub mod filter;
pub mod frame;
pub mod gpu;
pub mod kernels;
pub mod pipeline;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    effects::{EffectConfiguration, Stage},
    error::{NtscError, Result},
    frame::Frame,
    pipeline::FramePipeline,
};
