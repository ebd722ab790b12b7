//! # Device Layer
//!
//! Image buffers, command recording and the device that executes them.
//!
//! The pipeline only talks to the [`Device`] trait. [`CpuDevice`] is the
//! reference backend: it runs every kernel on the host with rayon, enforces an
//! optional memory budget and behaves like a GPU queue (commands execute in
//! recording order, `commit_and_wait` blocks until the batch completes).
//!
//! ## Pieces
//!
//! - [`ImageBufferPool`]: ring of same-sized buffers that stages chain through
//! - [`KernelProgramCache`]: compiles each kernel program once
//! - [`SizedResources`]: rebuilds per-geometry state when the frame size changes

pub mod cache;
pub mod command;
pub mod device;
pub mod pool;
pub mod resources;
pub mod texture;

pub use cache::KernelProgramCache;
pub use command::{BlitEncoder, CommandBuffer, ComputeEncoder, ComputePipeline, Uniforms};
pub use device::{CpuDevice, Device};
pub use pool::ImageBufferPool;
pub use resources::SizedResources;
pub use texture::{Geometry, PixelFormat, Texture};
