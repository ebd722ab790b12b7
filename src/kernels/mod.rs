//! # Kernel Programs
//!
//! The per-pixel programs that stages dispatch, addressed by name.
//!
//! Every kernel writes one output image from one or more equally-sized input
//! images and a `#[repr(C)]` parameter block. Kernels never touch the alpha
//! channel of their output except to copy it from the first input.
//!
//! [`KernelLibrary`] maps names to entry points; a [`Device`](crate::gpu::Device)
//! compiles programs out of it on request.

use std::sync::Arc;

use bytemuck::Pod;
use image::Rgba32FImage;
use rayon::prelude::*;

use crate::error::GpuError;
use crate::gpu::Uniforms;

pub mod color;
pub mod displace;
pub mod iir;
pub mod noise;
pub mod registry;
pub mod signal;

pub use registry::{KernelLibrary, KernelProgram};

/// Entry point of a kernel program
pub type KernelFn = fn(&KernelInvocation<'_>, &mut Rgba32FImage) -> Result<(), GpuError>;

pub const RGB_TO_YIQ: &str = "rgb_to_yiq";
pub const YIQ_TO_RGB: &str = "yiq_to_rgb";
pub const BOX_LUMA: &str = "box_luma";
pub const IIR_INITIAL_CONDITION: &str = "iir_initial_condition";
pub const IIR_FILTER_SAMPLE: &str = "iir_filter_sample";
pub const IIR_UPDATE_MEMORY: &str = "iir_update_memory";
pub const IIR_FINAL: &str = "iir_final";
pub const CHROMA_INTO_LUMA: &str = "chroma_into_luma";
pub const CHROMA_FROM_LUMA: &str = "chroma_from_luma";
pub const CHROMA_DELAY: &str = "chroma_delay";
pub const CHROMA_VERT_BLEND: &str = "chroma_vert_blend";
pub const CHROMA_PHASE_ERROR: &str = "chroma_phase_error";
pub const CHROMA_PHASE_NOISE: &str = "chroma_phase_noise";
pub const CHROMA_LOSS: &str = "chroma_loss";
pub const FBM_NOISE: &str = "fbm_noise";
pub const SNOW: &str = "snow";
pub const HEAD_SWITCHING: &str = "head_switching";
pub const TRACKING_NOISE: &str = "tracking_noise";
pub const EDGE_WAVE: &str = "edge_wave";
pub const FIELD_COMPOSE: &str = "field_compose";

/// Every built-in kernel, in the order they are warmed
pub const ALL: &[&str] = &[
    RGB_TO_YIQ,
    YIQ_TO_RGB,
    BOX_LUMA,
    IIR_INITIAL_CONDITION,
    IIR_FILTER_SAMPLE,
    IIR_UPDATE_MEMORY,
    IIR_FINAL,
    CHROMA_INTO_LUMA,
    CHROMA_FROM_LUMA,
    CHROMA_DELAY,
    CHROMA_VERT_BLEND,
    CHROMA_PHASE_ERROR,
    CHROMA_PHASE_NOISE,
    CHROMA_LOSS,
    FBM_NOISE,
    SNOW,
    HEAD_SWITCHING,
    TRACKING_NOISE,
    EDGE_WAVE,
    FIELD_COMPOSE,
];

/// Channel bits used in kernel parameter masks
pub const CHANNEL_Y: u32 = 0b0001;
pub const CHANNEL_I: u32 = 0b0010;
pub const CHANNEL_Q: u32 = 0b0100;

/// Bound resources of one dispatch
pub struct KernelInvocation<'a> {
    kernel: &'a str,
    inputs: &'a [Arc<Rgba32FImage>],
    uniforms: &'a Uniforms,
}

impl<'a> KernelInvocation<'a> {
    pub fn new(kernel: &'a str, inputs: &'a [Arc<Rgba32FImage>], uniforms: &'a Uniforms) -> Self {
        Self {
            kernel,
            inputs,
            uniforms,
        }
    }

    pub fn kernel(&self) -> &str {
        self.kernel
    }

    /// Input image bound at `index`
    pub fn input(&self, index: usize) -> Result<&Rgba32FImage, GpuError> {
        self.inputs
            .get(index)
            .map(|image| image.as_ref())
            .ok_or_else(|| GpuError::InvalidBinding {
                kernel: self.kernel.to_string(),
                reason: format!("no input bound at slot {}", index),
            })
    }

    /// Parameter block decoded as `P`
    pub fn params<P: Pod>(&self) -> Result<P, GpuError> {
        self.uniforms.read(self.kernel)
    }
}

/// Run `f(y, row)` over every output row in parallel
///
/// `row` holds `width * 4` interleaved channel values.
pub(crate) fn for_each_row<F>(output: &mut Rgba32FImage, f: F)
where
    F: Fn(u32, &mut [f32]) + Sync + Send,
{
    let stride = output.width() as usize * 4;
    if stride == 0 {
        return;
    }
    output
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| f(y as u32, row));
}

/// Write `f(x, y, src)` to every output pixel, where `src` is `input` at the same position
pub(crate) fn map_pixels<F>(input: &Rgba32FImage, output: &mut Rgba32FImage, f: F)
where
    F: Fn(u32, u32, [f32; 4]) -> [f32; 4] + Sync + Send,
{
    for_each_row(output, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let src = input.get_pixel(x as u32, y).0;
            pixel.copy_from_slice(&f(x as u32, y, src));
        }
    });
}

/// Pixel at `(x, y)` with coordinates clamped to the image edge
#[inline]
pub(crate) fn sample_clamped(image: &Rgba32FImage, x: i64, y: i64) -> [f32; 4] {
    let x = x.clamp(0, image.width() as i64 - 1) as u32;
    let y = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(x, y).0
}

/// Linearly interpolated pixel at fractional column `x` of row `y`
#[inline]
pub(crate) fn sample_row_linear(image: &Rgba32FImage, x: f32, y: u32) -> [f32; 4] {
    let left = x.floor();
    let t = x - left;
    let a = sample_clamped(image, left as i64, y as i64);
    let b = sample_clamped(image, left as i64 + 1, y as i64);
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// Check that every input has the output's size
pub(crate) fn check_inputs(
    invocation: &KernelInvocation<'_>,
    output: &Rgba32FImage,
    count: usize,
) -> Result<(), GpuError> {
    for index in 0..count {
        let input = invocation.input(index)?;
        if input.dimensions() != output.dimensions() {
            return Err(GpuError::GeometryMismatch {
                expected: output.dimensions(),
                actual: input.dimensions(),
            });
        }
    }
    Ok(())
}

#[inline]
pub(crate) fn masked(mask: u32, channel: usize) -> bool {
    mask & (1 << channel) != 0
}
