//! Color-space conversion and chroma-plane kernels

use std::f32::consts::PI;
use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::kernels::noise;
use crate::kernels::{check_inputs, for_each_row, map_pixels, sample_clamped, KernelInvocation};

/// FCC NTSC RGB -> YIQ matrix
const RGB_TO_YIQ_MATRIX: [[f64; 3]; 3] = [
    [0.299, 0.587, 0.114],
    [0.595716, -0.274453, -0.321263],
    [0.211456, -0.522591, 0.311135],
];

fn yiq_to_rgb_matrix() -> &'static [[f64; 3]; 3] {
    static INVERSE: OnceLock<[[f64; 3]; 3]> = OnceLock::new();
    INVERSE.get_or_init(|| invert(&RGB_TO_YIQ_MATRIX))
}

fn invert(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };
    let det = m[0][0] * cofactor(1, 2, 1, 2) - m[0][1] * cofactor(1, 2, 0, 2)
        + m[0][2] * cofactor(1, 2, 0, 1);

    [
        [
            cofactor(1, 2, 1, 2) / det,
            -cofactor(0, 2, 1, 2) / det,
            cofactor(0, 1, 1, 2) / det,
        ],
        [
            -cofactor(1, 2, 0, 2) / det,
            cofactor(0, 2, 0, 2) / det,
            -cofactor(0, 1, 0, 2) / det,
        ],
        [
            cofactor(1, 2, 0, 1) / det,
            -cofactor(0, 2, 0, 1) / det,
            cofactor(0, 1, 0, 1) / det,
        ],
    ]
}

#[inline]
fn apply(m: &[[f64; 3]; 3], pixel: [f32; 4]) -> [f32; 4] {
    let [a, b, c, alpha] = pixel.map(f64::from);
    [
        (m[0][0] * a + m[0][1] * b + m[0][2] * c) as f32,
        (m[1][0] * a + m[1][1] * b + m[1][2] * c) as f32,
        (m[2][0] * a + m[2][1] * b + m[2][2] * c) as f32,
        alpha as f32,
    ]
}

/// Convert an RGBA pixel to YIQA
pub fn to_yiq(rgba: [f32; 4]) -> [f32; 4] {
    apply(&RGB_TO_YIQ_MATRIX, rgba)
}

/// Convert a YIQA pixel back to RGBA
pub fn to_rgb(yiqa: [f32; 4]) -> [f32; 4] {
    apply(yiq_to_rgb_matrix(), yiqa)
}

pub fn rgb_to_yiq(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    map_pixels(invocation.input(0)?, output, |_, _, pixel| to_yiq(pixel));
    Ok(())
}

pub fn yiq_to_rgb(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    map_pixels(invocation.input(0)?, output, |_, _, pixel| to_rgb(pixel));
    Ok(())
}

/// Four-tap box average of luma over columns `x-1 ..= x+2`
pub fn box_luma(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let input = invocation.input(0)?;
    map_pixels(input, output, |x, y, mut pixel| {
        let (x, y) = (x as i64, y as i64);
        let sum: f32 = (x - 1..=x + 2)
            .map(|k| sample_clamped(input, k, y)[0])
            .sum();
        pixel[0] = sum * 0.25;
        pixel
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ChromaDelayParams {
    /// Columns the I plane is moved right by
    pub i_shift: i32,
    /// Columns the Q plane is moved right by
    pub q_shift: i32,
}

pub fn chroma_delay(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: ChromaDelayParams = invocation.params()?;
    let input = invocation.input(0)?;
    map_pixels(input, output, |x, y, mut pixel| {
        let (x, y) = (x as i64, y as i64);
        pixel[1] = sample_clamped(input, x - params.i_shift as i64, y)[1];
        pixel[2] = sample_clamped(input, x - params.q_shift as i64, y)[2];
        pixel
    });
    Ok(())
}

/// Average the chroma of each line with the line above it
pub fn chroma_vert_blend(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let input = invocation.input(0)?;
    map_pixels(input, output, |x, y, mut pixel| {
        let above = sample_clamped(input, x as i64, y as i64 - 1);
        pixel[1] = (pixel[1] + above[1]) * 0.5;
        pixel[2] = (pixel[2] + above[2]) * 0.5;
        pixel
    });
    Ok(())
}

#[inline]
fn rotate_chroma(mut pixel: [f32; 4], angle: f32) -> [f32; 4] {
    let (sin, cos) = angle.sin_cos();
    let (i, q) = (pixel[1], pixel[2]);
    pixel[1] = i * cos - q * sin;
    pixel[2] = i * sin + q * cos;
    pixel
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PhaseErrorParams {
    /// Rotation of the I/Q plane in radians
    pub angle: f32,
}

pub fn chroma_phase_error(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: PhaseErrorParams = invocation.params()?;
    map_pixels(invocation.input(0)?, output, |_, _, pixel| {
        rotate_chroma(pixel, params.angle)
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PhaseNoiseParams {
    pub intensity: f32,
    pub seed: u32,
}

/// Rotate the chroma of each line by its own random angle
pub fn chroma_phase_noise(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: PhaseNoiseParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let angle = noise::signed(noise::hash2(y, params.seed)) * PI * params.intensity;
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let rotated = rotate_chroma(input.get_pixel(x as u32, y).0, angle);
            pixel.copy_from_slice(&rotated);
        }
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ChromaLossParams {
    /// Chance of any one line losing its chroma
    pub probability: f32,
    pub seed: u32,
}

pub fn chroma_loss(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: ChromaLossParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let lost = noise::unit(noise::hash2(y, params.seed)) < params.probability;
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let mut value = input.get_pixel(x as u32, y).0;
            if lost {
                value[1] = 0.0;
                value[2] = 0.0;
            }
            pixel.copy_from_slice(&value);
        }
    });
    Ok(())
}
