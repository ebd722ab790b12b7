//! Composite-signal kernels: subcarrier modulation and field composition

use bytemuck::{Pod, Zeroable};
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::kernels::{check_inputs, for_each_row, sample_clamped, KernelInvocation};

/// Subcarrier weight of I at each of the four phases of a cycle
const I_MULT: [f32; 4] = [1.0, 0.0, -1.0, 0.0];
/// Subcarrier weight of Q at each of the four phases of a cycle
const Q_MULT: [f32; 4] = [0.0, 1.0, 0.0, -1.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ModulationParams {
    /// Scanline phase shift in quarter turns (0 = 0°, 1 = 90°, 2 = 180°, 3 = 270°)
    pub phase_shift: u32,
    pub phase_offset: i32,
    pub frame: u32,
}

/// Subcarrier phase (in quarter cycles) at column 0 of `line`
pub fn line_phase(params: &ModulationParams, line: u32) -> i64 {
    let offset = params.phase_offset as i64;
    let frame = params.frame as i64;
    let line = line as i64;
    let phase = match params.phase_shift & 3 {
        1 | 3 => frame + offset + (line >> 1),
        2 => ((frame + line) & 2) + offset,
        _ => 0,
    };
    phase.rem_euclid(4)
}

#[inline]
fn phase_index(x: i64, line_phase: i64) -> usize {
    (x + line_phase).rem_euclid(4) as usize
}

/// Modulate chroma onto the luma plane as a four-sample-per-cycle subcarrier
pub fn chroma_into_luma(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: ModulationParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let xi = line_phase(&params, y);
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let mut value = input.get_pixel(x as u32, y).0;
            let phase = phase_index(x as i64, xi);
            value[0] += value[1] * I_MULT[phase] + value[2] * Q_MULT[phase];
            pixel.copy_from_slice(&value);
        }
    });
    Ok(())
}

/// Separate the subcarrier back out of luma with a one-cycle box demodulator
pub fn chroma_from_luma(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: ModulationParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let xi = line_phase(&params, y);
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let x = x as i64;
            let (mut luma, mut i, mut q) = (0.0, 0.0, 0.0);
            for k in x - 1..=x + 2 {
                let sample = sample_clamped(input, k, y as i64)[0];
                let phase = phase_index(k, xi);
                luma += sample;
                i += sample * I_MULT[phase];
                q += sample * Q_MULT[phase];
            }
            let alpha = input.get_pixel(x as u32, y).0[3];
            pixel.copy_from_slice(&[luma * 0.25, i * 0.5, q * 0.5, alpha]);
        }
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct FieldParams {
    /// Parity of the lines taken from the current frame
    pub field: u32,
    /// Non-zero to weave fields; zero passes the current frame through
    pub interlaced: u32,
}

/// Weave the current field with the other field of the previous frame
pub fn field_compose(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 2)?;
    let params: FieldParams = invocation.params()?;
    let current = invocation.input(0)?;
    let previous = invocation.input(1)?;
    for_each_row(output, |y, row| {
        let source = if params.interlaced == 0 || y & 1 == params.field & 1 {
            current
        } else {
            previous
        };
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            pixel.copy_from_slice(&source.get_pixel(x as u32, y).0);
        }
    });
    Ok(())
}
