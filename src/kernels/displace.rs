//! Horizontal line-displacement kernels (head switching, tracking, edge wave)

use bytemuck::{Pod, Zeroable};
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::kernels::noise::{fbm, hash2, signed, snow_value, value_noise};
use crate::kernels::{check_inputs, for_each_row, sample_row_linear, KernelInvocation};

/// Copy row `y` of `input` into `row`, moved right by `shift` columns
fn shift_row(input: &Rgba32FImage, row: &mut [f32], y: u32, shift: f32) {
    for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
        let mut value = sample_row_linear(input, x as f32 - shift, y);
        value[3] = input.get_pixel(x as u32, y).0[3];
        pixel.copy_from_slice(&value);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct HeadSwitchingParams {
    /// Number of rows at the bottom of the image affected
    pub rows: u32,
    /// Rows of the switching curve already elapsed above the image
    pub offset: u32,
    /// Shift of the bottom row, in columns
    pub horiz_shift: f32,
    /// Non-zero when the switch point lands mid-line
    pub mid_line: u32,
    /// Switch point as a fraction of the width
    pub mid_line_position: f32,
    pub mid_line_jitter: f32,
    pub seed: u32,
}

/// Displace the bottom band of rows along a curve that grows toward the bottom
pub fn head_switching(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: HeadSwitchingParams = invocation.params()?;
    let input = invocation.input(0)?;
    let height = input.height();
    let width = input.width() as f32;
    let rows = params.rows.min(height);
    let start = height - rows;
    let offset = params.offset as f32;
    let span = (rows as f32 + offset).max(1.0);

    for_each_row(output, |y, row| {
        if y < start {
            // The switch point may land partway through the line just above the band
            if params.mid_line != 0 && y + 1 == start {
                let jitter = signed(hash2(y, params.seed)) * params.mid_line_jitter;
                let split = ((params.mid_line_position + jitter).clamp(0.0, 1.0) * width) as usize;
                shift_row(input, row, y, 0.0);
                let mut shifted = row.to_vec();
                shift_row(input, &mut shifted, y, params.horiz_shift);
                let from = (split * 4).min(row.len());
                row[from..].copy_from_slice(&shifted[from..]);
            } else {
                shift_row(input, row, y, 0.0);
            }
            return;
        }

        let t = ((y - start + 1) as f32 + offset) / span;
        let jitter = signed(hash2(y, params.seed)) * 0.5;
        shift_row(input, row, y, params.horiz_shift * t.powf(1.5) + jitter);
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct TrackingNoiseParams {
    /// Height of the affected band at the bottom of the image
    pub rows: u32,
    pub wave_intensity: f32,
    pub snow_intensity: f32,
    pub snow_anisotropy: f32,
    pub noise_intensity: f32,
    pub seed: u32,
}

/// Wobble, noise and snow in a band at the bottom of the image
///
/// Effects ramp up from nothing at the top of the band to full strength at
/// the bottom row.
pub fn tracking_noise(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: TrackingNoiseParams = invocation.params()?;
    let input = invocation.input(0)?;
    let height = input.height();
    let rows = params.rows.min(height);
    let start = height - rows;

    for_each_row(output, |y, row| {
        if y < start {
            shift_row(input, row, y, 0.0);
            return;
        }

        let t = (y - start + 1) as f32 / rows.max(1) as f32;
        let wave = value_noise(y as f32 * 0.5, params.seed) * params.wave_intensity * t;
        shift_row(input, row, y, wave);

        let row_seed = hash2(y, params.seed);
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let x = x as u32;
            let grain = signed(hash2(x, row_seed)) * params.noise_intensity * t;
            let snow = snow_value(
                x,
                y,
                params.seed,
                params.snow_intensity * t,
                params.snow_anisotropy,
            );
            pixel[0] += grain + snow;
        }
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct EdgeWaveParams {
    /// Peak shift in columns
    pub intensity: f32,
    pub speed: f32,
    /// Wave cycles per row
    pub frequency: f32,
    pub detail: u32,
    /// Frame time in frames
    pub time: f32,
    pub seed: u32,
}

/// Shift each row by a slowly drifting fractal wave
pub fn edge_wave(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: EdgeWaveParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let position = y as f32 * params.frequency + params.time * params.speed;
        let shift = fbm(position, params.seed, params.detail) * params.intensity;
        shift_row(input, row, y, shift);
    });
    Ok(())
}
