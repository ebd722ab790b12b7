//! Kernels evaluating one step of an IIR filter on every pixel
//!
//! A filter of `K` coefficients keeps `K` memory images. Each frame the stage
//! dispatches `iir_filter_sample`, then `iir_update_memory` once per memory
//! slot in ascending order, then `iir_final`.

use bytemuck::{Pod, Zeroable};
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::kernels::{check_inputs, for_each_row, masked, KernelInvocation};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct CoefficientParams {
    pub value: f32,
    pub mask: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct UpdateParams {
    pub numerator: f32,
    pub denominator: f32,
    pub mask: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct FinalParams {
    pub scale: f32,
    pub mask: u32,
}

/// Per-channel combination of up to three bound images
fn combine<F>(
    invocation: &KernelInvocation<'_>,
    output: &mut Rgba32FImage,
    inputs: usize,
    f: F,
) -> Result<(), GpuError>
where
    F: Fn(usize, [f32; 3]) -> f32 + Sync + Send,
{
    check_inputs(invocation, output, inputs)?;
    let images = (0..inputs)
        .map(|index| invocation.input(index))
        .collect::<Result<Vec<_>, _>>()?;

    for_each_row(output, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let mut bound = [[0.0f32; 4]; 3];
            for (slot, image) in images.iter().enumerate() {
                bound[slot] = image.get_pixel(x as u32, y).0;
            }
            for (channel, value) in pixel.iter_mut().enumerate() {
                *value = f(
                    channel,
                    [bound[0][channel], bound[1][channel], bound[2][channel]],
                );
            }
        }
    });
    Ok(())
}

/// `memory = value * sample` on the masked channels
///
/// Inputs: sample.
pub fn initial_condition(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    let params: CoefficientParams = invocation.params()?;
    combine(invocation, output, 1, |channel, [x, _, _]| {
        if masked(params.mask, channel) {
            params.value * x
        } else {
            0.0
        }
    })
}

/// `filtered = memory[0] + num[0] * input`
///
/// Inputs: input, memory[0]. Unmasked channels carry the input.
pub fn filter_sample(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    let params: CoefficientParams = invocation.params()?;
    combine(invocation, output, 2, |channel, [x, z0, _]| {
        if masked(params.mask, channel) {
            z0 + params.value * x
        } else {
            x
        }
    })
}

/// `memory[i] = memory[i + 1] + num[i + 1] * input - den[i + 1] * filtered`
///
/// Inputs: input, memory[i + 1], filtered.
pub fn update_memory(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    let params: UpdateParams = invocation.params()?;
    combine(invocation, output, 3, |channel, [x, next, filtered]| {
        if masked(params.mask, channel) {
            next + params.numerator * x - params.denominator * filtered
        } else {
            0.0
        }
    })
}

/// `output = (filtered - input) * scale + input`
///
/// Inputs: input, filtered. Unmasked channels and alpha pass through.
pub fn finalize(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    let params: FinalParams = invocation.params()?;
    combine(invocation, output, 2, |channel, [x, filtered, _]| {
        if channel < 3 && masked(params.mask, channel) {
            (filtered - x) * params.scale + x
        } else {
            x
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{self, testing, CHANNEL_Y};

    #[test]
    fn test_filter_sample_and_final() {
        let input = testing::filled(2, 2, [0.5, 0.2, 0.1, 1.0]);
        let memory = testing::filled(2, 2, [0.25, 0.25, 0.25, 0.25]);

        let sample = CoefficientParams {
            value: 0.5,
            mask: CHANNEL_Y,
        };
        let filtered =
            testing::run(kernels::IIR_FILTER_SAMPLE, &[input.clone(), memory], &sample).unwrap();
        assert_eq!(filtered.get_pixel(0, 0).0, [0.5, 0.2, 0.1, 1.0]);

        let params = FinalParams {
            scale: 2.0,
            mask: CHANNEL_Y,
        };
        let mut shifted = filtered.clone();
        shifted.get_pixel_mut(0, 0).0[0] = 0.75;
        let output = testing::run(kernels::IIR_FINAL, &[input, shifted], &params).unwrap();
        assert_eq!(output.get_pixel(0, 0).0, [1.0, 0.2, 0.1, 1.0]);
        assert_eq!(output.get_pixel(1, 1).0, [0.5, 0.2, 0.1, 1.0]);
    }

    #[test]
    fn test_update_memory() {
        let input = testing::filled(1, 1, [2.0, 2.0, 2.0, 1.0]);
        let next = testing::filled(1, 1, [1.0, 1.0, 1.0, 1.0]);
        let filtered = testing::filled(1, 1, [4.0, 4.0, 4.0, 1.0]);
        let params = UpdateParams {
            numerator: 0.5,
            denominator: -0.25,
            mask: CHANNEL_Y,
        };
        let output = testing::run(kernels::IIR_UPDATE_MEMORY, &[input, next, filtered], &params).unwrap();
        // 1 + 0.5 * 2 + 0.25 * 4
        assert_eq!(output.get_pixel(0, 0).0, [3.0, 0.0, 0.0, 0.0]);
    }
}
