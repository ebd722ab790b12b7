//! Hash-based noise and the kernels built on it
//!
//! Kernels cannot hold RNG state, so every random value is a hash of pixel
//! coordinates and a per-frame seed supplied by the stage.

use bytemuck::{Pod, Zeroable};
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::kernels::{check_inputs, for_each_row, masked, KernelInvocation};

/// Integer hash with good avalanche (lowbias32)
#[inline]
pub fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[inline]
pub fn hash2(a: u32, b: u32) -> u32 {
    hash(a ^ hash(b))
}

#[inline]
pub fn hash3(a: u32, b: u32, c: u32) -> u32 {
    hash(a ^ hash(b ^ hash(c)))
}

/// Map a hash to `[0, 1)`
#[inline]
pub fn unit(h: u32) -> f32 {
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Map a hash to `[-1, 1)`
#[inline]
pub fn signed(h: u32) -> f32 {
    unit(h) * 2.0 - 1.0
}

/// Smoothly interpolated 1D value noise in `[-1, 1]`
pub fn value_noise(x: f32, seed: u32) -> f32 {
    let cell = x.floor();
    let t = x - cell;
    let s = t * t * (3.0 - 2.0 * t);
    let cell = cell as i64;
    let a = signed(hash2(cell as u32, seed));
    let b = signed(hash2((cell + 1) as u32, seed));
    a + (b - a) * s
}

/// Fractal sum of `octaves` value-noise layers, normalized to `[-1, 1]`
pub fn fbm(x: f32, seed: u32, octaves: u32) -> f32 {
    let octaves = octaves.clamp(1, 8);
    let mut sum = 0.0;
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    for octave in 0..octaves {
        sum += value_noise(x * frequency, hash2(seed, octave)) * amplitude;
        total += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    sum / total
}

/// Brightness added by snow at one pixel
///
/// Each pixel starts a speck with probability `intensity`; specks trail off to
/// the right, further the higher `anisotropy` is.
pub fn snow_value(x: u32, y: u32, seed: u32, intensity: f32, anisotropy: f32) -> f32 {
    if intensity <= 0.0 {
        return 0.0;
    }
    let anisotropy = anisotropy.clamp(0.0, 1.0);
    let reach = 1 + (anisotropy * 16.0) as i64;
    let falloff = 1.0 / (anisotropy * 6.0 + 0.5);

    let mut value = 0.0;
    for k in 0..reach {
        let origin = (x as i64 - k) as u32;
        let h = hash3(origin, y, seed);
        if unit(h) < intensity {
            value += (0.5 + 0.5 * unit(hash(h))) * (-(k as f32) * falloff).exp();
        }
    }
    value
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct NoiseParams {
    /// Noise cycles per column
    pub frequency: f32,
    pub intensity: f32,
    /// Number of octaves
    pub detail: u32,
    pub seed: u32,
    /// Channels to perturb
    pub mask: u32,
}

/// Add per-line fractal noise to the masked channels
pub fn fbm_noise(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: NoiseParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        let row_seed = hash2(y, params.seed);
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let mut value = input.get_pixel(x as u32, y).0;
            let n = fbm(x as f32 * params.frequency, row_seed, params.detail) * params.intensity;
            for (channel, v) in value.iter_mut().enumerate().take(3) {
                if masked(params.mask, channel) {
                    *v += n;
                }
            }
            pixel.copy_from_slice(&value);
        }
    });
    Ok(())
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct SnowParams {
    pub intensity: f32,
    pub anisotropy: f32,
    pub seed: u32,
}

/// Sprinkle bright specks into luma
pub fn snow(invocation: &KernelInvocation<'_>, output: &mut Rgba32FImage) -> Result<(), GpuError> {
    check_inputs(invocation, output, 1)?;
    let params: SnowParams = invocation.params()?;
    let input = invocation.input(0)?;
    for_each_row(output, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let mut value = input.get_pixel(x as u32, y).0;
            value[0] += snow_value(x as u32, y, params.seed, params.intensity, params.anisotropy);
            pixel.copy_from_slice(&value);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{self, testing, CHANNEL_I, CHANNEL_Q};

    #[test]
    fn test_unit_range() {
        for i in 0..10_000 {
            let u = unit(hash(i));
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_fbm_is_bounded_and_deterministic() {
        for i in 0..1_000 {
            let x = i as f32 * 0.37;
            let n = fbm(x, 42, 4);
            assert!((-1.0..=1.0).contains(&n));
            assert_eq!(n, fbm(x, 42, 4));
        }
        assert_ne!(fbm(3.3, 1, 3), fbm(3.3, 2, 3));
    }

    #[test]
    fn test_fbm_noise_respects_mask() {
        let input = testing::filled(16, 4, [0.5, 0.1, 0.2, 1.0]);
        let params = NoiseParams {
            frequency: 0.5,
            intensity: 0.25,
            detail: 2,
            seed: 9,
            mask: CHANNEL_I | CHANNEL_Q,
        };
        let output = testing::run(kernels::FBM_NOISE, &[input], &params).unwrap();
        assert!(output.pixels().all(|p| p.0[0] == 0.5 && p.0[3] == 1.0));
        assert!(output.pixels().any(|p| p.0[1] != 0.1));
    }

    #[test]
    fn test_snow_only_brightens_luma() {
        let input = testing::filled(64, 16, [0.5, 0.0, 0.0, 1.0]);
        let params = SnowParams {
            intensity: 0.05,
            anisotropy: 0.5,
            seed: 3,
        };
        let output = testing::run(kernels::SNOW, &[input], &params).unwrap();
        assert!(output.pixels().all(|p| p.0[0] >= 0.5 && p.0[1] == 0.0));
        assert!(output.pixels().any(|p| p.0[0] > 0.5));

        assert_eq!(snow_value(10, 10, 3, 0.0, 0.5), 0.0);
    }
}
