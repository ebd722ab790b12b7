use std::f32::consts::PI;

use crate::effects::{EffectConfiguration, Stage, StageContext, StageRng};
use crate::error::StageError;
use crate::gpu::Texture;
use crate::kernels::{
    self,
    color::{PhaseErrorParams, PhaseNoiseParams},
};

/// Constant hue rotation of the whole picture
#[derive(Debug, Default)]
pub struct PhaseError;

impl Stage for PhaseError {
    fn name(&self) -> &'static str {
        "chroma_phase_error"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.chroma_phase_error != 0.0
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let params = PhaseErrorParams {
            angle: ctx.config().chroma_phase_error * PI,
        };
        ctx.dispatch(kernels::CHROMA_PHASE_ERROR, &[input], output, &params)
    }
}

/// Per-line random hue wobble
pub struct PhaseNoise {
    rng: StageRng,
}

impl PhaseNoise {
    pub fn new(rng: StageRng) -> Self {
        Self { rng }
    }
}

impl Stage for PhaseNoise {
    fn name(&self) -> &'static str {
        "chroma_phase_noise"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.chroma_phase_noise_intensity > 0.0
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let params = PhaseNoiseParams {
            intensity: ctx.config().chroma_phase_noise_intensity,
            seed: self.rng.next_seed(),
        };
        ctx.dispatch(kernels::CHROMA_PHASE_NOISE, &[input], output, &params)
    }
}

/// Delay-line comb: every line's chroma averaged with the line above
#[derive(Debug, Default)]
pub struct ChromaVertBlend;

impl Stage for ChromaVertBlend {
    fn name(&self) -> &'static str {
        "chroma_vert_blend"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.chroma_vert_blend
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        ctx.dispatch(kernels::CHROMA_VERT_BLEND, &[input], output, &())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::StageHarness;
    use crate::frame::Frame;

    #[test]
    fn test_half_turn_phase_error_inverts_chroma() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.chroma_phase_error = 1.0;

        let output = harness
            .run(&mut PhaseError, &config, 0, &Frame::new_filled(4, 4, [0.5, 0.2, 0.1, 1.0]))
            .unwrap();
        let pixel = output.get_pixel(1, 1);
        assert!((pixel[0] - 0.5).abs() < 1e-6);
        assert!((pixel[1] + 0.2).abs() < 1e-5);
        assert!((pixel[2] + 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_phase_noise_keeps_saturation() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.chroma_phase_noise_intensity = 0.3;

        let output = harness
            .run(
                &mut PhaseNoise::new(StageRng::new(5, 1)),
                &config,
                0,
                &Frame::new_filled(4, 8, [0.5, 0.3, 0.4, 1.0]),
            )
            .unwrap();
        for y in 0..8 {
            let pixel = output.get_pixel(0, y);
            let saturation = (pixel[1] * pixel[1] + pixel[2] * pixel[2]).sqrt();
            assert!((saturation - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_vertical_blend_mixes_neighbouring_lines() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.chroma_vert_blend = true;

        let input = Frame::from_fn(2, 4, |_, y| [0.5, y as f32 * 0.1, 0.0, 1.0]);
        let output = harness.run(&mut ChromaVertBlend, &config, 0, &input).unwrap();
        assert!((output.get_pixel(0, 0)[1] - 0.0).abs() < 1e-6);
        assert!((output.get_pixel(0, 2)[1] - 0.15).abs() < 1e-6);
    }
}
