use crate::effects::{EffectConfiguration, NoiseSettings, Stage, StageContext, StageRng};
use crate::error::StageError;
use crate::filter::ChannelMask;
use crate::gpu::Texture;
use crate::kernels::{
    self,
    noise::{NoiseParams, SnowParams},
};

/// Fractal noise along each scanline on a fixed set of channels
///
/// The same stage type serves composite, luma and chroma noise; each instance
/// reads its own settings and draws a fresh seed every frame.
pub struct LineNoise {
    name: &'static str,
    settings: fn(&EffectConfiguration) -> Option<NoiseSettings>,
    channels: ChannelMask,
    rng: StageRng,
}

impl LineNoise {
    /// Noise on the composite signal, which lives in luma
    pub fn composite(rng: StageRng) -> Self {
        Self {
            name: "composite_noise",
            settings: |config| config.composite_noise,
            channels: ChannelMask::Y,
            rng,
        }
    }

    pub fn luma(rng: StageRng) -> Self {
        Self {
            name: "luma_noise",
            settings: |config| config.luma_noise,
            channels: ChannelMask::Y,
            rng,
        }
    }

    pub fn chroma(rng: StageRng) -> Self {
        Self {
            name: "chroma_noise",
            settings: |config| config.chroma_noise,
            channels: ChannelMask::CHROMA,
            rng,
        }
    }
}

impl Stage for LineNoise {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        (self.settings)(config).is_some_and(|noise| noise.intensity > 0.0)
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let Some(noise) = (self.settings)(ctx.config()) else {
            return ctx.blit(input, output);
        };
        let params = NoiseParams {
            frequency: noise.frequency / ctx.config().bandwidth_scale,
            intensity: noise.intensity,
            detail: noise.detail,
            seed: self.rng.next_seed(),
            mask: self.channels.bits(),
        };
        ctx.dispatch(kernels::FBM_NOISE, &[input], output, &params)
    }
}

/// Bright specks of interference in luma
pub struct Snow {
    rng: StageRng,
}

impl Snow {
    pub fn new(rng: StageRng) -> Self {
        Self { rng }
    }
}

impl Stage for Snow {
    fn name(&self) -> &'static str {
        "snow"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.snow_intensity > 0.0
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let params = SnowParams {
            intensity: ctx.config().snow_intensity,
            anisotropy: ctx.config().snow_anisotropy,
            seed: self.rng.next_seed(),
        };
        ctx.dispatch(kernels::SNOW, &[input], output, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::StageHarness;
    use crate::frame::Frame;

    const GRAY_YIQ: [f32; 4] = [0.5, 0.0, 0.0, 1.0];

    #[test]
    fn test_luma_noise_leaves_chroma_alone() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.luma_noise = Some(NoiseSettings {
            frequency: 0.3,
            intensity: 0.2,
            detail: 2,
        });
        let mut stage = LineNoise::luma(StageRng::new(1, 0));
        let output = harness
            .run(&mut stage, &config, 0, &Frame::new_filled(32, 8, GRAY_YIQ))
            .unwrap();

        let mut moved = false;
        for y in 0..8 {
            for x in 0..32 {
                let pixel = output.get_pixel(x, y);
                moved |= (pixel[0] - 0.5).abs() > 1e-4;
                assert!((pixel[0] - 0.5).abs() <= 0.2 + 1e-6);
                assert_eq!(&pixel[1..], &[0.0, 0.0, 1.0]);
            }
        }
        assert!(moved);
    }

    #[test]
    fn test_chroma_noise_leaves_luma_alone() {
        let mut harness = StageHarness::new();
        let config = EffectConfiguration::default();
        let mut stage = LineNoise::chroma(StageRng::new(1, 0));
        let output = harness
            .run(&mut stage, &config, 0, &Frame::new_filled(16, 4, GRAY_YIQ))
            .unwrap();
        for x in 0..16 {
            assert_eq!(output.get_pixel(x, 2)[0], 0.5);
        }
    }

    #[test]
    fn test_noise_is_reproducible_per_seed_and_varies_per_frame() {
        let mut config = EffectConfiguration::passthrough();
        config.composite_noise = Some(NoiseSettings {
            intensity: 0.1,
            ..NoiseSettings::default()
        });
        let input = Frame::new_filled(24, 6, GRAY_YIQ);

        let render = |frames: u32| {
            let mut harness = StageHarness::new();
            let mut stage = LineNoise::composite(StageRng::new(99, 5));
            (0..frames)
                .map(|frame| harness.run(&mut stage, &config, frame, &input).unwrap())
                .collect::<Vec<_>>()
        };

        let first = render(2);
        let second = render(2);
        assert_eq!(first[0].as_image(), second[0].as_image());
        assert_eq!(first[1].as_image(), second[1].as_image());
        assert_ne!(first[0].as_image(), first[1].as_image());
    }

    #[test]
    fn test_snow_only_brightens() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.snow_intensity = 0.2;
        config.snow_anisotropy = 0.5;
        let mut stage = Snow::new(StageRng::new(3, 0));
        let output = harness
            .run(&mut stage, &config, 0, &Frame::new_filled(40, 10, GRAY_YIQ))
            .unwrap();

        let mut specks = 0;
        for y in 0..10 {
            for x in 0..40 {
                let y_value = output.get_pixel(x, y)[0];
                assert!(y_value >= 0.5);
                if y_value > 0.5 {
                    specks += 1;
                }
            }
        }
        assert!(specks > 0);
    }
}
