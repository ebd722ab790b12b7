//! Playback artifacts confined to the bottom of the picture

use crate::effects::{EffectConfiguration, Stage, StageContext, StageRng};
use crate::error::StageError;
use crate::gpu::Texture;
use crate::kernels::{
    self,
    displace::{HeadSwitchingParams, TrackingNoiseParams},
};

/// Band of rows dragged sideways where the video heads switch over
pub struct HeadSwitching {
    rng: StageRng,
}

impl HeadSwitching {
    pub fn new(rng: StageRng) -> Self {
        Self { rng }
    }
}

impl Stage for HeadSwitching {
    fn name(&self) -> &'static str {
        "head_switching"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.head_switching.is_some()
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let Some(settings) = ctx.config().head_switching else {
            return ctx.blit(input, output);
        };
        let mid_line = settings.mid_line;
        let params = HeadSwitchingParams {
            rows: settings.height,
            offset: settings.offset,
            horiz_shift: settings.horiz_shift * ctx.config().bandwidth_scale,
            mid_line: mid_line.is_some() as u32,
            mid_line_position: mid_line.map_or(0.0, |m| m.position),
            mid_line_jitter: mid_line.map_or(0.0, |m| m.jitter),
            seed: self.rng.next_seed(),
        };
        ctx.dispatch(kernels::HEAD_SWITCHING, &[input], output, &params)
    }
}

/// Mistracking: wavy, noisy, snowy rows at the bottom of the frame
pub struct TrackingNoise {
    rng: StageRng,
}

impl TrackingNoise {
    pub fn new(rng: StageRng) -> Self {
        Self { rng }
    }
}

impl Stage for TrackingNoise {
    fn name(&self) -> &'static str {
        "tracking_noise"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.tracking_noise.is_some()
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let Some(settings) = ctx.config().tracking_noise else {
            return ctx.blit(input, output);
        };
        let params = TrackingNoiseParams {
            rows: settings.height,
            wave_intensity: settings.wave_intensity * ctx.config().bandwidth_scale,
            snow_intensity: settings.snow_intensity,
            snow_anisotropy: settings.snow_anisotropy,
            noise_intensity: settings.noise_intensity,
            seed: self.rng.next_seed(),
        };
        ctx.dispatch(kernels::TRACKING_NOISE, &[input], output, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{HeadSwitchingSettings, TrackingNoiseSettings};
    use crate::frame::Frame;
    use crate::effects::testing::StageHarness;

    fn stripes() -> Frame {
        Frame::from_fn(48, 24, |x, _| {
            let y = if (x / 3) % 2 == 0 { 0.2 } else { 0.8 };
            [y, 0.0, 0.0, 1.0]
        })
    }

    fn rows_changed(a: &Frame, b: &Frame) -> Vec<u32> {
        (0..a.height())
            .filter(|&y| (0..a.width()).any(|x| a.get_pixel(x, y) != b.get_pixel(x, y)))
            .collect()
    }

    #[test]
    fn test_head_switching_moves_only_the_bottom_band() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.head_switching = Some(HeadSwitchingSettings {
            height: 6,
            offset: 2,
            horiz_shift: 10.0,
            mid_line: None,
        });
        let input = stripes();
        let output = harness
            .run(&mut HeadSwitching::new(StageRng::new(0, 8)), &config, 0, &input)
            .unwrap();

        let changed = rows_changed(&input, &output);
        assert!(!changed.is_empty());
        assert!(changed.iter().all(|&y| y >= 18), "{:?}", changed);
    }

    #[test]
    fn test_tracking_noise_stays_in_its_band() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.tracking_noise = Some(TrackingNoiseSettings {
            height: 5,
            ..TrackingNoiseSettings::default()
        });
        let input = stripes();
        let output = harness
            .run(&mut TrackingNoise::new(StageRng::new(0, 9)), &config, 0, &input)
            .unwrap();

        let changed = rows_changed(&input, &output);
        assert!(!changed.is_empty());
        assert!(changed.iter().all(|&y| y >= 19), "{:?}", changed);
    }
}
