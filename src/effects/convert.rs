use crate::effects::{EffectConfiguration, Stage, StageContext};
use crate::error::StageError;
use crate::gpu::Texture;
use crate::kernels;

/// Converts the incoming RGB frame into the YIQ working space
#[derive(Debug, Default)]
pub struct RgbToYiq;

impl Stage for RgbToYiq {
    fn name(&self) -> &'static str {
        "rgb_to_yiq"
    }

    fn is_enabled(&self, _config: &EffectConfiguration) -> bool {
        true
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        ctx.dispatch(kernels::RGB_TO_YIQ, &[input], output, &())
    }
}

/// Converts the finished YIQ signal back to RGB
#[derive(Debug, Default)]
pub struct YiqToRgb;

impl Stage for YiqToRgb {
    fn name(&self) -> &'static str {
        "yiq_to_rgb"
    }

    fn is_enabled(&self, _config: &EffectConfiguration) -> bool {
        true
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        ctx.dispatch(kernels::YIQ_TO_RGB, &[input], output, &())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::StageHarness;
    use crate::frame::Frame;

    #[test]
    fn test_conversion_stages_round_trip() {
        let mut harness = StageHarness::new();
        let config = EffectConfiguration::passthrough();
        let input = Frame::color_bars(16, 4);

        let yiq = harness.run(&mut RgbToYiq, &config, 0, &input).unwrap();
        let rgb = harness.run(&mut YiqToRgb, &config, 0, &yiq).unwrap();
        assert!(rgb.max_abs_difference(&input).unwrap() < 1e-3);
    }
}
