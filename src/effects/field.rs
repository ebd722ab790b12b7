use crate::effects::{EffectConfiguration, InterlaceMode, Stage, StageContext};
use crate::error::StageError;
use crate::gpu::{SizedResources, Texture};
use crate::kernels::{self, signal::FieldParams};

/// Weaves the current field with the other field of the previous frame
///
/// Keeps a copy of the last frame it saw; on the first frame, or after a
/// geometry change, that copy is the current frame itself.
#[derive(Debug, Default)]
pub struct FieldCompose {
    previous: SizedResources<Texture>,
}

impl FieldCompose {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for FieldCompose {
    fn name(&self) -> &'static str {
        "field_compose"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.interlace_mode == InterlaceMode::Interlaced
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        if ctx.config().interlace_mode == InterlaceMode::Full {
            return ctx.blit(input, output);
        }

        let (previous, fresh) = self
            .previous
            .get_or_try_init(input.geometry(), |geometry| {
                ctx.make_texture(geometry, "previous")
            })?;
        let previous = previous.clone();
        if fresh {
            ctx.blit(input, &previous)?;
        }

        let params = FieldParams {
            field: ctx.frame().field(),
            interlaced: 1,
        };
        ctx.dispatch(kernels::FIELD_COMPOSE, &[input, &previous], output, &params)?;
        ctx.blit(input, &previous)
    }

    fn release(&mut self) {
        self.previous.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::StageHarness;
    use crate::frame::Frame;

    #[test]
    fn test_alternate_frames_fill_alternate_lines() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.interlace_mode = InterlaceMode::Interlaced;
        let mut stage = FieldCompose::new();

        let dark = Frame::new_filled(4, 6, [0.1, 0.0, 0.0, 1.0]);
        let light = Frame::new_filled(4, 6, [0.9, 0.0, 0.0, 1.0]);

        let first = harness.run(&mut stage, &config, 0, &dark).unwrap();
        assert_eq!(first, dark);

        let second = harness.run(&mut stage, &config, 1, &light).unwrap();
        for y in 0..6 {
            let expected = if y % 2 == 1 { 0.9 } else { 0.1 };
            assert_eq!(second.get_pixel(2, y)[0], expected);
        }

        let third = harness.run(&mut stage, &config, 2, &dark).unwrap();
        for y in 0..6 {
            let expected = if y % 2 == 0 { 0.1 } else { 0.9 };
            assert_eq!(third.get_pixel(2, y)[0], expected);
        }
    }

    #[test]
    fn test_geometry_change_restarts_history() {
        let mut harness = StageHarness::new();
        let mut config = EffectConfiguration::passthrough();
        config.interlace_mode = InterlaceMode::Interlaced;
        let mut stage = FieldCompose::new();

        harness
            .run(&mut stage, &config, 0, &Frame::new_filled(4, 4, [0.2, 0.0, 0.0, 1.0]))
            .unwrap();
        let resized = Frame::new_filled(6, 2, [0.7, 0.0, 0.0, 1.0]);
        let output = harness.run(&mut stage, &config, 1, &resized).unwrap();
        assert_eq!(output, resized);
    }
}
