//! Modulation of chroma onto the subcarrier and its recovery

use crate::effects::{EffectConfiguration, Stage, StageContext};
use crate::error::StageError;
use crate::gpu::Texture;
use crate::kernels::{self, signal::ModulationParams};

fn modulation(ctx: &StageContext<'_>) -> ModulationParams {
    let config = ctx.config();
    ModulationParams {
        phase_shift: config.video_scanline_phase_shift.quarter_turns(),
        phase_offset: config.video_scanline_phase_shift_offset,
        frame: ctx.frame().frame_number(),
    }
}

/// Folds I and Q into luma on a subcarrier four samples per cycle
#[derive(Debug, Default)]
pub struct ChromaIntoLuma;

impl Stage for ChromaIntoLuma {
    fn name(&self) -> &'static str {
        "chroma_into_luma"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.composite_signal
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let params = modulation(ctx);
        ctx.dispatch(kernels::CHROMA_INTO_LUMA, &[input], output, &params)
    }
}

/// Separates chroma back out of the composite luma with a one-cycle box
#[derive(Debug, Default)]
pub struct ChromaFromLuma;

impl Stage for ChromaFromLuma {
    fn name(&self) -> &'static str {
        "chroma_from_luma"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.composite_signal
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let params = modulation(ctx);
        ctx.dispatch(kernels::CHROMA_FROM_LUMA, &[input], output, &params)
    }
}
