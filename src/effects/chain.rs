use crate::effects::bandwidth::{ChromaLowpassStage, InputLumaFilter, Preemphasis, Ringing};
use crate::effects::chroma::{ChromaVertBlend, PhaseError, PhaseNoise};
use crate::effects::composite::{ChromaFromLuma, ChromaIntoLuma};
use crate::effects::convert::{RgbToYiq, YiqToRgb};
use crate::effects::field::FieldCompose;
use crate::effects::noise::{LineNoise, Snow};
use crate::effects::tape::{HeadSwitching, TrackingNoise};
use crate::effects::vhs::Vhs;
use crate::effects::{Stage, StageRng};

/// The full emulation chain, in signal order
///
/// Stages that draw random numbers are seeded from `seed` and their
/// position, so two chains built from the same seed render identically.
pub fn standard_chain(seed: u64) -> Vec<Box<dyn Stage>> {
    let rng = |index: usize| StageRng::new(seed, index);

    vec![
        Box::new(RgbToYiq),
        Box::new(InputLumaFilter::new()),
        Box::new(ChromaLowpassStage::input()),
        Box::new(ChromaIntoLuma),
        Box::new(Preemphasis::new()),
        Box::new(LineNoise::composite(rng(5))),
        Box::new(Ringing::new()),
        Box::new(Snow::new(rng(7))),
        Box::new(HeadSwitching::new(rng(8))),
        Box::new(TrackingNoise::new(rng(9))),
        Box::new(ChromaFromLuma),
        Box::new(LineNoise::luma(rng(11))),
        Box::new(LineNoise::chroma(rng(12))),
        Box::new(PhaseError),
        Box::new(PhaseNoise::new(rng(14))),
        Box::new(Vhs::new(rng(15))),
        Box::new(ChromaVertBlend),
        Box::new(ChromaLowpassStage::output()),
        Box::new(FieldCompose::new()),
        Box::new(YiqToRgb),
    ]
}
