//! Stages built on temporal IIR filters: band limiting, emphasis and ringing

use crate::effects::{ChromaLowpass, EffectConfiguration, FilterType, LumaFilter, Stage, StageContext};
use crate::error::{FilterError, StageError};
use crate::filter::{
    butterworth, lowpass, lowpass_triple, notch, ChannelMask, FilterSlot, IirFilter,
    InitialCondition, TransferFunction, NTSC_SUBCARRIER_HZ,
};
use crate::gpu::{SizedResources, Texture};
use crate::kernels::{self, color::ChromaDelayParams};

/// Removes the subcarrier band from luma before chroma is modulated into it
#[derive(Debug, Default)]
pub struct InputLumaFilter {
    notch: FilterSlot<()>,
}

impl InputLumaFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for InputLumaFilter {
    fn name(&self) -> &'static str {
        "input_luma_filter"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.input_luma_filter != LumaFilter::None
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let name = self.name();
        let mode = ctx.config().input_luma_filter;
        match mode {
            LumaFilter::None => ctx.blit(input, output),
            LumaFilter::Box => ctx.dispatch(kernels::BOX_LUMA, &[input], output, &()),
            LumaFilter::Notch => {
                let filter = self
                    .notch
                    .get_or_try_build((), |_| {
                        IirFilter::new(
                            &notch(0.5, 2.0)?,
                            InitialCondition::FirstSample,
                            1.0,
                            ChannelMask::Y,
                        )
                    })
                    .map_err(|e| StageError::filter(name, e))?;
                filter.run(ctx, input, output)
            }
        }
    }

    fn release(&mut self) {
        self.notch.release();
    }
}

/// Everything a chroma lowpass filter is designed from
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChromaDesign {
    strength: ChromaLowpass,
    filter_type: FilterType,
    sample_rate: f64,
}

fn chroma_transfer(
    cutoff: f64,
    filter_type: FilterType,
    sample_rate: f64,
) -> Result<TransferFunction, FilterError> {
    match filter_type {
        FilterType::ConstantK => lowpass_triple(cutoff, sample_rate),
        FilterType::Butterworth => butterworth(cutoff, sample_rate),
    }
}

/// Band-limits the I and Q planes and delays them against luma
///
/// Used twice: once on the way into the composite signal and once after
/// decoding, each reading its own strength from the configuration.
pub struct ChromaLowpassStage {
    name: &'static str,
    strength: fn(&EffectConfiguration) -> ChromaLowpass,
    i_filter: FilterSlot<ChromaDesign>,
    q_filter: FilterSlot<ChromaDesign>,
    scratch: SizedResources<Vec<Texture>>,
}

impl ChromaLowpassStage {
    pub fn input() -> Self {
        Self::new("chroma_lowpass_in", |config| config.chroma_lowpass_in)
    }

    pub fn output() -> Self {
        Self::new("chroma_lowpass_out", |config| config.chroma_lowpass_out)
    }

    fn new(name: &'static str, strength: fn(&EffectConfiguration) -> ChromaLowpass) -> Self {
        Self {
            name,
            strength,
            i_filter: FilterSlot::new(),
            q_filter: FilterSlot::new(),
            scratch: SizedResources::new(),
        }
    }
}

impl Stage for ChromaLowpassStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        (self.strength)(config) != ChromaLowpass::None
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let strength = (self.strength)(ctx.config());
        // cutoffs in Hz, delays in columns
        let (i_cut, q_cut, i_delay, q_delay) = match strength {
            ChromaLowpass::None => return ctx.blit(input, output),
            ChromaLowpass::Light => (2_600_000.0, 2_600_000.0, 1, 1),
            ChromaLowpass::Full => (1_300_000.0, 600_000.0, 2, 4),
        };
        let design = ChromaDesign {
            strength,
            filter_type: ctx.config().filter_type,
            sample_rate: ctx.config().sample_rate(),
        };

        let (scratch, _) = self
            .scratch
            .get_or_try_init(input.geometry(), |geometry| {
                ctx.make_textures(geometry, "scratch", 2)
            })?;
        let scratch = scratch.clone();

        let name = self.name;
        let build = |cutoff: f64, channels: ChannelMask| {
            move |design: &ChromaDesign| -> Result<IirFilter, FilterError> {
                IirFilter::new(
                    &chroma_transfer(cutoff, design.filter_type, design.sample_rate)?,
                    InitialCondition::FirstSample,
                    1.0,
                    channels,
                )
            }
        };

        self.i_filter
            .get_or_try_build(design, build(i_cut, ChannelMask::I))
            .map_err(|e| StageError::filter(name, e))?
            .run(ctx, input, &scratch[0])?;
        self.q_filter
            .get_or_try_build(design, build(q_cut, ChannelMask::Q))
            .map_err(|e| StageError::filter(name, e))?
            .run(ctx, &scratch[0], &scratch[1])?;

        ctx.dispatch(
            kernels::CHROMA_DELAY,
            &[&scratch[1]],
            output,
            &ChromaDelayParams {
                i_shift: i_delay,
                q_shift: q_delay,
            },
        )
    }

    fn release(&mut self) {
        self.i_filter.release();
        self.q_filter.release();
        self.scratch.invalidate();
    }
}

/// Boosts high luma frequencies ahead of transmission
#[derive(Debug, Default)]
pub struct Preemphasis {
    filter: FilterSlot<(u32, u64)>,
}

impl Preemphasis {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for Preemphasis {
    fn name(&self) -> &'static str {
        "composite_preemphasis"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.composite_preemphasis > 0.0
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let name = self.name();
        let amount = ctx.config().composite_preemphasis;
        if amount <= 0.0 {
            return ctx.blit(input, output);
        }
        let sample_rate = ctx.config().sample_rate();

        let filter = self
            .filter
            .get_or_try_build((amount.to_bits(), sample_rate.to_bits()), |_| {
                IirFilter::new(
                    &lowpass(NTSC_SUBCARRIER_HZ / 2.0, sample_rate)?,
                    InitialCondition::FirstSample,
                    -amount,
                    ChannelMask::Y,
                )
            })
            .map_err(|e| StageError::filter(name, e))?;
        filter.run(ctx, input, output)
    }

    fn release(&mut self) {
        self.filter.release();
    }
}

/// Overshoot around luma transitions from a resonant notch
#[derive(Debug, Default)]
pub struct Ringing {
    filter: FilterSlot<crate::effects::RingingSettings>,
}

impl Ringing {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for Ringing {
    fn name(&self) -> &'static str {
        "ringing"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.ringing.is_some()
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let name = self.name();
        let Some(settings) = ctx.config().ringing else {
            return ctx.blit(input, output);
        };

        let filter = self
            .filter
            .get_or_try_build(settings, |settings| {
                IirFilter::new(
                    &notch(settings.frequency as f64, settings.power as f64)?,
                    InitialCondition::FirstSample,
                    settings.intensity,
                    ChannelMask::Y,
                )
            })
            .map_err(|e| StageError::filter(name, e))?;
        filter.run(ctx, input, output)
    }

    fn release(&mut self) {
        self.filter.release();
    }
}
