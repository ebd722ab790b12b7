use crate::effects::{
    EffectConfiguration, Stage, StageContext, StageRng, VhsSharpenSettings, VhsTapeSpeed,
};
use crate::error::StageError;
use crate::filter::{lowpass_triple, ChannelMask, FilterSlot, IirFilter, InitialCondition};
use crate::gpu::{SizedResources, Texture};
use crate::kernels::{
    self,
    color::{ChromaDelayParams, ChromaLossParams},
    displace::EdgeWaveParams,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct TapeDesign {
    speed: VhsTapeSpeed,
    sample_rate: f64,
}

/// Alternates between two scratch buffers so every step reads the
/// previous step's result
struct ScratchChain {
    current: Texture,
    buffers: Vec<Texture>,
    next: usize,
}

impl ScratchChain {
    fn new(input: &Texture, buffers: Vec<Texture>) -> Self {
        Self {
            current: input.clone(),
            buffers,
            next: 0,
        }
    }

    /// Source and target of the next step
    fn step(&mut self) -> (Texture, Texture) {
        let target = self.buffers[self.next].clone();
        self.next = (self.next + 1) % self.buffers.len();
        let source = std::mem::replace(&mut self.current, target.clone());
        (source, target)
    }
}

/// Record-and-playback through a VHS deck
///
/// Runs its own sub-chain on two scratch buffers: edge wave, tape bandwidth
/// limits with the chroma delay of the chosen speed, chroma loss and the
/// deck's sharpening. Every step is optional.
pub struct Vhs {
    luma: FilterSlot<TapeDesign>,
    chroma: FilterSlot<TapeDesign>,
    sharpen: FilterSlot<(TapeDesign, VhsSharpenSettings)>,
    scratch: SizedResources<Vec<Texture>>,
    wave_seed: u32,
    rng: StageRng,
}

impl Vhs {
    pub fn new(mut rng: StageRng) -> Self {
        // the edge wave drifts smoothly, so its seed stays fixed across frames
        let wave_seed = rng.next_seed();
        Self {
            luma: FilterSlot::new(),
            chroma: FilterSlot::new(),
            sharpen: FilterSlot::new(),
            scratch: SizedResources::new(),
            wave_seed,
            rng,
        }
    }
}

impl Stage for Vhs {
    fn name(&self) -> &'static str {
        "vhs"
    }

    fn is_enabled(&self, config: &EffectConfiguration) -> bool {
        config.vhs_settings.is_some()
    }

    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let name = self.name();
        let Some(vhs) = ctx.config().vhs_settings else {
            return ctx.blit(input, output);
        };
        let sample_rate = ctx.config().sample_rate();
        let bandwidth_scale = ctx.config().bandwidth_scale;

        let (scratch, _) = self
            .scratch
            .get_or_try_init(input.geometry(), |geometry| {
                ctx.make_textures(geometry, "scratch", 2)
            })?;
        let mut chain = ScratchChain::new(input, scratch.clone());

        if let Some(wave) = vhs.edge_wave.filter(|wave| wave.intensity > 0.0) {
            let (source, target) = chain.step();
            let params = EdgeWaveParams {
                intensity: wave.intensity * bandwidth_scale,
                speed: wave.speed,
                frequency: wave.frequency,
                detail: wave.detail,
                time: ctx.frame().frame_number() as f32,
                seed: self.wave_seed,
            };
            ctx.dispatch(kernels::EDGE_WAVE, &[&source], &target, &params)?;
        }

        if let Some(speed) = vhs.tape_speed {
            let design = TapeDesign { speed, sample_rate };

            let (source, target) = chain.step();
            self.luma
                .get_or_try_build(design, |d| {
                    IirFilter::new(
                        &lowpass_triple(d.speed.luma_cut(), d.sample_rate)?,
                        InitialCondition::FirstSample,
                        1.0,
                        ChannelMask::Y,
                    )
                })
                .map_err(|e| StageError::filter(name, e))?
                .run(ctx, &source, &target)?;

            let (source, target) = chain.step();
            self.chroma
                .get_or_try_build(design, |d| {
                    IirFilter::new(
                        &lowpass_triple(d.speed.chroma_cut(), d.sample_rate)?,
                        InitialCondition::FirstSample,
                        1.0,
                        ChannelMask::CHROMA,
                    )
                })
                .map_err(|e| StageError::filter(name, e))?
                .run(ctx, &source, &target)?;

            let (source, target) = chain.step();
            let delay = speed.chroma_delay();
            ctx.dispatch(
                kernels::CHROMA_DELAY,
                &[&source],
                &target,
                &ChromaDelayParams {
                    i_shift: delay,
                    q_shift: delay,
                },
            )?;
        }

        if vhs.chroma_loss > 0.0 {
            let (source, target) = chain.step();
            let params = ChromaLossParams {
                probability: vhs.chroma_loss,
                seed: self.rng.next_seed(),
            };
            ctx.dispatch(kernels::CHROMA_LOSS, &[&source], &target, &params)?;
        }

        if let Some(sharpen) = vhs.sharpen.filter(|sharpen| sharpen.intensity > 0.0) {
            let design = TapeDesign {
                speed: vhs.tape_speed.unwrap_or_default(),
                sample_rate,
            };
            let (source, target) = chain.step();
            self.sharpen
                .get_or_try_build((design, sharpen), |(d, sharpen)| {
                    let cutoff = d.speed.luma_cut() * 4.0 * sharpen.frequency as f64;
                    IirFilter::new(
                        &lowpass_triple(cutoff, d.sample_rate)?,
                        InitialCondition::FirstSample,
                        -2.0 * sharpen.intensity,
                        ChannelMask::Y,
                    )
                })
                .map_err(|e| StageError::filter(name, e))?
                .run(ctx, &source, &target)?;
        }

        ctx.blit(&chain.current, output)
    }

    fn release(&mut self) {
        self.luma.release();
        self.chroma.release();
        self.sharpen.release();
        self.scratch.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::StageHarness;
    use crate::effects::{VhsEdgeWaveSettings, VhsSettings};
    use crate::frame::Frame;

    const COLOR_YIQ: [f32; 4] = [0.5, 0.15, -0.1, 1.0];

    fn config(vhs: VhsSettings) -> EffectConfiguration {
        let mut config = EffectConfiguration::passthrough();
        config.vhs_settings = Some(vhs);
        config
    }

    #[test]
    fn test_tape_filters_keep_still_flat_frames() {
        let mut harness = StageHarness::new();
        let mut stage = Vhs::new(StageRng::new(0, 15));
        let config = config(VhsSettings {
            tape_speed: Some(VhsTapeSpeed::EP),
            chroma_loss: 0.0,
            sharpen: Some(VhsSharpenSettings::default()),
            edge_wave: None,
        });

        let input = Frame::new_filled(12, 4, COLOR_YIQ);
        for frame in 0..3 {
            let output = harness.run(&mut stage, &config, frame, &input).unwrap();
            let pixel = output.get_pixel(6, 2);
            for channel in 0..4 {
                assert!((pixel[channel] - COLOR_YIQ[channel]).abs() < 1e-4, "{:?}", pixel);
            }
        }
    }

    #[test]
    fn test_full_chroma_loss_drops_color() {
        let mut harness = StageHarness::new();
        let mut stage = Vhs::new(StageRng::new(0, 15));
        let config = config(VhsSettings {
            tape_speed: None,
            chroma_loss: 1.0,
            sharpen: None,
            edge_wave: None,
        });

        let output = harness
            .run(&mut stage, &config, 0, &Frame::new_filled(6, 5, COLOR_YIQ))
            .unwrap();
        for y in 0..5 {
            assert_eq!(output.get_pixel(3, y), [0.5, 0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_edge_wave_displaces_rows() {
        let mut harness = StageHarness::new();
        let mut stage = Vhs::new(StageRng::new(0, 15));
        let config = config(VhsSettings {
            tape_speed: None,
            chroma_loss: 0.0,
            sharpen: None,
            edge_wave: Some(VhsEdgeWaveSettings {
                intensity: 3.0,
                ..VhsEdgeWaveSettings::default()
            }),
        });

        let input = Frame::ramp(32, 16);
        let output = harness.run(&mut stage, &config, 0, &input).unwrap();
        assert_ne!(output.as_image(), input.as_image());
        // alpha is never displaced
        assert_eq!(output.get_pixel(0, 0)[3], 1.0);
    }

    #[test]
    fn test_empty_settings_pass_through() {
        let mut harness = StageHarness::new();
        let mut stage = Vhs::new(StageRng::new(0, 15));
        let config = config(VhsSettings {
            tape_speed: None,
            chroma_loss: 0.0,
            sharpen: None,
            edge_wave: None,
        });
        let input = Frame::ramp(8, 3);
        let output = harness.run(&mut stage, &config, 0, &input).unwrap();
        assert_eq!(output, input);
    }
}
