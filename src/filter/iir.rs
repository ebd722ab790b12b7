use tracing::debug;

use crate::effects::StageContext;
use crate::error::{FilterError, StageError};
use crate::filter::TransferFunction;
use crate::gpu::{Geometry, SizedResources, Texture};
use crate::kernels::iir::{CoefficientParams, FinalParams, UpdateParams};
use crate::kernels::{self, CHANNEL_I, CHANNEL_Q, CHANNEL_Y};

/// Assumed history of a filter before its first sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialCondition {
    /// The filter starts from silence
    Zero,
    /// The filter has seen the first input forever
    FirstSample,
    /// The filter has seen this value on every channel forever
    Constant(f32),
}

/// Set of YIQ channels a filter acts on; the rest pass through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const Y: ChannelMask = ChannelMask(CHANNEL_Y);
    pub const I: ChannelMask = ChannelMask(CHANNEL_I);
    pub const Q: ChannelMask = ChannelMask(CHANNEL_Q);
    pub const CHROMA: ChannelMask = ChannelMask(CHANNEL_I | CHANNEL_Q);
    pub const ALL: ChannelMask = ChannelMask(CHANNEL_Y | CHANNEL_I | CHANNEL_Q);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, channel: usize) -> bool {
        kernels::masked(self.0, channel)
    }
}

impl std::ops::BitOr for ChannelMask {
    type Output = ChannelMask;

    fn bitor(self, rhs: ChannelMask) -> ChannelMask {
        ChannelMask(self.0 | rhs.0)
    }
}

/// Recursive state of one filter: one image per coefficient position
#[derive(Debug)]
pub struct FilterMemory {
    slots: Vec<Texture>,
    filtered: Texture,
}

impl FilterMemory {
    fn allocate(ctx: &StageContext<'_>, geometry: Geometry, len: usize) -> Result<Self, StageError> {
        let slots = (0..len)
            .map(|i| ctx.make_texture(geometry, &format!("iir.memory[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;
        let filtered = ctx.make_texture(geometry, "iir.filtered")?;
        Ok(Self { slots, filtered })
    }

    pub fn slots(&self) -> &[Texture] {
        &self.slots
    }
}

/// A stateful IIR filter evaluated on every pixel of a stream of frames
///
/// Each pixel channel is filtered independently over time with the
/// transposed direct-form recurrence
///
/// ```text
/// filtered  = z[0] + b[0] * x
/// z[i]      = z[i + 1] + b[i + 1] * x - a[i + 1] * filtered
/// output    = (filtered - x) * scale + x
/// ```
///
/// Memory is allocated on first use and whenever the frame geometry changes;
/// at that point it is primed from the configured [`InitialCondition`].
#[derive(Debug)]
pub struct IirFilter {
    numerators: Vec<f32>,
    denominators: Vec<f32>,
    steady_state: Vec<f32>,
    initial_condition: InitialCondition,
    scale: f32,
    channels: ChannelMask,
    memory: SizedResources<FilterMemory>,
}

impl IirFilter {
    /// Build a filter from a transfer function
    ///
    /// Coefficients are normalized by the first non-zero denominator. Fails
    /// when every denominator is zero.
    pub fn new(
        transfer: &TransferFunction,
        initial_condition: InitialCondition,
        scale: f32,
        channels: ChannelMask,
    ) -> Result<Self, FilterError> {
        let norm = transfer.first_nonzero_denominator()?;
        let steady_state = transfer.steady_state_memory()?;

        Ok(Self {
            numerators: transfer.numerators().iter().map(|c| c / norm).collect(),
            denominators: transfer.denominators().iter().map(|c| c / norm).collect(),
            steady_state,
            initial_condition,
            scale,
            channels,
            memory: SizedResources::new(),
        })
    }

    pub fn numerators(&self) -> &[f32] {
        &self.numerators
    }

    pub fn denominators(&self) -> &[f32] {
        &self.denominators
    }

    pub fn memory(&self) -> Option<&FilterMemory> {
        self.memory.get()
    }

    /// Forget the filter state; the next run re-primes it
    pub fn reset(&mut self) {
        self.memory.invalidate();
    }

    /// Record one filter step from `input` to `output`
    pub fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError> {
        let len = self.numerators.len();
        let (memory, fresh) = self
            .memory
            .get_or_try_init(input.geometry(), |geometry| {
                FilterMemory::allocate(ctx, geometry, len)
            })?;
        let slots = memory.slots.clone();
        let filtered = memory.filtered.clone();

        if fresh {
            debug!(
                stage = ctx.stage(),
                order = len,
                width = input.width(),
                height = input.height(),
                "Priming filter memory"
            );
            if let Err(err) = self.prime(ctx, &slots, input) {
                self.memory.invalidate();
                return Err(err);
            }
        }

        let mask = self.channels.bits();
        ctx.dispatch(
            kernels::IIR_FILTER_SAMPLE,
            &[input, &slots[0]],
            &filtered,
            &CoefficientParams {
                value: self.numerators[0],
                mask,
            },
        )?;
        for i in 0..len - 1 {
            ctx.dispatch(
                kernels::IIR_UPDATE_MEMORY,
                &[input, &slots[i + 1], &filtered],
                &slots[i],
                &UpdateParams {
                    numerator: self.numerators[i + 1],
                    denominator: self.denominators[i + 1],
                    mask,
                },
            )?;
        }
        ctx.dispatch(
            kernels::IIR_FINAL,
            &[input, &filtered],
            output,
            &FinalParams {
                scale: self.scale,
                mask,
            },
        )
    }

    /// Fill fresh memory according to the initial condition
    fn prime(
        &self,
        ctx: &mut StageContext<'_>,
        slots: &[Texture],
        input: &Texture,
    ) -> Result<(), StageError> {
        for (slot, coefficient) in slots.iter().zip(&self.steady_state) {
            match self.initial_condition {
                InitialCondition::Zero => ctx.fill(slot, [0.0; 4])?,
                InitialCondition::FirstSample => ctx.dispatch(
                    kernels::IIR_INITIAL_CONDITION,
                    &[input],
                    slot,
                    &CoefficientParams {
                        value: *coefficient,
                        mask: self.channels.bits(),
                    },
                )?,
                InitialCondition::Constant(value) => {
                    let mut fill = [0.0; 4];
                    for (channel, v) in fill.iter_mut().enumerate().take(3) {
                        if self.channels.contains(channel) {
                            *v = value * coefficient;
                        }
                    }
                    ctx.fill(slot, fill)?
                }
            }
        }
        Ok(())
    }
}

/// Holds a filter built from some design key and rebuilds it when the key changes
#[derive(Debug)]
pub struct FilterSlot<K> {
    key: Option<K>,
    filter: Option<IirFilter>,
}

impl<K> Default for FilterSlot<K> {
    fn default() -> Self {
        Self {
            key: None,
            filter: None,
        }
    }
}

impl<K: PartialEq> FilterSlot<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter for `key`, building it with `build` if the key changed
    pub fn get_or_try_build<F>(&mut self, key: K, build: F) -> Result<&mut IirFilter, FilterError>
    where
        F: FnOnce(&K) -> Result<IirFilter, FilterError>,
    {
        let current = self.key.as_ref() == Some(&key);
        let filter = match self.filter.take() {
            Some(filter) if current => filter,
            _ => build(&key)?,
        };
        self.key = Some(key);
        Ok(self.filter.insert(filter))
    }

    pub fn release(&mut self) {
        self.key = None;
        self.filter = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectConfiguration, FrameContext};
    use crate::filter::{butterworth, lowpass, NTSC_RATE};
    use crate::gpu::{CpuDevice, Device, KernelProgramCache};

    struct Harness {
        device: CpuDevice,
        kernels: KernelProgramCache,
        config: EffectConfiguration,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                device: CpuDevice::new().unwrap(),
                kernels: KernelProgramCache::new(),
                config: EffectConfiguration::passthrough(),
            }
        }

        fn texture(&self, width: u32, height: u32, value: [f32; 4]) -> Texture {
            let texture = self
                .device
                .make_texture(Geometry::new(width, height), "test")
                .unwrap();
            let mut commands = self.device.make_command_buffer("init").unwrap();
            commands.blit_encoder().unwrap().fill(&texture, value).unwrap();
            self.device.commit_and_wait(&mut commands).unwrap();
            texture
        }

        fn run(&mut self, filter: &mut IirFilter, input: &Texture, output: &Texture) {
            let mut commands = self.device.make_command_buffer("frame").unwrap();
            {
                let mut ctx = StageContext::new(
                    "test",
                    &self.device,
                    &mut self.kernels,
                    &mut commands,
                    FrameContext::default(),
                    &self.config,
                );
                filter.run(&mut ctx, input, output).unwrap();
            }
            self.device.commit_and_wait(&mut commands).unwrap();
        }
    }

    #[test]
    fn test_zero_initial_condition_memory_after_one_pass() {
        let mut harness = Harness::new();
        let tf = butterworth(1_300_000.0, NTSC_RATE).unwrap();
        let mut filter = IirFilter::new(&tf, InitialCondition::Zero, 1.0, ChannelMask::Y).unwrap();

        let input = harness.texture(4, 3, [0.5, 0.5, 0.5, 1.0]);
        let output = harness.texture(4, 3, [0.0; 4]);
        harness.run(&mut filter, &input, &output);

        let (b, a) = (filter.numerators().to_vec(), filter.denominators().to_vec());
        let slots = filter.memory().unwrap().slots();
        assert_eq!(slots.len(), 3);

        let z0 = slots[0].pixel(2, 1).unwrap();
        let z1 = slots[1].pixel(2, 1).unwrap();
        let z2 = slots[2].pixel(2, 1).unwrap();
        assert!((z0[0] - 0.5 * (b[1] - a[1] * b[0])).abs() < 1e-7);
        assert!((z1[0] - 0.5 * (b[2] - a[2] * b[0])).abs() < 1e-7);
        assert_eq!(z2[0], 0.0);
        // unfiltered channels hold nothing
        assert_eq!(z0[1], 0.0);

        let out = output.pixel(0, 0).unwrap();
        assert!((out[0] - 0.5 * b[0]).abs() < 1e-7);
        assert_eq!(&out[1..], &[0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_first_sample_has_no_transient() {
        let mut harness = Harness::new();
        let tf = lowpass(1_300_000.0, NTSC_RATE).unwrap().cascade(3);
        let mut filter =
            IirFilter::new(&tf, InitialCondition::FirstSample, 1.0, ChannelMask::CHROMA).unwrap();

        let input = harness.texture(3, 3, [0.4, 0.2, -0.1, 1.0]);
        let output = harness.texture(3, 3, [0.0; 4]);
        for _ in 0..5 {
            harness.run(&mut filter, &input, &output);
            let out = output.pixel(1, 1).unwrap();
            assert!((out[0] - 0.4).abs() < 1e-5, "{:?}", out);
            assert!((out[1] - 0.2).abs() < 1e-5, "{:?}", out);
            assert!((out[2] + 0.1).abs() < 1e-5, "{:?}", out);
        }
    }

    #[test]
    fn test_constant_initial_condition_matches_input_value() {
        let mut harness = Harness::new();
        let tf = butterworth(600_000.0, NTSC_RATE).unwrap();
        let mut filter =
            IirFilter::new(&tf, InitialCondition::Constant(0.25), 1.0, ChannelMask::ALL).unwrap();

        let input = harness.texture(2, 2, [0.25, 0.25, 0.25, 1.0]);
        let output = harness.texture(2, 2, [0.0; 4]);
        harness.run(&mut filter, &input, &output);
        let out = output.pixel(0, 0).unwrap();
        for channel in 0..3 {
            assert!((out[channel] - 0.25).abs() < 1e-5, "{:?}", out);
        }
    }

    #[test]
    fn test_zero_start_converges_over_frames() {
        let mut harness = Harness::new();
        let tf = lowpass(1_300_000.0, NTSC_RATE).unwrap();
        let mut filter = IirFilter::new(&tf, InitialCondition::Zero, 1.0, ChannelMask::Y).unwrap();

        let input = harness.texture(2, 2, [1.0, 0.0, 0.0, 1.0]);
        let output = harness.texture(2, 2, [0.0; 4]);
        let mut previous = 0.0;
        for _ in 0..20 {
            harness.run(&mut filter, &input, &output);
            let y = output.pixel(0, 0).unwrap()[0];
            assert!(y > previous && y <= 1.0 + 1e-6);
            previous = y;
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn test_negative_scale_emphasizes_changes() {
        let mut harness = Harness::new();
        let tf = lowpass(1_300_000.0, NTSC_RATE).unwrap();
        let mut filter = IirFilter::new(&tf, InitialCondition::Zero, -1.0, ChannelMask::Y).unwrap();

        let input = harness.texture(1, 1, [0.5, 0.0, 0.0, 1.0]);
        let output = harness.texture(1, 1, [0.0; 4]);
        harness.run(&mut filter, &input, &output);
        assert!(output.pixel(0, 0).unwrap()[0] > 0.5);
    }

    #[test]
    fn test_geometry_change_reprimes_memory() {
        let mut harness = Harness::new();
        let tf = lowpass(1_300_000.0, NTSC_RATE).unwrap();
        let mut filter = IirFilter::new(&tf, InitialCondition::FirstSample, 1.0, ChannelMask::Y).unwrap();

        let small = harness.texture(2, 2, [0.3, 0.0, 0.0, 1.0]);
        let small_out = harness.texture(2, 2, [0.0; 4]);
        harness.run(&mut filter, &small, &small_out);

        let large = harness.texture(5, 4, [0.7, 0.0, 0.0, 1.0]);
        let large_out = harness.texture(5, 4, [0.0; 4]);
        harness.run(&mut filter, &large, &large_out);

        assert_eq!(filter.memory().unwrap().slots()[0].width(), 5);
        assert!((large_out.pixel(4, 3).unwrap()[0] - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_all_zero_denominator_fails_fast() {
        let tf = TransferFunction::new(vec![0.5, 0.5], vec![0.0, 0.0]);
        assert_eq!(
            IirFilter::new(&tf, InitialCondition::FirstSample, 1.0, ChannelMask::Y).unwrap_err(),
            FilterError::NoNonZeroDenominator
        );
    }

    #[test]
    fn test_filter_slot_rebuilds_on_key_change() {
        let mut slot: FilterSlot<u32> = FilterSlot::new();
        let mut builds = 0;
        for key in [1, 1, 2] {
            slot.get_or_try_build(key, |_| {
                builds += 1;
                IirFilter::new(&lowpass(1e6, NTSC_RATE).unwrap(), InitialCondition::Zero, 1.0, ChannelMask::Y)
            })
            .unwrap();
        }
        assert_eq!(builds, 2);
    }
}
