use bytemuck::Pod;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::effects::EffectConfiguration;
use crate::error::StageError;
use crate::gpu::{CommandBuffer, Device, Geometry, KernelProgramCache, Texture};

/// Per-frame state shared with every stage
///
/// The counter wraps at 2^32 and advances once per produced frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameContext {
    frame_number: u32,
}

impl FrameContext {
    pub fn new(frame_number: u32) -> Self {
        Self { frame_number }
    }

    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Parity of the field this frame contributes
    pub fn field(&self) -> u32 {
        self.frame_number & 1
    }

    pub fn advance(&mut self) {
        self.frame_number = self.frame_number.wrapping_add(1);
    }
}

/// Everything a stage needs while recording its work for one frame
pub struct StageContext<'a> {
    stage: &'a str,
    device: &'a dyn Device,
    kernels: &'a mut KernelProgramCache,
    commands: &'a mut CommandBuffer,
    frame: FrameContext,
    config: &'a EffectConfiguration,
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: &'a str,
        device: &'a dyn Device,
        kernels: &'a mut KernelProgramCache,
        commands: &'a mut CommandBuffer,
        frame: FrameContext,
        config: &'a EffectConfiguration,
    ) -> Self {
        Self {
            stage,
            device,
            kernels,
            commands,
            frame,
            config,
        }
    }

    /// Name errors raised through this context are attributed to
    pub fn stage(&self) -> &str {
        self.stage
    }

    pub fn device(&self) -> &dyn Device {
        self.device
    }

    pub fn frame(&self) -> FrameContext {
        self.frame
    }

    pub fn config(&self) -> &EffectConfiguration {
        self.config
    }

    /// Record a kernel dispatch writing `output`
    pub fn dispatch<P: Pod>(
        &mut self,
        kernel: &str,
        inputs: &[&Texture],
        output: &Texture,
        params: &P,
    ) -> Result<(), StageError> {
        let pipeline = self
            .kernels
            .get(self.device, kernel)
            .map_err(|e| StageError::gpu(self.stage, e))?;
        self.commands
            .compute_encoder()
            .and_then(|mut encoder| encoder.dispatch(&pipeline, inputs, output, params))
            .map_err(|e| StageError::gpu(self.stage, e))
    }

    /// Record a copy of `source` into `destination`
    pub fn blit(&mut self, source: &Texture, destination: &Texture) -> Result<(), StageError> {
        self.commands
            .blit_encoder()
            .and_then(|mut encoder| encoder.copy(source, destination))
            .map_err(|e| StageError::gpu(self.stage, e))
    }

    /// Record a fill of every pixel of `destination` with `value`
    pub fn fill(&mut self, destination: &Texture, value: [f32; 4]) -> Result<(), StageError> {
        self.commands
            .blit_encoder()
            .and_then(|mut encoder| encoder.fill(destination, value))
            .map_err(|e| StageError::gpu(self.stage, e))
    }

    /// Allocate a scratch buffer owned by the calling stage
    pub fn make_texture(&self, geometry: Geometry, label: &str) -> Result<Texture, StageError> {
        self.device
            .make_texture(geometry, &format!("{}.{}", self.stage, label))
            .map_err(|e| StageError::gpu(self.stage, e))
    }

    /// Allocate `count` scratch buffers labelled `label[i]`
    pub fn make_textures(
        &self,
        geometry: Geometry,
        label: &str,
        count: usize,
    ) -> Result<Vec<Texture>, StageError> {
        (0..count)
            .map(|i| self.make_texture(geometry, &format!("{}[{}]", label, i)))
            .collect()
    }
}

/// Deterministic random source owned by one stage
///
/// Seeded from the pipeline seed and the stage's position in the chain, and
/// advanced once per run, so identical inputs and seeds give identical output.
#[derive(Debug, Clone)]
pub struct StageRng {
    rng: SmallRng,
}

impl StageRng {
    pub fn new(seed: u64, stage_index: usize) -> Self {
        let mixed = seed ^ (stage_index as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            rng: SmallRng::seed_from_u64(mixed),
        }
    }

    /// Seed for this run's kernels
    pub fn next_seed(&mut self) -> u32 {
        self.rng.gen()
    }

    /// Uniform value in `[0, 1)`
    pub fn next_unit(&mut self) -> f32 {
        self.rng.gen()
    }
}
