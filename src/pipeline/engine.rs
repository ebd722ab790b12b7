use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::{
    config::PipelineConfig,
    effects::{standard_chain, EffectConfiguration, FrameContext, Stage, StageContext},
    error::{GpuError, Result},
    frame::Frame,
    gpu::{Device, Geometry, ImageBufferPool, KernelProgramCache, Texture},
    kernels,
};

/// Whether a frame is currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rendering,
}

/// Running totals kept by a [`FramePipeline`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_rendered: u64,
    pub frames_failed: u64,
    /// Stage runs replaced by a copy of their input after a contained failure
    pub stages_bypassed: u64,
    pub reallocations: u64,
    pub last_frame_time: Duration,
}

/// Orchestrates the stage chain for one stream of frames
///
/// Each frame follows the same steps:
/// 1. Buffers - (re)allocate the pool when the frame geometry changed
/// 2. Upload - copy the incoming frame into the first pool buffer
/// 3. Encode - let every enabled stage record its work, threading the pool's
///    last buffer into the next one
/// 4. Submit - execute the whole batch and wait for it
/// 5. Read back - download the last buffer and advance the frame counter
///
/// A stage whose resources or dispatches fail is replaced by a copy of its
/// input for that frame: whatever it recorded is discarded and the stage is
/// released. An invalid configuration, failures while setting the frame up,
/// malformed filter parameters and failed submissions abort the frame.
pub struct FramePipeline {
    device: Arc<dyn Device>,
    kernels: KernelProgramCache,
    pool: ImageBufferPool,
    stages: Vec<Box<dyn Stage>>,
    frame: FrameContext,
    state: PipelineState,
    stats: PipelineStats,
}

impl FramePipeline {
    /// Create a pipeline running the standard emulation chain
    pub fn new(device: Arc<dyn Device>, config: &PipelineConfig) -> Result<Self> {
        Self::with_stages(device, config, standard_chain(config.seed))
    }

    /// Create a pipeline running a custom chain of stages
    pub fn with_stages(
        device: Arc<dyn Device>,
        config: &PipelineConfig,
        stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut kernels = KernelProgramCache::new();
        if config.warm_kernels {
            let compiled = kernels.warm(device.as_ref(), kernels::ALL)?;
            debug!(kernels = compiled, "Warmed kernel programs");
        }

        info!(
            device = device.name(),
            stages = stages.len(),
            pool_size = config.pool_size,
            "Created frame pipeline"
        );

        Ok(Self {
            device,
            kernels,
            pool: ImageBufferPool::new("frame", config.pool_size),
            stages,
            frame: FrameContext::default(),
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        })
    }

    /// Run one frame through the chain
    ///
    /// Returns `None` when the frame could not be produced; the failure is
    /// logged and the next call starts afresh.
    pub fn output_image(&mut self, input: &Frame, config: &EffectConfiguration) -> Option<Frame> {
        match self.render(input, config) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(
                    frame = self.frame.frame_number(),
                    width = input.width(),
                    height = input.height(),
                    "Frame failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Run one frame through the chain, reporting why it failed
    pub fn render(&mut self, input: &Frame, config: &EffectConfiguration) -> Result<Frame> {
        let started = Instant::now();
        self.state = PipelineState::Rendering;
        let result = self.render_frame(input, config);
        self.state = PipelineState::Idle;

        match &result {
            Ok(_) => {
                self.stats.frames_rendered += 1;
                self.stats.last_frame_time = started.elapsed();
                debug!(
                    frame = self.frame.frame_number(),
                    elapsed_ms = self.stats.last_frame_time.as_secs_f64() * 1000.0,
                    "Rendered frame"
                );
                self.frame.advance();
            }
            Err(_) => self.stats.frames_failed += 1,
        }
        result
    }

    fn render_frame(&mut self, input: &Frame, config: &EffectConfiguration) -> Result<Frame> {
        let frame_number = self.frame.frame_number();
        let geometry = Geometry::new(input.width(), input.height());
        config.validate()?;

        // ==========================================
        // STEP 1: BUFFERS
        // ==========================================
        if self.pool.ensure(self.device.as_ref(), geometry)? {
            info!(
                width = geometry.width,
                height = geometry.height,
                buffers = self.pool.capacity(),
                "Allocated frame buffers"
            );
            self.stats.reallocations += 1;
            // Per-stage state belongs to the old geometry
            for stage in &mut self.stages {
                stage.release();
            }
        }

        // ==========================================
        // STEP 2: UPLOAD
        // ==========================================
        let mut commands = self
            .device
            .make_command_buffer(&format!("frame {}", frame_number))?;
        let first = next_buffer(&mut self.pool, geometry)?;
        commands.blit_encoder()?.upload(input, &first)?;

        // ==========================================
        // STEP 3: ENCODE
        // ==========================================
        for stage in &mut self.stages {
            let name = stage.name();
            if !stage.is_enabled(config) {
                stage.release();
                continue;
            }

            let source = last_buffer(&self.pool, geometry)?;
            let target = next_buffer(&mut self.pool, geometry)?;
            let recorded = commands.len();
            let mut ctx = StageContext::new(
                name,
                self.device.as_ref(),
                &mut self.kernels,
                &mut commands,
                self.frame,
                config,
            );
            let result = stage.run(&mut ctx, &source, &target);
            drop(ctx);

            match result {
                Ok(()) => debug!(stage = name, frame = frame_number, "Encoded stage"),
                Err(e) if e.is_contained() => {
                    warn!(stage = name, frame = frame_number, "Bypassing stage: {}", e);
                    self.stats.stages_bypassed += 1;
                    // None of the stage's work runs, so its state must start over
                    commands.truncate(recorded);
                    stage.release();
                    commands.blit_encoder()?.copy(&source, &target)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // ==========================================
        // STEP 4: SUBMIT
        // ==========================================
        self.device.commit_and_wait(&mut commands)?;

        // ==========================================
        // STEP 5: READ BACK
        // ==========================================
        let output = last_buffer(&self.pool, geometry)?;
        Ok(self.device.download(&output)?)
    }

    /// Frames produced so far, modulo 2^32
    pub fn frame_number(&self) -> u32 {
        self.frame.frame_number()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn pool(&self) -> &ImageBufferPool {
        &self.pool
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    /// Drop every buffer held by the pipeline and its stages
    pub fn release(&mut self) {
        self.pool.release();
        for stage in &mut self.stages {
            stage.release();
        }
        debug!("Released pipeline buffers");
    }
}

fn next_buffer(pool: &mut ImageBufferPool, geometry: Geometry) -> std::result::Result<Texture, GpuError> {
    pool.next().ok_or_else(|| empty_pool(geometry))
}

fn last_buffer(pool: &ImageBufferPool, geometry: Geometry) -> std::result::Result<Texture, GpuError> {
    pool.last().cloned().ok_or_else(|| empty_pool(geometry))
}

fn empty_pool(geometry: Geometry) -> GpuError {
    GpuError::AllocationFailed {
        width: geometry.width,
        height: geometry.height,
        reason: "frame buffer pool is empty".to_string(),
    }
}
