//! # Effect Stages
//!
//! The configuration surface of the emulator and the stages that read it.
//!
//! Every stage implements [`Stage`]: it reads one YIQ image and writes one,
//! recording its work through a [`StageContext`]. Stages are bypassed when
//! the configuration switches their effect off.
//!
//! [`standard_chain`] builds the stage order of a broadcast signal recorded
//! to tape and played back:
//!
//! ```text
//! RGB -> YIQ -> luma filter -> chroma lowpass -> chroma into luma
//!     -> preemphasis -> composite noise -> ringing -> snow
//!     -> head switching -> tracking noise -> chroma from luma
//!     -> luma/chroma noise -> phase error/noise -> VHS
//!     -> vertical blend -> chroma lowpass -> field compose -> RGB
//! ```

pub mod bandwidth;
pub mod chain;
pub mod chroma;
pub mod composite;
pub mod context;
pub mod convert;
pub mod field;
pub mod noise;
pub mod settings;
pub mod stage;
pub mod tape;
pub mod vhs;

pub use chain::standard_chain;
pub use context::{FrameContext, StageContext, StageRng};
pub use settings::{
    ChromaLowpass, EffectConfiguration, FilterType, HeadSwitchingSettings, InterlaceMode,
    LumaFilter, MidLine, NoiseSettings, PhaseShift, RingingSettings, TrackingNoiseSettings,
    VhsEdgeWaveSettings, VhsSettings, VhsSharpenSettings, VhsTapeSpeed,
};
pub use stage::Stage;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::StageError;
    use crate::frame::Frame;
    use crate::gpu::{CpuDevice, Device, KernelProgramCache};

    /// Runs single stages on a CPU device, one frame per call
    pub struct StageHarness {
        pub device: CpuDevice,
        kernels: KernelProgramCache,
    }

    impl StageHarness {
        pub fn new() -> Self {
            Self {
                device: CpuDevice::new().unwrap(),
                kernels: KernelProgramCache::new(),
            }
        }

        pub fn run(
            &mut self,
            stage: &mut dyn Stage,
            config: &EffectConfiguration,
            frame_number: u32,
            input: &Frame,
        ) -> Result<Frame, StageError> {
            let geometry = crate::gpu::Geometry::new(input.width(), input.height());
            let source = self.device.make_texture(geometry, "source").unwrap();
            let target = self.device.make_texture(geometry, "target").unwrap();

            let mut commands = self.device.make_command_buffer("stage").unwrap();
            commands.blit_encoder().unwrap().upload(input, &source).unwrap();
            {
                let mut ctx = StageContext::new(
                    stage.name(),
                    &self.device,
                    &mut self.kernels,
                    &mut commands,
                    FrameContext::new(frame_number),
                    config,
                );
                stage.run(&mut ctx, &source, &target)?;
            }
            self.device.commit_and_wait(&mut commands).unwrap();
            Ok(self.device.download(&target).unwrap())
        }
    }
}
