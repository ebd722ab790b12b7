use crate::effects::{EffectConfiguration, StageContext};
use crate::error::StageError;
use crate::gpu::Texture;

/// Uniform contract of every pipeline stage
///
/// A stage reads `input` and writes `output`, both buffers of the frame's
/// geometry. Stages own whatever persistent state they need (filter memory,
/// scratch buffers) and rebuild it themselves when the geometry changes.
pub trait Stage: Send {
    /// Returns the unique name of this stage
    fn name(&self) -> &'static str;

    /// Whether the configuration asks for this stage's effect
    ///
    /// Disabled stages are bypassed by the pipeline without being run.
    fn is_enabled(&self, config: &EffectConfiguration) -> bool;

    /// Record this stage's work for the current frame
    ///
    /// # Returns
    ///
    /// `Err` with a contained error makes the pipeline discard the work this
    /// run recorded, [`release`](Stage::release) the stage and substitute a
    /// copy of `input` for its output; any other error aborts the frame.
    fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input: &Texture,
        output: &Texture,
    ) -> Result<(), StageError>;

    /// Drop any buffers held by the stage
    ///
    /// Called when the pipeline changes geometry or is torn down.
    fn release(&mut self) {}
}
