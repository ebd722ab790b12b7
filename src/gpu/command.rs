use std::sync::Arc;

use bytemuck::Pod;
use image::Rgba32FImage;

use crate::error::GpuError;
use crate::frame::Frame;
use crate::gpu::texture::Texture;
use crate::kernels::KernelFn;

/// A compiled kernel program ready for dispatch
#[derive(Clone)]
pub struct ComputePipeline {
    name: String,
    entry: KernelFn,
    inputs: usize,
}

impl ComputePipeline {
    pub(crate) fn new(name: &str, entry: KernelFn, inputs: usize) -> Self {
        Self {
            name: name.to_string(),
            entry,
            inputs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of input textures the kernel binds
    pub fn input_count(&self) -> usize {
        self.inputs
    }

    pub(crate) fn entry(&self) -> KernelFn {
        self.entry
    }
}

impl std::fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipeline")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Raw bytes of a kernel's parameter block
#[derive(Debug, Clone, Default)]
pub struct Uniforms {
    bytes: Vec<u8>,
}

impl Uniforms {
    pub fn from_pod<P: Pod>(params: &P) -> Self {
        Self {
            bytes: bytemuck::bytes_of(params).to_vec(),
        }
    }

    /// Decode the block as the kernel's parameter type
    pub fn read<P: Pod>(&self, kernel: &str) -> Result<P, GpuError> {
        bytemuck::try_pod_read_unaligned(&self.bytes).map_err(|e| GpuError::InvalidBinding {
            kernel: kernel.to_string(),
            reason: format!("parameter block: {:?}", e),
        })
    }
}

/// One unit of recorded device work
#[derive(Debug)]
pub enum Command {
    Upload {
        source: Arc<Rgba32FImage>,
        destination: Texture,
    },
    Blit {
        source: Texture,
        destination: Texture,
    },
    Fill {
        destination: Texture,
        value: [f32; 4],
    },
    Dispatch {
        pipeline: ComputePipeline,
        inputs: Vec<Texture>,
        output: Texture,
        uniforms: Uniforms,
    },
}

/// An ordered batch of device work, submitted as one unit
#[derive(Debug)]
pub struct CommandBuffer {
    label: String,
    commands: Vec<Command>,
    committed: bool,
}

impl CommandBuffer {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: Vec::new(),
            committed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn compute_encoder(&mut self) -> Result<ComputeEncoder<'_>, GpuError> {
        self.ensure_open()?;
        Ok(ComputeEncoder { buffer: self })
    }

    pub fn blit_encoder(&mut self) -> Result<BlitEncoder<'_>, GpuError> {
        self.ensure_open()?;
        Ok(BlitEncoder { buffer: self })
    }

    /// Discard everything recorded after the first `len` commands
    pub fn truncate(&mut self, len: usize) {
        self.commands.truncate(len);
    }

    /// Hand the recorded work to a device; the buffer cannot be reused afterwards
    pub(crate) fn take_for_commit(&mut self) -> Result<Vec<Command>, GpuError> {
        self.ensure_open()?;
        self.committed = true;
        Ok(std::mem::take(&mut self.commands))
    }

    fn ensure_open(&self) -> Result<(), GpuError> {
        if self.committed {
            return Err(GpuError::EncoderUnavailable {
                reason: format!("command buffer '{}' already committed", self.label),
            });
        }
        Ok(())
    }
}

/// Records kernel dispatches into a command buffer
pub struct ComputeEncoder<'a> {
    buffer: &'a mut CommandBuffer,
}

impl ComputeEncoder<'_> {
    /// Run `pipeline` over every pixel of `output`
    ///
    /// All bound textures must share the output's geometry.
    pub fn dispatch<P: Pod>(
        &mut self,
        pipeline: &ComputePipeline,
        inputs: &[&Texture],
        output: &Texture,
        params: &P,
    ) -> Result<(), GpuError> {
        if inputs.len() != pipeline.input_count() {
            return Err(GpuError::InvalidBinding {
                kernel: pipeline.name().to_string(),
                reason: format!(
                    "expected {} inputs, got {}",
                    pipeline.input_count(),
                    inputs.len()
                ),
            });
        }
        if let Some(mismatched) = inputs
            .iter()
            .find(|texture| texture.geometry() != output.geometry())
        {
            return Err(GpuError::InvalidBinding {
                kernel: pipeline.name().to_string(),
                reason: format!(
                    "input '{}' is {:?}, output '{}' is {:?}",
                    mismatched.label(),
                    mismatched.geometry().dimensions(),
                    output.label(),
                    output.geometry().dimensions()
                ),
            });
        }

        self.buffer.commands.push(Command::Dispatch {
            pipeline: pipeline.clone(),
            inputs: inputs.iter().map(|texture| (*texture).clone()).collect(),
            output: output.clone(),
            uniforms: Uniforms::from_pod(params),
        });
        Ok(())
    }
}

/// Records copies, fills and host uploads into a command buffer
pub struct BlitEncoder<'a> {
    buffer: &'a mut CommandBuffer,
}

impl BlitEncoder<'_> {
    pub fn copy(&mut self, source: &Texture, destination: &Texture) -> Result<(), GpuError> {
        if source.geometry() != destination.geometry() {
            return Err(GpuError::GeometryMismatch {
                expected: destination.geometry().dimensions(),
                actual: source.geometry().dimensions(),
            });
        }
        self.buffer.commands.push(Command::Blit {
            source: source.clone(),
            destination: destination.clone(),
        });
        Ok(())
    }

    pub fn fill(&mut self, destination: &Texture, value: [f32; 4]) -> Result<(), GpuError> {
        self.buffer.commands.push(Command::Fill {
            destination: destination.clone(),
            value,
        });
        Ok(())
    }

    /// Copy a host frame into a device buffer of the same size
    pub fn upload(&mut self, frame: &Frame, destination: &Texture) -> Result<(), GpuError> {
        let size = (frame.width(), frame.height());
        if size != destination.geometry().dimensions() {
            return Err(GpuError::GeometryMismatch {
                expected: destination.geometry().dimensions(),
                actual: size,
            });
        }
        self.buffer.commands.push(Command::Upload {
            source: Arc::new(frame.as_image().clone()),
            destination: destination.clone(),
        });
        Ok(())
    }
}
