use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::GpuError;
use crate::frame::Frame;
use crate::gpu::command::{Command, CommandBuffer, ComputePipeline};
use crate::gpu::texture::{Geometry, Texture};
use crate::kernels::{KernelInvocation, KernelLibrary};

/// Device/command-submission handle consumed by the pipeline
///
/// Work is recorded into a [`CommandBuffer`] and executed in recording order
/// by [`commit_and_wait`](Device::commit_and_wait), which blocks until the
/// whole batch is complete.
pub trait Device: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Allocate a device image buffer
    fn make_texture(&self, geometry: Geometry, label: &str) -> Result<Texture, GpuError>;

    /// Compile the named kernel program
    fn make_pipeline(&self, kernel: &str) -> Result<ComputePipeline, GpuError>;

    fn make_command_buffer(&self, label: &str) -> Result<CommandBuffer, GpuError>;

    /// Execute a batch and block until it completes
    fn commit_and_wait(&self, buffer: &mut CommandBuffer) -> Result<(), GpuError>;

    /// Copy a device buffer back to the host
    fn download(&self, texture: &Texture) -> Result<Frame, GpuError>;
}

/// Tracks bytes allocated against an optional device memory limit
#[derive(Debug)]
pub(crate) struct MemoryBudget {
    limit: Option<u64>,
    used: AtomicU64,
}

impl MemoryBudget {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    fn reserve(self: &Arc<Self>, bytes: u64) -> Result<Allocation, GpuError> {
        let reserved = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                match self.limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            });

        match reserved {
            Ok(_) => Ok(Allocation {
                budget: Some(Arc::clone(self)),
                bytes,
            }),
            Err(used) => Err(GpuError::OutOfMemory {
                requested: bytes,
                available: self.limit.unwrap_or(u64::MAX).saturating_sub(used),
            }),
        }
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }
}

/// Bytes held by one texture; returned to the budget on drop
#[derive(Debug)]
pub(crate) struct Allocation {
    budget: Option<Arc<MemoryBudget>>,
    bytes: u64,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let Some(budget) = &self.budget {
            budget.used.fetch_sub(self.bytes, Ordering::AcqRel);
        }
    }
}

/// Reference device that executes kernels on the host
///
/// Rows of each dispatch are processed in parallel on a dedicated rayon pool.
pub struct CpuDevice {
    name: String,
    library: KernelLibrary,
    threads: ThreadPool,
    budget: Arc<MemoryBudget>,
    next_texture_id: AtomicU64,
    pipelines_compiled: AtomicUsize,
}

impl CpuDevice {
    /// Create a device using every available core and no memory limit
    pub fn new() -> Result<Self, GpuError> {
        Self::with_config(&DeviceConfig::default())
    }

    pub fn with_config(config: &DeviceConfig) -> Result<Self, GpuError> {
        let threads = if config.threads == 0 {
            num_cpus::get()
        } else {
            config.threads
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ntsc-cpu-{}", i))
            .build()
            .map_err(|e| GpuError::DeviceUnavailable {
                reason: e.to_string(),
            })?;

        let limit = config.memory_budget_mb.map(|mb| mb * 1024 * 1024);
        info!(threads, memory_limit = ?limit, "Created CPU reference device");

        Ok(Self {
            name: format!("cpu ({} threads)", threads),
            library: KernelLibrary::new(),
            threads: pool,
            budget: Arc::new(MemoryBudget::new(limit)),
            next_texture_id: AtomicU64::new(1),
            pipelines_compiled: AtomicUsize::new(0),
        })
    }

    /// Limit device memory to `bytes`; allocations beyond it fail with `OutOfMemory`
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.budget = Arc::new(MemoryBudget::new(Some(bytes)));
        self
    }

    /// Bytes currently held by live textures
    pub fn allocated_bytes(&self) -> u64 {
        self.budget.used()
    }

    /// How many times a kernel program has been compiled
    pub fn pipelines_compiled(&self) -> usize {
        self.pipelines_compiled.load(Ordering::Relaxed)
    }

    pub fn library(&self) -> &KernelLibrary {
        &self.library
    }

    fn execute(&self, command: Command) -> Result<(), GpuError> {
        match command {
            Command::Upload {
                source,
                destination,
            } => destination.write_with(|image| {
                ensure_same_size(image, &source)?;
                image.copy_from_slice(source.as_raw());
                Ok(())
            }),
            Command::Blit {
                source,
                destination,
            } => {
                let source = source.snapshot()?;
                destination.write_with(|image| {
                    ensure_same_size(image, &source)?;
                    image.copy_from_slice(source.as_raw());
                    Ok(())
                })
            }
            Command::Fill { destination, value } => destination.write_with(|image| {
                image
                    .par_chunks_mut(4)
                    .for_each(|pixel| pixel.copy_from_slice(&value));
                Ok(())
            }),
            Command::Dispatch {
                pipeline,
                inputs,
                output,
                uniforms,
            } => {
                let inputs = inputs
                    .iter()
                    .map(Texture::snapshot)
                    .collect::<Result<Vec<_>, _>>()?;
                let invocation = KernelInvocation::new(pipeline.name(), &inputs, &uniforms);
                output.write_with(|image| (pipeline.entry())(&invocation, image))
            }
        }
    }
}

impl Device for CpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn make_texture(&self, geometry: Geometry, label: &str) -> Result<Texture, GpuError> {
        if geometry.is_empty() {
            return Err(GpuError::AllocationFailed {
                width: geometry.width,
                height: geometry.height,
                reason: "zero-sized image".to_string(),
            });
        }
        let allocation = self.budget.reserve(geometry.byte_size())?;
        let id = self.next_texture_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, label, width = geometry.width, height = geometry.height, "Allocated texture");
        Ok(Texture::new(id, label, geometry, allocation))
    }

    fn make_pipeline(&self, kernel: &str) -> Result<ComputePipeline, GpuError> {
        let program = self
            .library
            .get(kernel)
            .ok_or_else(|| GpuError::KernelNotFound {
                name: kernel.to_string(),
            })?;
        self.pipelines_compiled.fetch_add(1, Ordering::Relaxed);
        Ok(ComputePipeline::new(kernel, program.entry, program.inputs))
    }

    fn make_command_buffer(&self, label: &str) -> Result<CommandBuffer, GpuError> {
        Ok(CommandBuffer::new(label))
    }

    fn commit_and_wait(&self, buffer: &mut CommandBuffer) -> Result<(), GpuError> {
        let commands = buffer.take_for_commit()?;
        debug!(label = buffer.label(), commands = commands.len(), "Executing command buffer");
        self.threads.install(|| {
            commands
                .into_iter()
                .try_for_each(|command| self.execute(command))
        })
    }

    fn download(&self, texture: &Texture) -> Result<Frame, GpuError> {
        let image = texture.snapshot()?;
        Ok(Frame::new(image.as_ref().clone()))
    }
}

fn ensure_same_size(
    destination: &image::Rgba32FImage,
    source: &image::Rgba32FImage,
) -> Result<(), GpuError> {
    if destination.dimensions() != source.dimensions() {
        return Err(GpuError::GeometryMismatch {
            expected: destination.dimensions(),
            actual: source.dimensions(),
        });
    }
    Ok(())
}
