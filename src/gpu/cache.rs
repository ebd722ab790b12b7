use std::collections::HashMap;

use tracing::debug;

use crate::error::GpuError;
use crate::gpu::command::ComputePipeline;
use crate::gpu::device::Device;

/// Memoizes compiled kernel programs by name
///
/// Compilation happens at most once per name; [`warm`](Self::warm) front-loads
/// it so the first frame does not pay for it.
#[derive(Debug, Default)]
pub struct KernelProgramCache {
    programs: HashMap<String, ComputePipeline>,
}

impl KernelProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every named kernel up front
    pub fn warm(&mut self, device: &dyn Device, names: &[&str]) -> Result<usize, GpuError> {
        for name in names {
            self.get(device, name)?;
        }
        debug!(programs = self.programs.len(), "Kernel program cache warmed");
        Ok(self.programs.len())
    }

    /// Compiled program for `name`, compiling it on first use
    pub fn get(&mut self, device: &dyn Device, name: &str) -> Result<ComputePipeline, GpuError> {
        if let Some(program) = self.programs.get(name) {
            return Ok(program.clone());
        }
        let program = device.make_pipeline(name)?;
        self.programs.insert(name.to_string(), program.clone());
        Ok(program)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
