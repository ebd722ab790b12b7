use std::collections::HashMap;

use crate::kernels::{self, color, displace, iir, noise, signal, KernelFn};

/// A kernel entry point and the number of inputs it binds
#[derive(Clone, Copy)]
pub struct KernelProgram {
    pub entry: KernelFn,
    pub inputs: usize,
}

impl std::fmt::Debug for KernelProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelProgram")
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// Library of available kernel programs
///
/// The library is the "compiled source module" devices build pipelines from.
/// Programs are registered by name; custom kernels can be added next to the
/// built-in ones.
pub struct KernelLibrary {
    programs: HashMap<String, KernelProgram>,
}

impl KernelLibrary {
    /// Create a library with all built-in kernels
    pub fn new() -> Self {
        let mut library = Self {
            programs: HashMap::new(),
        };
        library.register_builtin_kernels();
        library
    }

    fn register_builtin_kernels(&mut self) {
        let builtins: [(&str, KernelFn, usize); 20] = [
            (kernels::RGB_TO_YIQ, color::rgb_to_yiq, 1),
            (kernels::YIQ_TO_RGB, color::yiq_to_rgb, 1),
            (kernels::BOX_LUMA, color::box_luma, 1),
            (kernels::IIR_INITIAL_CONDITION, iir::initial_condition, 1),
            (kernels::IIR_FILTER_SAMPLE, iir::filter_sample, 2),
            (kernels::IIR_UPDATE_MEMORY, iir::update_memory, 3),
            (kernels::IIR_FINAL, iir::finalize, 2),
            (kernels::CHROMA_INTO_LUMA, signal::chroma_into_luma, 1),
            (kernels::CHROMA_FROM_LUMA, signal::chroma_from_luma, 1),
            (kernels::CHROMA_DELAY, color::chroma_delay, 1),
            (kernels::CHROMA_VERT_BLEND, color::chroma_vert_blend, 1),
            (kernels::CHROMA_PHASE_ERROR, color::chroma_phase_error, 1),
            (kernels::CHROMA_PHASE_NOISE, color::chroma_phase_noise, 1),
            (kernels::CHROMA_LOSS, color::chroma_loss, 1),
            (kernels::FBM_NOISE, noise::fbm_noise, 1),
            (kernels::SNOW, noise::snow, 1),
            (kernels::HEAD_SWITCHING, displace::head_switching, 1),
            (kernels::TRACKING_NOISE, displace::tracking_noise, 1),
            (kernels::EDGE_WAVE, displace::edge_wave, 1),
            (kernels::FIELD_COMPOSE, signal::field_compose, 2),
        ];

        for (name, entry, inputs) in builtins {
            self.register(name, entry, inputs);
        }
    }

    /// Register a custom kernel, replacing any kernel of the same name
    pub fn register(&mut self, name: &str, entry: KernelFn, inputs: usize) {
        self.programs
            .insert(name.to_string(), KernelProgram { entry, inputs });
    }

    /// Get a kernel program by name
    pub fn get(&self, name: &str) -> Option<KernelProgram> {
        self.programs.get(name).copied()
    }

    /// Get all available kernel names
    pub fn available_kernels(&self) -> Vec<String> {
        self.programs.keys().cloned().collect()
    }

    pub fn has_kernel(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl Default for KernelLibrary {
    fn default() -> Self {
        Self::new()
    }
}
