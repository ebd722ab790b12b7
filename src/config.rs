use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    effects::EffectConfiguration,
    error::{ConfigError, Result},
};

/// Main configuration for the NTSC compositor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device settings
    pub device: DeviceConfig,

    /// Frame pipeline settings
    pub pipeline: PipelineConfig,

    /// The look being emulated
    pub effect: EffectConfiguration,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            }
            .into()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.pipeline.validate()?;
        self.effect.validate()?;
        Ok(())
    }
}

/// Compute device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Worker threads for kernel execution (0 = one per core)
    pub threads: usize,

    /// Cap on texture memory, in MiB
    pub memory_budget_mb: Option<u64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            memory_budget_mb: None,
        }
    }
}

impl DeviceConfig {
    fn validate(&self) -> Result<()> {
        if self.memory_budget_mb == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "device.memory_budget_mb".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Frame pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Buffers in the rotating pool stages hand frames through
    pub pool_size: usize,

    /// Seed for every random effect; equal seeds give equal output
    pub seed: u64,

    /// Compile every kernel program when the pipeline is created
    pub warm_kernels: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            seed: 0,
            warm_kernels: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        // one buffer is read while the next is written
        if self.pool_size < 2 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.pool_size".to_string(),
                value: self.pool_size.to_string(),
            }
            .into());
        }
        // TOML integers are signed 64-bit
        if i64::try_from(self.seed).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.seed".to_string(),
                value: self.seed.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
