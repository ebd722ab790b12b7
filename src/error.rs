use thiserror::Error;

/// Main error type for the NTSC compositor library
#[derive(Error, Debug)]
pub enum NtscError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("Filter design error: {0}")]
    Filter(#[from] FilterError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Device, buffer and command submission errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("Failed to allocate {width}x{height} image buffer: {reason}")]
    AllocationFailed {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("Device memory exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("Kernel program not found: {name}")]
    KernelNotFound { name: String },

    #[error("Cannot obtain encoder: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Invalid binding for kernel {kernel}: {reason}")]
    InvalidBinding { kernel: String, reason: String },

    #[error("Command submission failed: {reason}")]
    SubmissionFailed { reason: String },

    #[error("Image geometry mismatch: expected {expected:?}, got {actual:?}")]
    GeometryMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Image buffer lock poisoned")]
    LockPoisoned,
}

/// Filter design and initial-condition errors
///
/// These indicate malformed filter parameters and are never bypassed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid filter parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    #[error("Transfer function has no non-zero denominator coefficient")]
    NoNonZeroDenominator,
}

/// Errors raised while a stage encodes its work
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("{stage}: {source}")]
    Gpu {
        stage: String,
        #[source]
        source: GpuError,
    },

    #[error("{stage}: {source}")]
    Filter {
        stage: String,
        #[source]
        source: FilterError,
    },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using NtscError
pub type Result<T> = std::result::Result<T, NtscError>;

impl NtscError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (the next frame may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            // Memory pressure and submission hiccups can clear up between frames
            Self::Gpu(GpuError::OutOfMemory { .. }) => true,
            Self::Gpu(GpuError::AllocationFailed { .. }) => true,
            Self::Gpu(GpuError::SubmissionFailed { .. }) => true,
            Self::Stage(stage) => stage.is_contained(),
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Gpu(GpuError::OutOfMemory { requested, .. }) => {
                format!(
                    "Not enough device memory for the frame buffers ({} bytes requested). Try a smaller resolution or a larger memory budget.",
                    requested
                )
            }
            Self::Filter(FilterError::InvalidParameter { name, value }) => {
                format!("Filter parameter '{}' has an unusable value: {}", name, value)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

impl StageError {
    pub fn gpu<S: Into<String>>(stage: S, source: GpuError) -> Self {
        Self::Gpu {
            stage: stage.into(),
            source,
        }
    }

    pub fn filter<S: Into<String>>(stage: S, source: FilterError) -> Self {
        Self::Filter {
            stage: stage.into(),
            source,
        }
    }

    /// Name of the stage that failed
    pub fn stage(&self) -> &str {
        match self {
            Self::Gpu { stage, .. } | Self::Filter { stage, .. } => stage,
        }
    }

    /// Resource and dispatch failures are contained at the stage boundary
    /// (the stage is bypassed); filter design failures abort the frame.
    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Gpu { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_containment() {
        let resource = StageError::gpu("snow", GpuError::LockPoisoned);
        assert!(resource.is_contained());
        assert_eq!(resource.stage(), "snow");

        let math = StageError::filter("ringing", FilterError::NoNonZeroDenominator);
        assert!(!math.is_contained());
        assert!(!NtscError::from(math).is_recoverable());
    }

    #[test]
    fn test_user_message_mentions_parameter() {
        let err = NtscError::from(FilterError::InvalidParameter {
            name: "notch.frequency".to_string(),
            value: "1.5".to_string(),
        });
        assert!(err.user_message().contains("notch.frequency"));
    }
}
