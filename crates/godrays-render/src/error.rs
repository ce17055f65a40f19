//! Error taxonomy of the light-shaft effect.

use crate::shader::ShaderError;

/// A frame precondition that the host violated.
///
/// Every variant skips the frame without issuing a draw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    /// Destination size differs from the source color size.
    #[error(
        "destination is {dst_width}x{dst_height} but source color is {src_width}x{src_height}"
    )]
    DimensionMismatch {
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
    },

    /// Depth input size differs from the source color size.
    #[error("depth input is {depth_width}x{depth_height} but source color is {src_width}x{src_height}")]
    DepthSizeMismatch {
        src_width: u32,
        src_height: u32,
        depth_width: u32,
        depth_height: u32,
    },

    /// Destination format differs from the format the effect was built for.
    #[error("destination format {actual:?} does not match the effect output format {expected:?}")]
    OutputFormatMismatch {
        expected: wgpu::TextureFormat,
        actual: wgpu::TextureFormat,
    },

    /// A texture has a format the stage cannot consume.
    #[error("{input} texture format {format:?} is not supported")]
    UnsupportedFormat {
        input: &'static str,
        format: wgpu::TextureFormat,
    },

    /// Source color has a zero-sized axis.
    #[error("source color has empty extent {width}x{height}")]
    EmptySource { width: u32, height: u32 },
}

/// Errors reported by the light-shaft effect.
#[derive(Debug, thiserror::Error)]
pub enum GodRaysError {
    /// The host supplied inputs the frame cannot be drawn with.
    #[error("precondition violated: {0}")]
    PreconditionViolation(#[from] Precondition),

    /// The selected light does not exist in the scene's current light list.
    #[error("light index {index} is out of range for a scene with {count} light(s)")]
    InvalidLightReference { index: u32, count: usize },

    /// GPU resource creation failed; the effect instance should be disabled.
    #[error("failed to allocate {what}: {message}")]
    ResourceAllocation { what: &'static str, message: String },

    /// Shader compilation failed.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// A named render-pass binding was not supplied by the host.
    #[error("render pass binding '{0}' is missing")]
    MissingBinding(String),

    /// A parameter value is outside its valid domain.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Persisted parameters could not be decoded.
    #[error(transparent)]
    Persist(#[from] crate::persist::PersistError),

    /// GPU readback failed.
    #[error("texture readback failed: {0}")]
    Readback(String),
}

impl GodRaysError {
    /// Whether the effect instance can keep running after this error.
    ///
    /// Resource and shader failures leave the instance without usable GPU
    /// objects; everything else only skips the current frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            GodRaysError::ResourceAllocation { .. } | GodRaysError::Shader(_)
        )
    }
}
