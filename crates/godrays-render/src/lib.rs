//! Screen-space light shafts for wgpu: bright-pass extraction, a downsampled
//! working buffer, and radial accumulation composited into a caller-owned
//! destination.

pub mod blit;
pub mod bright_pass;
pub mod camera;
pub mod compositor;
pub mod controls;
pub mod depth;
pub mod error;
pub mod gpu;
pub mod params;
pub mod pass;
pub mod persist;
pub mod reference;
pub mod scene;
pub mod shader;
pub mod shader_variant;
pub mod working_buffer;

pub use bright_pass::{BrightPassFilter, FilterInput, FilterResult, PassFilter};
pub use camera::{Camera, Projection, ProjectedLight};
pub use compositor::{
    COLOR_INPUT, DEPTH_INPUT, DESTINATION_OUTPUT, FrameInputs, FrameStats, LightShaftCompositor,
    PassReflection, RenderPassIo,
};
pub use controls::{CONTROLS, ControlId, ControlRange, ControlSpec, LightSelector, light_selector};
pub use depth::DepthBuffer;
pub use error::{GodRaysError, Precondition};
pub use gpu::{RenderContext, RenderContextError, init_render_context_blocking};
pub use params::{EditEffect, EffectParameters, ParameterEdit, ParameterStore};
pub use pass::read_texture_linear;
pub use persist::{PassValue, PassVariables, PersistError};
pub use scene::{BasicScene, LightScene};
pub use shader::{ShaderError, ShaderLibrary};
pub use shader_variant::{GodRaySettings, ShaderVariantManager, VariantState};
pub use working_buffer::{ResourceCache, WorkingBuffer};
