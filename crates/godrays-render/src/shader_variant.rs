//! Compiled light-shaft accumulation program and its parameter block.
//!
//! The sample count is baked into the WGSL source as a constant, so changing
//! it requires a new shader module and pipeline. Every other parameter lives
//! in the [`GodRaySettings`] uniform block and is updated in place.
//!
//! ```text
//!  Uninitialized --prepare--> Ready --sample count change--> Dirty
//!                               ^                               |
//!                               +------------prepare------------+
//! ```

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use godrays_lighting::LightShadingData;

use crate::error::GodRaysError;
use crate::gpu::with_error_scope;
use crate::pass::{ADDITIVE_BLEND, FULLSCREEN_VERTEX_SOURCE, create_fullscreen_pipeline};
use crate::shader::{ShaderDefines, ShaderLibrary};

/// Library name of the accumulation shader.
pub const ACCUMULATE_SHADER_NAME: &str = "godrays-accumulate";

/// Name of the baked sample-count constant.
pub const NUM_SAMPLES_DEFINE: &str = "NUM_SAMPLES";

/// Binding slot of the filtered source color.
pub const SRC_COLOR_BINDING: u32 = 0;
/// Binding slot of the source depth.
pub const SRC_DEPTH_BINDING: u32 = 1;
/// Binding slot of the linear sampler.
pub const SAMPLER_BINDING: u32 = 2;
/// Binding slot of the settings block.
pub const SETTINGS_BINDING: u32 = 3;
/// Reserved slot for a visibility input. Not bound by the current kernel.
pub const SRC_VISIBILITY_BINDING: u32 = 4;

/// Lifecycle state of the compiled variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantState {
    /// Nothing compiled yet.
    Uninitialized,
    /// Compiled program matches the requested sample count.
    Ready,
    /// The sample count changed since the last compile.
    Dirty,
}

/// State machine deciding when the accumulation program is recompiled.
#[derive(Debug, Clone)]
pub struct VariantLifecycle {
    state: VariantState,
    sample_count: u32,
    compiled: Option<u32>,
    rebuilds: u32,
}

impl VariantLifecycle {
    pub fn new(sample_count: u32) -> Self {
        Self {
            state: VariantState::Uninitialized,
            sample_count,
            compiled: None,
            rebuilds: 0,
        }
    }

    pub fn state(&self) -> VariantState {
        self.state
    }

    /// Sample count the next (or current) compile bakes in.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Number of recompiles after the initial compile.
    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds
    }

    /// Request a new sample count. Returns whether it differs from the current one.
    ///
    /// This is the only transition into [`VariantState::Dirty`]. Requesting
    /// the count that is already compiled returns a dirty variant to `Ready`.
    pub fn request_sample_count(&mut self, sample_count: u32) -> bool {
        if sample_count == self.sample_count {
            return false;
        }
        self.sample_count = sample_count;
        if self.state != VariantState::Uninitialized {
            self.state = if self.compiled == Some(sample_count) {
                VariantState::Ready
            } else {
                VariantState::Dirty
            };
        }
        true
    }

    pub fn needs_compile(&self) -> bool {
        self.state != VariantState::Ready
    }

    /// Record a successful compile.
    pub fn mark_compiled(&mut self) {
        if self.state == VariantState::Dirty {
            self.rebuilds += 1;
        }
        self.compiled = Some(self.sample_count);
        self.state = VariantState::Ready;
    }
}

/// GPU parameter block of the accumulation kernel, 128 bytes.
///
/// Mirrors the WGSL struct:
/// ```wgsl
/// struct GodRaySettings {
///     density: f32,
///     decay: f32,
///     weight: f32,
///     exposure: f32,
///     light_index: u32,
///     reverse_z: u32,
///     _pad0: u32,
///     _pad1: u32,
///     light: LightData,
///     camera_matrix: mat4x4<f32>,
/// };
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GodRaySettings {
    pub density: f32,
    pub decay: f32,
    pub weight: f32,
    pub exposure: f32,
    pub light_index: u32,
    pub reverse_z: u32,
    pub _pad: [u32; 2],
    pub light: LightShadingData,
    pub camera_matrix: [[f32; 4]; 4],
}

impl Default for GodRaySettings {
    fn default() -> Self {
        Self {
            density: 0.5,
            decay: 0.95,
            weight: 0.4,
            exposure: 1.0,
            light_index: 0,
            reverse_z: 1,
            _pad: [0; 2],
            light: LightShadingData::default(),
            camera_matrix: glam::Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}

/// Binding slots the compiled variant reads its inputs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingLocations {
    pub src_color: u32,
    pub src_depth: u32,
    pub sampler: u32,
    pub settings: u32,
    pub src_visibility: Option<u32>,
}

impl BindingLocations {
    fn resolve() -> Self {
        Self {
            src_color: SRC_COLOR_BINDING,
            src_depth: SRC_DEPTH_BINDING,
            sampler: SAMPLER_BINDING,
            settings: SETTINGS_BINDING,
            src_visibility: None,
        }
    }
}

/// Radial accumulation kernel. `NUM_SAMPLES` is prepended as a constant.
pub const ACCUMULATE_FRAGMENT_SOURCE: &str = r#"
struct LightData {
    anchor: vec4<f32>,
    color_intensity: vec4<f32>,
};

struct GodRaySettings {
    density: f32,
    decay: f32,
    weight: f32,
    exposure: f32,
    light_index: u32,
    reverse_z: u32,
    _pad0: u32,
    _pad1: u32,
    light: LightData,
    camera_matrix: mat4x4<f32>,
};

@group(0) @binding(0) var src_color: texture_2d<f32>;
@group(0) @binding(1) var src_depth: texture_2d<f32>;
@group(0) @binding(2) var src_sampler: sampler;
@group(0) @binding(3) var<uniform> settings: GodRaySettings;

const DEPTH_BIAS: f32 = 1e-4;

fn occluded(uv: vec2<f32>, light_depth: f32) -> bool {
    let size = vec2<f32>(textureDimensions(src_depth));
    let coord = vec2<i32>(clamp(uv * size, vec2<f32>(0.0), size - vec2<f32>(1.0)));
    let scene_depth = textureLoad(src_depth, coord, 0).x;
    if (settings.reverse_z != 0u) {
        return scene_depth > light_depth + DEPTH_BIAS;
    }
    return scene_depth < light_depth - DEPTH_BIAS;
}

@fragment
fn fs_god_rays(in: VertexOutput) -> @location(0) vec4<f32> {
    let clip = settings.camera_matrix * settings.light.anchor;
    if (NUM_SAMPLES == 0u || clip.w <= 0.0) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }

    let ndc = clip.xyz / clip.w;
    let light_uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    var light_depth = ndc.z;
    if (settings.light.anchor.w == 0.0) {
        // Light at infinity sits on the far plane.
        light_depth = select(1.0, 0.0, settings.reverse_z != 0u);
    }

    let delta = (in.uv - light_uv) * settings.density / max(f32(NUM_SAMPLES), 1.0);
    var uv = in.uv;
    var attenuation = 1.0;
    var illumination = vec3<f32>(0.0);
    for (var i = 0u; i < NUM_SAMPLES; i = i + 1u) {
        uv = uv - delta;
        if (!occluded(uv, light_depth)) {
            let texel = textureSampleLevel(src_color, src_sampler, uv, 0.0).rgb;
            illumination = illumination + texel * attenuation * settings.weight;
        }
        attenuation = attenuation * settings.decay;
    }

    let tint = settings.light.color_intensity.rgb;
    let scale = settings.exposure * settings.density;
    return vec4<f32>(illumination * scale * tint, 1.0);
}
"#;

/// A compiled accumulation program.
pub struct ShaderVariant {
    pub module: Arc<wgpu::ShaderModule>,
    pub pipeline: wgpu::RenderPipeline,
    pub bindings: BindingLocations,
    pub sample_count: u32,
}

/// Owns the compiled variant, its layouts and the settings uniform block.
pub struct ShaderVariantManager {
    lifecycle: VariantLifecycle,
    output_format: wgpu::TextureFormat,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    settings: GodRaySettings,
    settings_dirty: bool,
    settings_buffer: wgpu::Buffer,
    variant: Option<ShaderVariant>,
}

impl ShaderVariantManager {
    /// Create the manager in the `Uninitialized` state.
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Result<Self, GodRaysError> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("godrays-accumulate-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: SRC_COLOR_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SRC_DEPTH_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    // Depth bound as unfilterable float so GLSL backends can load it.
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SETTINGS_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<GodRaySettings>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("godrays-accumulate-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("godrays-accumulate-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let settings_buffer = with_error_scope(device, "settings block", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("godrays-settings"),
                size: std::mem::size_of::<GodRaySettings>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        Ok(Self {
            lifecycle: VariantLifecycle::new(sample_count),
            output_format,
            bind_group_layout,
            pipeline_layout,
            sampler,
            settings: GodRaySettings::default(),
            settings_dirty: true,
            settings_buffer,
            variant: None,
        })
    }

    pub fn state(&self) -> VariantState {
        self.lifecycle.state()
    }

    pub fn sample_count(&self) -> u32 {
        self.lifecycle.sample_count()
    }

    pub fn rebuild_count(&self) -> u32 {
        self.lifecycle.rebuild_count()
    }

    /// Current CPU copy of the settings block.
    pub fn settings(&self) -> &GodRaySettings {
        &self.settings
    }

    /// The compiled variant, once `prepare` has succeeded.
    pub fn variant(&self) -> Option<&ShaderVariant> {
        self.variant.as_ref()
    }

    /// Request a new baked sample count; marks the variant dirty when it differs.
    pub fn request_sample_count(&mut self, sample_count: u32) -> bool {
        let changed = self.lifecycle.request_sample_count(sample_count);
        if changed {
            log::debug!("Sample count changed to {sample_count}, variant marked dirty");
        }
        changed
    }

    fn update_settings(&mut self, update: impl FnOnce(&mut GodRaySettings)) {
        let before = self.settings;
        update(&mut self.settings);
        if self.settings != before {
            self.settings_dirty = true;
        }
    }

    /// Update the scalar medium parameters.
    pub fn set_scalars(&mut self, density: f32, decay: f32, weight: f32, exposure: f32) {
        self.update_settings(|s| {
            s.density = density;
            s.decay = decay;
            s.weight = weight;
            s.exposure = exposure;
        });
    }

    /// Update the light the shafts radiate from.
    pub fn set_light(&mut self, index: u32, light: LightShadingData) {
        self.update_settings(|s| {
            s.light_index = index;
            s.light = light;
        });
    }

    /// Update the camera matrix and depth convention.
    pub fn set_camera(&mut self, view_projection: glam::Mat4, reverse_z: bool) {
        self.update_settings(|s| {
            s.camera_matrix = view_projection.to_cols_array_2d();
            s.reverse_z = u32::from(reverse_z);
        });
    }

    /// Compile the variant if it is not `Ready`, then upload the settings
    /// block if it changed. Returns whether a compile happened.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        library: &mut ShaderLibrary,
    ) -> Result<bool, GodRaysError> {
        let compiled = if self.lifecycle.needs_compile() {
            self.compile(device, library)?;
            true
        } else {
            false
        };

        if self.settings_dirty {
            queue.write_buffer(&self.settings_buffer, 0, bytemuck::bytes_of(&self.settings));
            self.settings_dirty = false;
        }
        Ok(compiled)
    }

    fn compile(
        &mut self,
        device: &wgpu::Device,
        library: &mut ShaderLibrary,
    ) -> Result<(), GodRaysError> {
        let sample_count = self.lifecycle.sample_count();
        let defines = ShaderDefines::new().with_u32(NUM_SAMPLES_DEFINE, sample_count);
        let body = format!("{FULLSCREEN_VERTEX_SOURCE}{ACCUMULATE_FRAGMENT_SOURCE}");

        // The previous variant is unusable once the sample count changed.
        self.variant = None;
        let module =
            library.load_with_defines(device, ACCUMULATE_SHADER_NAME, &body, &defines)?;
        let pipeline = with_error_scope(device, "light-shaft pipeline", || {
            create_fullscreen_pipeline(
                device,
                &module,
                &self.pipeline_layout,
                "fs_god_rays",
                self.output_format,
                Some(ADDITIVE_BLEND),
                "godrays-accumulate",
            )
        })?;

        log::info!(
            "Compiled light-shaft variant with {sample_count} samples for {:?}",
            self.output_format
        );
        self.variant = Some(ShaderVariant {
            module,
            pipeline,
            bindings: BindingLocations::resolve(),
            sample_count,
        });
        self.lifecycle.mark_compiled();
        Ok(())
    }

    /// Bind the filtered color and source depth for one draw.
    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) -> Result<wgpu::BindGroup, GodRaysError> {
        let variant = self.variant.as_ref().ok_or(GodRaysError::ResourceAllocation {
            what: "light-shaft variant",
            message: "variant used before it was compiled".to_string(),
        })?;
        let bindings = variant.bindings;
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("godrays-accumulate-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings.src_color,
                    resource: wgpu::BindingResource::TextureView(color_view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.src_depth,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.sampler,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.settings,
                    resource: self.settings_buffer.as_entire_binding(),
                },
            ],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::create_test_device_queue;

    #[test]
    fn test_settings_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<GodRaySettings>(), 128);
        assert_eq!(std::mem::offset_of!(GodRaySettings, light_index), 16);
        assert_eq!(std::mem::offset_of!(GodRaySettings, light), 32);
        assert_eq!(std::mem::offset_of!(GodRaySettings, camera_matrix), 64);
    }

    #[test]
    fn test_lifecycle_starts_uninitialized() {
        let lifecycle = VariantLifecycle::new(64);
        assert_eq!(lifecycle.state(), VariantState::Uninitialized);
        assert!(lifecycle.needs_compile());
    }

    #[test]
    fn test_first_compile_is_not_a_rebuild() {
        let mut lifecycle = VariantLifecycle::new(64);
        lifecycle.mark_compiled();
        assert_eq!(lifecycle.state(), VariantState::Ready);
        assert_eq!(lifecycle.rebuild_count(), 0);
    }

    #[test]
    fn test_sample_count_change_dirties_ready_variant() {
        let mut lifecycle = VariantLifecycle::new(64);
        lifecycle.mark_compiled();
        assert!(lifecycle.request_sample_count(128));
        assert_eq!(lifecycle.state(), VariantState::Dirty);
        lifecycle.mark_compiled();
        assert_eq!(lifecycle.state(), VariantState::Ready);
        assert_eq!(lifecycle.sample_count(), 128);
        assert_eq!(lifecycle.rebuild_count(), 1);
    }

    #[test]
    fn test_same_sample_count_is_noop() {
        let mut lifecycle = VariantLifecycle::new(64);
        lifecycle.mark_compiled();
        assert!(!lifecycle.request_sample_count(64));
        assert_eq!(lifecycle.state(), VariantState::Ready);
    }

    #[test]
    fn test_reverting_to_compiled_count_skips_rebuild() {
        let mut lifecycle = VariantLifecycle::new(64);
        lifecycle.mark_compiled();
        assert!(lifecycle.request_sample_count(128));
        assert_eq!(lifecycle.state(), VariantState::Dirty);
        assert!(lifecycle.request_sample_count(64));
        assert_eq!(lifecycle.state(), VariantState::Ready);
        assert!(!lifecycle.needs_compile());
        assert_eq!(lifecycle.rebuild_count(), 0);
    }

    #[test]
    fn test_change_before_first_compile_stays_uninitialized() {
        let mut lifecycle = VariantLifecycle::new(64);
        lifecycle.request_sample_count(32);
        assert_eq!(lifecycle.state(), VariantState::Uninitialized);
        lifecycle.mark_compiled();
        assert_eq!(lifecycle.rebuild_count(), 0);
        assert_eq!(lifecycle.sample_count(), 32);
    }

    #[test]
    fn test_binding_locations_reserve_visibility() {
        let bindings = BindingLocations::resolve();
        assert_eq!(bindings.src_visibility, None);
        let slots = [
            bindings.src_color,
            bindings.src_depth,
            bindings.sampler,
            bindings.settings,
        ];
        assert!(!slots.contains(&SRC_VISIBILITY_BINDING));
    }

    #[test]
    fn test_prepare_compiles_once_then_reuses() {
        let Some((device, queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let mut manager =
            ShaderVariantManager::new(&device, wgpu::TextureFormat::Rgba16Float, 64)
                .expect("manager");
        assert_eq!(manager.state(), VariantState::Uninitialized);

        assert!(manager.prepare(&device, &queue, &mut library).expect("compile"));
        assert_eq!(manager.state(), VariantState::Ready);

        manager.set_scalars(0.8, 0.9, 0.5, 2.0);
        assert!(!manager.prepare(&device, &queue, &mut library).expect("reuse"));
        assert_eq!(manager.settings().exposure, 2.0);
        assert_eq!(manager.rebuild_count(), 0);
    }

    #[test]
    fn test_prepare_rebuilds_after_sample_count_change() {
        let Some((device, queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let mut manager =
            ShaderVariantManager::new(&device, wgpu::TextureFormat::Rgba16Float, 64)
                .expect("manager");
        manager.prepare(&device, &queue, &mut library).expect("compile");

        manager.request_sample_count(128);
        assert_eq!(manager.state(), VariantState::Dirty);
        assert!(manager.prepare(&device, &queue, &mut library).expect("rebuild"));
        assert_eq!(manager.variant().map(|v| v.sample_count), Some(128));
        assert_eq!(manager.rebuild_count(), 1);
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_zero_samples_compiles() {
        let Some((device, queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let mut manager =
            ShaderVariantManager::new(&device, wgpu::TextureFormat::Rgba8Unorm, 0)
                .expect("manager");
        assert!(manager.prepare(&device, &queue, &mut library).is_ok());
    }
}
