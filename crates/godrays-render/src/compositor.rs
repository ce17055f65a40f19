//! Per-frame orchestration of the light-shaft effect.
//!
//! Each frame: validate the inputs, resolve the light, refresh the compiled
//! variant and its settings block, downsample the source into the working
//! buffer, run the bright pass, then draw the accumulation additively into
//! the caller's destination. Everything is recorded into the caller's
//! encoder; nothing is submitted here.

use rustc_hash::FxHashMap;

use crate::blit::Blitter;
use crate::bright_pass::{BrightPassFilter, FilterInput, PassFilter};
use crate::error::{GodRaysError, Precondition};
use crate::params::{EditEffect, EffectParameters, ParameterEdit, ParameterStore};
use crate::pass::{is_blendable_target, is_filterable_color, run_fullscreen_pass};
use crate::persist::{self, PassVariables};
use crate::scene::{LightScene, resolve_light};
use crate::shader::ShaderLibrary;
use crate::shader_variant::{ShaderVariantManager, VariantState};
use crate::working_buffer::ResourceCache;

/// Binding name of the source color input.
pub const COLOR_INPUT: &str = "color";
/// Binding name of the source depth input.
pub const DEPTH_INPUT: &str = "depth";
/// Binding name of the destination output.
pub const DESTINATION_OUTPUT: &str = "dst";

/// Named inputs and outputs the pass exposes to a render graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReflection {
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
}

/// Textures bound to the pass by name for one frame.
#[derive(Default)]
pub struct RenderPassIo<'a> {
    textures: FxHashMap<String, &'a wgpu::Texture>,
}

impl<'a> RenderPassIo<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, texture: &'a wgpu::Texture) -> Self {
        self.textures.insert(name.to_string(), texture);
        self
    }

    pub fn get(&self, name: &str) -> Result<&'a wgpu::Texture, GodRaysError> {
        self.textures
            .get(name)
            .copied()
            .ok_or_else(|| GodRaysError::MissingBinding(name.to_string()))
    }
}

/// The three textures one frame reads and writes.
#[derive(Clone, Copy)]
pub struct FrameInputs<'a> {
    pub color: &'a wgpu::Texture,
    pub depth: &'a wgpu::Texture,
    pub destination: &'a wgpu::Texture,
}

/// Size and format of a texture, as far as validation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl From<&wgpu::Texture> for TextureInfo {
    fn from(texture: &wgpu::Texture) -> Self {
        Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
        }
    }
}

/// Check the frame inputs against each other and the effect's output format.
pub fn validate_frame(
    output_format: wgpu::TextureFormat,
    color: TextureInfo,
    depth: TextureInfo,
    destination: TextureInfo,
) -> Result<(), Precondition> {
    if color.width == 0 || color.height == 0 {
        return Err(Precondition::EmptySource {
            width: color.width,
            height: color.height,
        });
    }
    if (destination.width, destination.height) != (color.width, color.height) {
        return Err(Precondition::DimensionMismatch {
            src_width: color.width,
            src_height: color.height,
            dst_width: destination.width,
            dst_height: destination.height,
        });
    }
    if destination.format != output_format {
        return Err(Precondition::OutputFormatMismatch {
            expected: output_format,
            actual: destination.format,
        });
    }
    if (depth.width, depth.height) != (color.width, color.height) {
        return Err(Precondition::DepthSizeMismatch {
            src_width: color.width,
            src_height: color.height,
            depth_width: depth.width,
            depth_height: depth.height,
        });
    }
    if !is_filterable_color(color.format) {
        return Err(Precondition::UnsupportedFormat {
            input: COLOR_INPUT,
            format: color.format,
        });
    }
    if !depth.format.has_depth_aspect() {
        return Err(Precondition::UnsupportedFormat {
            input: DEPTH_INPUT,
            format: depth.format,
        });
    }
    Ok(())
}

/// What a successful frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// The accumulation program was (re)compiled this frame.
    pub compiled: bool,
    /// Working buffer size used this frame.
    pub working_size: (u32, u32),
    /// The light anchor projected in front of the camera.
    pub light_in_front: bool,
}

/// The light-shaft effect instance.
pub struct LightShaftCompositor {
    store: ParameterStore,
    output_format: wgpu::TextureFormat,
    resources: ResourceCache,
    blitter: Blitter,
    filter: Box<dyn PassFilter>,
    variants: ShaderVariantManager,
    library: ShaderLibrary,
}

impl LightShaftCompositor {
    /// Build the effect for destinations of `output_format` and compile its
    /// initial variant.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: EffectParameters,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, GodRaysError> {
        params.validate()?;
        if !is_blendable_target(output_format) {
            return Err(Precondition::UnsupportedFormat {
                input: DESTINATION_OUTPUT,
                format: output_format,
            }
            .into());
        }

        let mut variants = ShaderVariantManager::new(device, output_format, params.samples())?;
        variants.set_scalars(
            params.medium_density,
            params.medium_decay,
            params.medium_weight,
            params.exposure,
        );
        let mut library = ShaderLibrary::new();
        variants.prepare(device, queue, &mut library)?;

        log::info!(
            "Light-shaft effect ready: {} samples, output {:?}",
            params.samples(),
            output_format
        );

        Ok(Self {
            store: ParameterStore::new(params),
            output_format,
            resources: ResourceCache::new(device),
            blitter: Blitter::new(device),
            filter: Box::new(BrightPassFilter::new(device, params.threshold)),
            variants,
            library,
        })
    }

    /// Replace the bright-pass stage. The new filter takes the current threshold.
    pub fn with_filter(mut self, mut filter: Box<dyn PassFilter>) -> Self {
        filter.set_threshold(self.store.params().threshold);
        self.filter = filter;
        self
    }

    /// Build the effect from persisted variables.
    pub fn from_variables(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vars: &PassVariables,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, GodRaysError> {
        let params = persist::deserialize(vars)?;
        Self::new(device, queue, params, output_format)
    }

    /// Persisted form of the current parameters.
    pub fn variables(&self) -> PassVariables {
        persist::serialize(self.store.params())
    }

    /// Named inputs and outputs of the pass.
    pub fn reflect() -> PassReflection {
        PassReflection {
            inputs: vec![COLOR_INPUT, DEPTH_INPUT],
            outputs: vec![DESTINATION_OUTPUT],
        }
    }

    pub fn params(&self) -> &EffectParameters {
        self.store.params()
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn variant_state(&self) -> VariantState {
        self.variants.state()
    }

    /// Number of accumulation recompiles since construction.
    pub fn rebuild_count(&self) -> u32 {
        self.variants.rebuild_count()
    }

    /// Number of working-buffer allocations since construction.
    pub fn working_allocation_count(&self) -> u32 {
        self.resources.allocation_count()
    }

    /// Apply an interactive edit and forward it to the stage it affects.
    pub fn apply_edit(&mut self, edit: ParameterEdit) -> Result<EditEffect, GodRaysError> {
        let effect = self.store.apply(edit)?;
        let params = *self.store.params();
        match effect {
            EditEffect::Unchanged => {}
            EditEffect::FilterThreshold => self.filter.set_threshold(params.threshold),
            EditEffect::ParameterBlock => self.variants.set_scalars(
                params.medium_density,
                params.medium_decay,
                params.medium_weight,
                params.exposure,
            ),
            EditEffect::ShaderRebuild => {
                if self.store.take_rebuild_request() {
                    self.variants.request_sample_count(params.samples());
                }
            }
        }
        log::debug!("Applied {edit:?}: {effect:?}");
        Ok(effect)
    }

    /// Composite light shafts into `inputs.destination`.
    ///
    /// On error nothing is drawn into the destination; the error is logged
    /// and returned.
    pub fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: FrameInputs<'_>,
        scene: &dyn LightScene,
    ) -> Result<FrameStats, GodRaysError> {
        self.record(device, queue, encoder, inputs, scene)
            .inspect_err(|e| log::warn!("Light shafts skipped: {e}"))
    }

    /// Render-graph entry point: resolve the named bindings, copy the source
    /// color into the destination, then composite on top of it.
    pub fn execute_graph(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        io: &RenderPassIo<'_>,
        scene: &dyn LightScene,
    ) -> Result<FrameStats, GodRaysError> {
        self.record_graph(device, queue, encoder, io, scene)
            .inspect_err(|e| log::warn!("Light shafts skipped: {e}"))
    }

    fn record_graph(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        io: &RenderPassIo<'_>,
        scene: &dyn LightScene,
    ) -> Result<FrameStats, GodRaysError> {
        let inputs = FrameInputs {
            color: io.get(COLOR_INPUT)?,
            depth: io.get(DEPTH_INPUT)?,
            destination: io.get(DESTINATION_OUTPUT)?,
        };
        // Fail before the copy so a rejected frame leaves the destination untouched.
        self.validate(inputs)?;
        resolve_light(scene, self.store.params().light_index)?;

        let color_view = inputs.color.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = inputs
            .destination
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.blitter.blit(
            device,
            encoder,
            &color_view,
            &dst_view,
            inputs.destination.format(),
        );
        self.record(device, queue, encoder, inputs, scene)
    }

    fn validate(&self, inputs: FrameInputs<'_>) -> Result<(), Precondition> {
        validate_frame(
            self.output_format,
            inputs.color.into(),
            inputs.depth.into(),
            inputs.destination.into(),
        )
    }

    fn record(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: FrameInputs<'_>,
        scene: &dyn LightScene,
    ) -> Result<FrameStats, GodRaysError> {
        self.validate(inputs)?;

        let params = *self.store.params();
        let light = resolve_light(scene, params.light_index)?.shading_data();
        let camera = scene.active_camera();
        let light_in_front = camera.project_anchor(light.anchor_vec4()).is_some();

        self.variants.set_scalars(
            params.medium_density,
            params.medium_decay,
            params.medium_weight,
            params.exposure,
        );
        self.variants.set_light(params.light_index, light);
        self.variants
            .set_camera(camera.view_projection_matrix(), camera.reverse_z);
        let compiled = self.variants.prepare(device, queue, &mut self.library)?;

        let color = inputs.color;
        let working = self.resources.ensure_working_buffer(
            device,
            color.width(),
            color.height(),
            color.format(),
        )?;
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        self.blitter.blit(
            device,
            encoder,
            &color_view,
            &working.view,
            working.desc.format,
        );

        let filtered = self.filter.execute(
            device,
            queue,
            encoder,
            FilterInput {
                view: &working.view,
                width: working.desc.width,
                height: working.desc.height,
                format: working.desc.format,
            },
        )?;

        let depth_view = inputs.depth.create_view(&wgpu::TextureViewDescriptor {
            label: Some("godrays-depth-view"),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        let bind_group = self
            .variants
            .create_bind_group(device, &filtered.view, &depth_view)?;
        let variant = self.variants.variant().ok_or(GodRaysError::ResourceAllocation {
            what: "light-shaft variant",
            message: "variant missing after prepare".to_string(),
        })?;

        let dst_view = inputs
            .destination
            .create_view(&wgpu::TextureViewDescriptor::default());
        run_fullscreen_pass(
            encoder,
            &variant.pipeline,
            &[&bind_group],
            &dst_view,
            wgpu::LoadOp::Load,
            "godrays-composite",
        );

        log::trace!(
            "Light shafts recorded: working {}x{}, light {}, compiled {compiled}",
            working.desc.width,
            working.desc.height,
            params.light_index
        );
        Ok(FrameStats {
            compiled,
            working_size: (working.desc.width, working.desc.height),
            light_in_front,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, format: wgpu::TextureFormat) -> TextureInfo {
        TextureInfo {
            width,
            height,
            format,
        }
    }

    const HDR: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    #[test]
    fn test_matching_inputs_validate() {
        let result = validate_frame(
            HDR,
            info(1920, 1080, HDR),
            info(1920, 1080, DEPTH),
            info(1920, 1080, HDR),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_destination_size_mismatch() {
        let result = validate_frame(
            HDR,
            info(1920, 1080, HDR),
            info(1920, 1080, DEPTH),
            info(800, 600, HDR),
        );
        assert!(matches!(
            result,
            Err(Precondition::DimensionMismatch {
                dst_width: 800,
                dst_height: 600,
                ..
            })
        ));
    }

    #[test]
    fn test_destination_format_mismatch() {
        let result = validate_frame(
            HDR,
            info(64, 64, HDR),
            info(64, 64, DEPTH),
            info(64, 64, wgpu::TextureFormat::Rgba8Unorm),
        );
        assert!(matches!(
            result,
            Err(Precondition::OutputFormatMismatch { .. })
        ));
    }

    #[test]
    fn test_depth_size_mismatch() {
        let result = validate_frame(
            HDR,
            info(64, 64, HDR),
            info(32, 32, DEPTH),
            info(64, 64, HDR),
        );
        assert!(matches!(
            result,
            Err(Precondition::DepthSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        let result = validate_frame(HDR, info(0, 64, HDR), info(0, 64, DEPTH), info(0, 64, HDR));
        assert_eq!(
            result,
            Err(Precondition::EmptySource {
                width: 0,
                height: 64
            })
        );
    }

    #[test]
    fn test_color_depth_input_rejected() {
        let result = validate_frame(
            HDR,
            info(64, 64, HDR),
            info(64, 64, wgpu::TextureFormat::R32Float),
            info(64, 64, HDR),
        );
        assert!(matches!(
            result,
            Err(Precondition::UnsupportedFormat {
                input: "depth",
                ..
            })
        ));
    }

    #[test]
    fn test_unfilterable_color_rejected() {
        let result = validate_frame(
            HDR,
            info(64, 64, wgpu::TextureFormat::Rgba32Float),
            info(64, 64, DEPTH),
            info(64, 64, HDR),
        );
        assert!(matches!(
            result,
            Err(Precondition::UnsupportedFormat {
                input: "color",
                ..
            })
        ));
    }

    #[test]
    fn test_reflection_names() {
        let reflection = LightShaftCompositor::reflect();
        assert_eq!(reflection.inputs, vec!["color", "depth"]);
        assert_eq!(reflection.outputs, vec!["dst"]);
    }
}
