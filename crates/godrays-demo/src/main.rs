//! Headless light-shaft demo.
//!
//! Builds a procedural scene, runs the effect for a few frames through the
//! render-graph entry point and writes the composited result as a PNG.
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p godrays-demo -- --samples 128 -o shafts.png`.

mod output;
mod synthetic;

use std::process::ExitCode;

use clap::Parser;
use godrays_config::{CliArgs, ColorFormat, Config, default_config_dir};
use godrays_render::{
    COLOR_INPUT, DEPTH_INPUT, DESTINATION_OUTPUT, EffectParameters, GodRaysError,
    LightScene, LightShaftCompositor, ParameterEdit, RenderContextError, RenderPassIo,
    controls::{LightSelector, light_selector},
    read_texture_linear, reference,
};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Context(#[from] RenderContextError),

    #[error(transparent)]
    Effect(#[from] GodRaysError),

    #[error(transparent)]
    Output(#[from] output::OutputError),
}

fn effect_parameters(config: &Config) -> Result<EffectParameters, GodRaysError> {
    let effect = &config.effect;
    let mut params = EffectParameters::new(
        effect.threshold,
        effect.medium_density,
        effect.medium_decay,
        effect.medium_weight,
        effect.exposure,
        effect.sample_count,
    )?;
    params.light_index = effect.light_index;
    Ok(params)
}

fn run(config: &Config) -> Result<(), DemoError> {
    let context = godrays_render::init_render_context_blocking()?;
    let (device, queue) = (&context.device, &context.queue);
    let (width, height) = (config.render.width, config.render.height);
    let hdr = config.render.output_format == ColorFormat::Rgba16Float;

    let scene = synthetic::build_scene(config);
    match light_selector(&scene) {
        LightSelector::Named(options) => {
            for option in options {
                info!("Light {}: {}", option.index, option.name);
            }
        }
        LightSelector::Numeric { min, max } => info!("No named lights, index {min}..={max}"),
    }

    let params = effect_parameters(config)?;
    let frame = synthetic::render_frame(&scene, params.light_index, width, height);
    let color = synthetic::upload_color(device, queue, &frame.color, config.render.color_format, "demo-color");
    let depth = synthetic::upload_depth(device, queue, &frame.depth)?;
    let destination = synthetic::upload_color(
        device,
        queue,
        &reference::Image::new(width, height),
        config.render.output_format,
        "demo-destination",
    );

    let mut effect = LightShaftCompositor::new(
        device,
        queue,
        params,
        synthetic::texture_format(config.render.output_format),
    )?;
    info!(
        "Persisted variables: {} keys, reflection {:?}",
        effect.variables().len(),
        LightShaftCompositor::reflect()
    );

    let io = RenderPassIo::new()
        .bind(COLOR_INPUT, &color)
        .bind(DEPTH_INPUT, &depth.texture)
        .bind(DESTINATION_OUTPUT, &destination);

    for frame_index in 0..config.output.frames.max(1) {
        if frame_index == 1
            && let Some(samples) = config.output.sample_count_edit
        {
            let effect_kind = effect.apply_edit(ParameterEdit::SampleCount(samples))?;
            info!("Sample count edited to {samples}: {effect_kind:?}");
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("demo-frame"),
        });
        let stats = effect.execute_graph(device, queue, &mut encoder, &io, &scene)?;
        queue.submit(std::iter::once(encoder.finish()));
        info!(
            "Frame {frame_index}: working {}x{}, compiled {}, light in front {}",
            stats.working_size.0, stats.working_size.1, stats.compiled, stats.light_in_front
        );
    }
    info!(
        "Variant {:?}, {} rebuilds, {} working-buffer allocations",
        effect.variant_state(),
        effect.rebuild_count(),
        effect.working_allocation_count()
    );

    let texels = read_texture_linear(device, queue, &destination)?;
    output::write_png(&config.output.path, width, height, &texels, hdr)?;
    info!("Wrote {}", config.output.path.display());

    if config.output.write_reference {
        let Some(light) = scene.light(effect.params().light_index as usize) else {
            warn!("Selected light is not in the scene, skipping reference image");
            return Ok(());
        };
        let shafts = reference::render_reference(
            &frame.color,
            &frame.depth,
            effect.params(),
            light.shading_data(),
            scene.active_camera(),
        );
        let composite = reference::composite(&frame.color, &shafts);
        let path = output::reference_path(&config.output.path);
        output::write_png(&path, width, height, &composite.pixels, hdr)?;
        info!("Wrote reference {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    godrays_log::init_logging(Some(&config.debug), cfg!(debug_assertions));
    info!(
        "Rendering {}x{} light shafts, {} samples",
        config.render.width, config.render.height, config.effect.sample_count
    );

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_parameters_follow_config() {
        let mut config = Config::default();
        config.effect.sample_count = 200;
        config.effect.light_index = 1;
        let params = effect_parameters(&config).expect("valid");
        assert_eq!(params.sample_count, 200);
        assert_eq!(params.light_index, 1);
    }

    #[test]
    fn test_negative_sample_count_in_config_is_rejected() {
        let mut config = Config::default();
        config.effect.sample_count = -4;
        assert!(matches!(
            effect_parameters(&config),
            Err(GodRaysError::InvalidParameter { .. })
        ));
    }
}
