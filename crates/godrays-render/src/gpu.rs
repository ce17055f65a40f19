//! Headless GPU device initialization.
//!
//! Provides [`RenderContext`] which owns the wgpu instance, adapter, device
//! and queue, and [`RenderContextError`] for clear diagnostics when
//! initialization fails. No surface is created: the effect renders into
//! caller-owned textures.

use crate::error::GodRaysError;

/// Error type for render context initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderContextError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Owns all GPU state: instance, adapter, device and queue.
pub struct RenderContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl RenderContext {
    /// Initialize a headless GPU context asynchronously.
    pub async fn new_headless() -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(RenderContextError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("godrays-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Largest 2D texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Initialize the headless GPU context synchronously using `pollster`.
pub fn init_render_context_blocking() -> Result<RenderContext, RenderContextError> {
    pollster::block_on(RenderContext::new_headless())
}

/// Error classes captured around resource creation, in push order.
///
/// `Internal` covers backend failures such as shader translation during
/// pipeline creation.
pub(crate) const CAPTURED_ERRORS: [wgpu::ErrorFilter; 3] = [
    wgpu::ErrorFilter::OutOfMemory,
    wgpu::ErrorFilter::Validation,
    wgpu::ErrorFilter::Internal,
];

/// Run `create` inside out-of-memory, validation and internal error scopes.
///
/// wgpu reports creation failures asynchronously through the device; the
/// scopes turn them into a [`GodRaysError::ResourceAllocation`] naming
/// `what` so the caller can disable the instance instead of panicking.
pub(crate) fn with_error_scope<T>(
    device: &wgpu::Device,
    what: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, GodRaysError> {
    let scopes: Vec<_> = CAPTURED_ERRORS
        .iter()
        .map(|&filter| device.push_error_scope(filter))
        .collect();
    let value = create();

    // Scopes pop innermost first.
    let mut first_error = None;
    for scope in scopes.into_iter().rev() {
        let error = pollster::block_on(scope.pop());
        first_error = first_error.or(error);
    }

    match first_error {
        Some(error) => Err(GodRaysError::ResourceAllocation {
            what,
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

/// Create a test GPU device and queue. Returns `None` if no GPU is available.
#[cfg(test)]
pub(crate) fn create_test_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;

        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check of the public fields the demo relies on.
    #[test]
    fn test_render_context_fields_exist() {
        #[allow(dead_code)]
        fn assert_fields(ctx: &RenderContext) {
            let _: &wgpu::Instance = &ctx.instance;
            let _: &wgpu::Adapter = &ctx.adapter;
            let _: &wgpu::Device = &ctx.device;
            let _: &wgpu::Queue = &ctx.queue;
        }
    }

    #[test]
    fn test_error_scope_captures_every_error_class() {
        for filter in [
            wgpu::ErrorFilter::OutOfMemory,
            wgpu::ErrorFilter::Validation,
            wgpu::ErrorFilter::Internal,
        ] {
            assert!(CAPTURED_ERRORS.contains(&filter), "{filter:?} not captured");
        }
    }

    #[test]
    fn test_error_scope_passes_through_valid_creation() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let buffer = with_error_scope(&device, "test buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("scoped-buffer"),
                size: 64,
                usage: wgpu::BufferUsages::UNIFORM,
                mapped_at_creation: false,
            })
        });
        assert!(buffer.is_ok());
    }

    #[test]
    fn test_error_scope_reports_invalid_texture() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let too_wide = device.limits().max_texture_dimension_2d + 1;
        let result = with_error_scope(&device, "oversized texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("oversized"),
                size: wgpu::Extent3d {
                    width: too_wide,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        });
        match result {
            Err(GodRaysError::ResourceAllocation { what, .. }) => {
                assert_eq!(what, "oversized texture");
            }
            other => panic!("expected ResourceAllocation, got {:?}", other.err()),
        }
    }
}
