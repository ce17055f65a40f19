//! Shader module compilation and caching with baked-in constants.

use log::{debug, info};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use wgpu::{ShaderModuleDescriptor, ShaderSource};

/// Error types for shader loading operations.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader '{name}' failed to compile: {message}")]
    CompilationFailed { name: String, message: String },

    #[error("shader '{name}' not found in library")]
    NotLoaded { name: String },
}

/// Compile-time constants prepended to a WGSL source as `const` declarations.
///
/// WGSL has no preprocessor; baking values as module-scope constants lets
/// the compiler unroll loops bounded by them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    entries: Vec<(String, u32)>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an unsigned constant.
    pub fn with_u32(mut self, name: &str, value: u32) -> Self {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    /// WGSL header declaring every constant.
    pub fn header(&self) -> String {
        let mut header = String::new();
        for (name, value) in &self.entries {
            let _ = writeln!(header, "const {name}: u32 = {value}u;");
        }
        header
    }

    /// Full source: header followed by `body`.
    pub fn apply(&self, body: &str) -> String {
        let mut source = self.header();
        source.push_str(body);
        source
    }
}

/// Registry of compiled shader modules keyed by name.
pub struct ShaderLibrary {
    modules: FxHashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    /// Create a new empty shader library.
    pub fn new() -> Self {
        Self {
            modules: FxHashMap::default(),
        }
    }

    /// Compile `source` under `name`, replacing any module of that name.
    ///
    /// Compilation runs inside a validation error scope so a malformed
    /// shader is reported as [`ShaderError::CompilationFailed`] instead of
    /// reaching the device's uncaptured error handler.
    pub fn load_from_source(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        source: &str,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        debug!("Loading shader '{}' from source", name);

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(ShaderError::CompilationFailed {
                name: name.to_string(),
                message: error.to_string(),
            });
        }

        let arc_module = Arc::new(module);
        let replaced = self
            .modules
            .insert(name.to_string(), arc_module.clone())
            .is_some();

        if replaced {
            info!("Replaced shader '{}'", name);
        } else {
            info!("Loaded shader '{}'", name);
        }

        Ok(arc_module)
    }

    /// Compile `body` with `defines` baked in as constants.
    pub fn load_with_defines(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        body: &str,
        defines: &ShaderDefines,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        self.load_from_source(device, name, &defines.apply(body))
    }

    /// Get a previously loaded shader by name.
    pub fn get(&self, name: &str) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderError::NotLoaded {
                name: name.to_string(),
            })
    }

    /// Number of loaded shaders.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the shader library is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::create_test_device_queue;

    const VALID_SHADER: &str = r#"
        @vertex
        fn vs_main(@builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(0.0, 0.0, 0.0, 1.0);
        }

        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(f32(NUM_SAMPLES), 0.0, 0.0, 1.0);
        }
    "#;

    const INVALID_SHADER: &str = r#"
        @vertex
        fn vs_main() -> @builtin(position) vec4<f32> {
            return undeclared_variable;
        }
    "#;

    #[test]
    fn test_defines_header_declares_constants() {
        let defines = ShaderDefines::new().with_u32("NUM_SAMPLES", 64);
        assert_eq!(defines.header(), "const NUM_SAMPLES: u32 = 64u;\n");
    }

    #[test]
    fn test_defines_replace_existing_value() {
        let defines = ShaderDefines::new()
            .with_u32("NUM_SAMPLES", 64)
            .with_u32("NUM_SAMPLES", 128);
        assert_eq!(defines.get("NUM_SAMPLES"), Some(128));
        assert_eq!(defines.header().lines().count(), 1);
    }

    #[test]
    fn test_shader_library_starts_empty() {
        let library = ShaderLibrary::new();
        assert!(library.is_empty());
        assert!(matches!(
            library.get("nonexistent"),
            Err(ShaderError::NotLoaded { .. })
        ));
    }

    #[test]
    fn test_load_with_defines_succeeds() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let defines = ShaderDefines::new().with_u32("NUM_SAMPLES", 32);
        let result = library.load_with_defines(&device, "test", VALID_SHADER, &defines);
        assert!(result.is_ok());
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_missing_define_fails_compilation() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let result = library.load_from_source(&device, "undefined", VALID_SHADER);
        assert!(matches!(result, Err(ShaderError::CompilationFailed { .. })));
        assert!(library.is_empty());
    }

    #[test]
    fn test_invalid_shader_reports_error() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let result = library.load_from_source(&device, "bad", INVALID_SHADER);
        assert!(matches!(result, Err(ShaderError::CompilationFailed { .. })));
    }

    #[test]
    fn test_reload_replaces_cached_module() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let defines = ShaderDefines::new().with_u32("NUM_SAMPLES", 64);
        library
            .load_with_defines(&device, "reloadable", VALID_SHADER, &defines)
            .unwrap();
        let original = library.get("reloadable").unwrap();

        let defines = defines.with_u32("NUM_SAMPLES", 128);
        library
            .load_with_defines(&device, "reloadable", VALID_SHADER, &defines)
            .unwrap();
        let reloaded = library.get("reloadable").unwrap();

        assert!(!Arc::ptr_eq(&original, &reloaded));
        assert_eq!(library.len(), 1);
    }
}
