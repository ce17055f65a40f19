//! Tunable effect parameters and the edit commands that change them.

use crate::error::GodRaysError;

/// Largest sample count an edit may request.
pub const MAX_SAMPLE_COUNT: i32 = 1000;

/// The effect's tunable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParameters {
    /// Minimum luminance that survives the bright pass.
    pub threshold: f32,
    /// Fraction of the pixel-to-light distance the march covers.
    pub medium_density: f32,
    /// Per-step attenuation factor.
    pub medium_decay: f32,
    /// Per-sample contribution scale.
    pub medium_weight: f32,
    /// Final output scale.
    pub exposure: f32,
    /// Samples per pixel, baked into the shader.
    pub sample_count: i32,
    /// Index of the light in the scene's light list.
    pub light_index: u32,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            medium_density: 0.5,
            medium_decay: 0.95,
            medium_weight: 0.4,
            exposure: 1.0,
            sample_count: 64,
            light_index: 0,
        }
    }
}

impl EffectParameters {
    /// Construct from the six persisted parameters. The light index starts at 0.
    pub fn new(
        threshold: f32,
        medium_density: f32,
        medium_decay: f32,
        medium_weight: f32,
        exposure: f32,
        sample_count: i32,
    ) -> Result<Self, GodRaysError> {
        let params = Self {
            threshold,
            medium_density,
            medium_decay,
            medium_weight,
            exposure,
            sample_count,
            light_index: 0,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> Result<(), GodRaysError> {
        if self.sample_count < 0 {
            return Err(GodRaysError::InvalidParameter {
                name: "sample_count",
                reason: format!("must be non-negative, got {}", self.sample_count),
            });
        }
        let scalars = [
            ("threshold", self.threshold),
            ("medium_density", self.medium_density),
            ("medium_decay", self.medium_decay),
            ("medium_weight", self.medium_weight),
            ("exposure", self.exposure),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(GodRaysError::InvalidParameter {
                    name,
                    reason: format!("must be finite, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Sample count as baked into the shader.
    pub fn samples(&self) -> u32 {
        self.sample_count.max(0) as u32
    }
}

/// One interactive change to a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterEdit {
    Threshold(f32),
    MediumDensity(f32),
    MediumDecay(f32),
    MediumWeight(f32),
    Exposure(f32),
    SampleCount(i32),
    LightIndex(u32),
}

/// What an applied edit requires from the GPU side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEffect {
    /// The value did not change.
    Unchanged,
    /// The bright-pass threshold must be updated.
    FilterThreshold,
    /// The settings block must be re-uploaded.
    ParameterBlock,
    /// The accumulation program must be recompiled.
    ShaderRebuild,
}

/// Holds the parameters and classifies edits.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: EffectParameters,
    rebuild_requested: bool,
}

impl ParameterStore {
    pub fn new(params: EffectParameters) -> Self {
        Self {
            params,
            rebuild_requested: false,
        }
    }

    pub fn params(&self) -> &EffectParameters {
        &self.params
    }

    /// Apply an edit, clamping it into the control's range.
    ///
    /// Non-finite scalars are rejected and leave the store unchanged.
    pub fn apply(&mut self, edit: ParameterEdit) -> Result<EditEffect, GodRaysError> {
        fn set(slot: &mut f32, value: f32, name: &'static str) -> Result<bool, GodRaysError> {
            if !value.is_finite() {
                return Err(GodRaysError::InvalidParameter {
                    name,
                    reason: format!("must be finite, got {value}"),
                });
            }
            let changed = *slot != value;
            *slot = value;
            Ok(changed)
        }

        let p = &mut self.params;
        let effect = match edit {
            ParameterEdit::Threshold(v) => {
                set(&mut p.threshold, v, "threshold")?.then_some(EditEffect::FilterThreshold)
            }
            ParameterEdit::MediumDensity(v) => {
                set(&mut p.medium_density, v, "medium_density")?.then_some(EditEffect::ParameterBlock)
            }
            ParameterEdit::MediumDecay(v) => {
                set(&mut p.medium_decay, v, "medium_decay")?.then_some(EditEffect::ParameterBlock)
            }
            ParameterEdit::MediumWeight(v) => {
                set(&mut p.medium_weight, v, "medium_weight")?.then_some(EditEffect::ParameterBlock)
            }
            ParameterEdit::Exposure(v) => {
                set(&mut p.exposure, v.max(0.0), "exposure")?.then_some(EditEffect::ParameterBlock)
            }
            ParameterEdit::SampleCount(n) => {
                let n = n.clamp(0, MAX_SAMPLE_COUNT);
                let changed = p.sample_count != n;
                p.sample_count = n;
                if changed {
                    self.rebuild_requested = true;
                }
                changed.then_some(EditEffect::ShaderRebuild)
            }
            ParameterEdit::LightIndex(i) => {
                let changed = p.light_index != i;
                p.light_index = i;
                changed.then_some(EditEffect::ParameterBlock)
            }
        };
        Ok(effect.unwrap_or(EditEffect::Unchanged))
    }

    /// Take the pending shader-rebuild request, clearing it.
    pub fn take_rebuild_request(&mut self) -> bool {
        std::mem::take(&mut self.rebuild_requested)
    }
}
