//! Descriptions of the effect's interactive controls.
//!
//! An editing surface renders these however it likes; changes come back as
//! [`ParameterEdit`] values through the compositor's `apply_edit`.

use crate::params::{MAX_SAMPLE_COUNT, ParameterEdit};
use crate::scene::LightScene;

/// Highest index offered by the numeric light selector.
pub const NUMERIC_LIGHT_MAX: u32 = 15;

/// Identifies one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Threshold,
    MediumDensity,
    MediumDecay,
    MediumWeight,
    SampleCount,
    SourceLight,
    Exposure,
}

/// Value range of a control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRange {
    /// Unbounded float.
    Float,
    /// Float with a lower bound.
    FloatMin(f32),
    /// Inclusive integer range.
    Int { min: i32, max: i32 },
    /// Chosen from the scene's lights.
    Light,
}

/// One control as an editing surface should present it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSpec {
    pub id: ControlId,
    pub label: &'static str,
    pub range: ControlRange,
}

/// Every control, in display order.
pub static CONTROLS: [ControlSpec; 7] = [
    ControlSpec {
        id: ControlId::Threshold,
        label: "Medium Threshold",
        range: ControlRange::Float,
    },
    ControlSpec {
        id: ControlId::MediumDensity,
        label: "Medium Density",
        range: ControlRange::Float,
    },
    ControlSpec {
        id: ControlId::MediumDecay,
        label: "Medium Decay",
        range: ControlRange::Float,
    },
    ControlSpec {
        id: ControlId::MediumWeight,
        label: "Medium Weight",
        range: ControlRange::Float,
    },
    ControlSpec {
        id: ControlId::SampleCount,
        label: "Num Samples",
        range: ControlRange::Int {
            min: 0,
            max: MAX_SAMPLE_COUNT,
        },
    },
    ControlSpec {
        id: ControlId::SourceLight,
        label: "Source Light",
        range: ControlRange::Light,
    },
    ControlSpec {
        id: ControlId::Exposure,
        label: "Exposure",
        range: ControlRange::FloatMin(0.0),
    },
];

impl ControlId {
    /// Look up the control's description.
    pub fn spec(self) -> &'static ControlSpec {
        let index = match self {
            ControlId::Threshold => 0,
            ControlId::MediumDensity => 1,
            ControlId::MediumDecay => 2,
            ControlId::MediumWeight => 3,
            ControlId::SampleCount => 4,
            ControlId::SourceLight => 5,
            ControlId::Exposure => 6,
        };
        &CONTROLS[index]
    }

    /// Build the edit for a float-valued control.
    pub fn float_edit(self, value: f32) -> Option<ParameterEdit> {
        match self {
            ControlId::Threshold => Some(ParameterEdit::Threshold(value)),
            ControlId::MediumDensity => Some(ParameterEdit::MediumDensity(value)),
            ControlId::MediumDecay => Some(ParameterEdit::MediumDecay(value)),
            ControlId::MediumWeight => Some(ParameterEdit::MediumWeight(value)),
            ControlId::Exposure => Some(ParameterEdit::Exposure(value)),
            ControlId::SampleCount | ControlId::SourceLight => None,
        }
    }

    /// Build the edit for an integer-valued control.
    pub fn int_edit(self, value: i32) -> Option<ParameterEdit> {
        match self {
            ControlId::SampleCount => Some(ParameterEdit::SampleCount(value)),
            ControlId::SourceLight => Some(ParameterEdit::LightIndex(value.max(0) as u32)),
            _ => None,
        }
    }
}

/// One selectable light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightOption {
    pub index: u32,
    pub name: String,
}

/// How the source light is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightSelector {
    /// The scene's lights by name.
    Named(Vec<LightOption>),
    /// No lights to list; pick an index directly.
    Numeric { min: u32, max: u32 },
}

/// Build the light selector for the scene's current light list.
pub fn light_selector(scene: &dyn LightScene) -> LightSelector {
    let options: Vec<LightOption> = (0..scene.light_count())
        .filter_map(|index| {
            scene.light(index).map(|light| LightOption {
                index: index as u32,
                name: light.name.clone(),
            })
        })
        .collect();

    if options.is_empty() {
        LightSelector::Numeric {
            min: 0,
            max: NUMERIC_LIGHT_MAX,
        }
    } else {
        LightSelector::Named(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BasicScene;
    use godrays_lighting::{PointLight, SceneLight};

    #[test]
    fn test_every_control_is_listed_once() {
        for spec in &CONTROLS {
            assert_eq!(spec.id.spec(), spec);
            let count = CONTROLS.iter().filter(|s| s.id == spec.id).count();
            assert_eq!(count, 1, "{:?}", spec.id);
        }
    }

    #[test]
    fn test_sample_count_range() {
        assert_eq!(
            ControlId::SampleCount.spec().range,
            ControlRange::Int { min: 0, max: 1000 }
        );
        assert_eq!(ControlId::Exposure.spec().range, ControlRange::FloatMin(0.0));
    }

    #[test]
    fn test_edits_match_value_kind() {
        assert_eq!(
            ControlId::Exposure.float_edit(2.0),
            Some(ParameterEdit::Exposure(2.0))
        );
        assert_eq!(ControlId::SampleCount.float_edit(2.0), None);
        assert_eq!(
            ControlId::SourceLight.int_edit(3),
            Some(ParameterEdit::LightIndex(3))
        );
    }

    #[test]
    fn test_selector_falls_back_to_numeric() {
        let scene = BasicScene::default();
        assert_eq!(
            light_selector(&scene),
            LightSelector::Numeric { min: 0, max: 15 }
        );
    }

    #[test]
    fn test_selector_lists_lights_by_name() {
        let mut scene = BasicScene::default();
        scene.add_light(SceneLight::point("key", PointLight::default()));
        scene.add_light(SceneLight::point("fill", PointLight::default()));
        match light_selector(&scene) {
            LightSelector::Named(options) => {
                let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
                assert_eq!(names, ["key", "fill"]);
                assert_eq!(options[1].index, 1);
            }
            other => panic!("expected named selector, got {other:?}"),
        }
    }
}
