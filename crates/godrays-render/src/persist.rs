//! Key/value persistence of the effect parameters.
//!
//! Scalars are stored as `f64` and the sample count as `i32` under fixed
//! keys, so saved projects stay readable when the in-memory layout changes.
//! The light selection is not persisted; it refers into a scene list that
//! the host owns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GodRaysError;
use crate::params::EffectParameters;

pub const KEY_THRESHOLD: &str = "effect.threshold";
pub const KEY_MEDIUM_DENSITY: &str = "effect.mediumDensity";
pub const KEY_MEDIUM_DECAY: &str = "effect.mediumDecay";
pub const KEY_MEDIUM_WEIGHT: &str = "effect.mediumWeight";
pub const KEY_EXPOSURE: &str = "effect.exposure";
pub const KEY_NUM_SAMPLES: &str = "effect.numSamples";

/// A typed persisted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PassValue {
    F64(f64),
    I32(i32),
}

impl PassValue {
    fn type_name(&self) -> &'static str {
        match self {
            PassValue::F64(_) => "f64",
            PassValue::I32(_) => "i32",
        }
    }
}

/// Errors decoding persisted parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistError {
    #[error("persisted key '{0}' is missing")]
    MissingKey(&'static str),

    #[error("persisted key '{key}' has type {found}, expected {expected}")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// The persisted key/value set of one effect instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassVariables {
    values: BTreeMap<String, PassValue>,
}

impl PassVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: PassValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<PassValue> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn f64(&self, key: &'static str) -> Result<f64, PersistError> {
        match self.get(key) {
            Some(PassValue::F64(v)) => Ok(v),
            Some(other) => Err(PersistError::TypeMismatch {
                key,
                expected: "f64",
                found: other.type_name(),
            }),
            None => Err(PersistError::MissingKey(key)),
        }
    }

    fn i32(&self, key: &'static str) -> Result<i32, PersistError> {
        match self.get(key) {
            Some(PassValue::I32(v)) => Ok(v),
            Some(other) => Err(PersistError::TypeMismatch {
                key,
                expected: "i32",
                found: other.type_name(),
            }),
            None => Err(PersistError::MissingKey(key)),
        }
    }
}

/// Write the persisted parameters.
pub fn serialize(params: &EffectParameters) -> PassVariables {
    let mut vars = PassVariables::new();
    vars.insert(KEY_THRESHOLD, PassValue::F64(f64::from(params.threshold)));
    vars.insert(KEY_MEDIUM_DENSITY, PassValue::F64(f64::from(params.medium_density)));
    vars.insert(KEY_MEDIUM_DECAY, PassValue::F64(f64::from(params.medium_decay)));
    vars.insert(KEY_MEDIUM_WEIGHT, PassValue::F64(f64::from(params.medium_weight)));
    vars.insert(KEY_EXPOSURE, PassValue::F64(f64::from(params.exposure)));
    vars.insert(KEY_NUM_SAMPLES, PassValue::I32(params.sample_count));
    vars
}

/// Read the persisted parameters. The light index resets to 0.
pub fn deserialize(vars: &PassVariables) -> Result<EffectParameters, GodRaysError> {
    EffectParameters::new(
        vars.f64(KEY_THRESHOLD)? as f32,
        vars.f64(KEY_MEDIUM_DENSITY)? as f32,
        vars.f64(KEY_MEDIUM_DECAY)? as f32,
        vars.f64(KEY_MEDIUM_WEIGHT)? as f32,
        vars.f64(KEY_EXPOSURE)? as f32,
        vars.i32(KEY_NUM_SAMPLES)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_writes_all_keys() {
        let vars = serialize(&EffectParameters::default());
        assert_eq!(vars.len(), 6);
        assert_eq!(vars.get(KEY_NUM_SAMPLES), Some(PassValue::I32(64)));
        assert_eq!(vars.get(KEY_EXPOSURE), Some(PassValue::F64(1.0)));
    }

    #[test]
    fn test_deserialize_reconstructs_equivalent_parameters() {
        let params = EffectParameters {
            threshold: 0.75,
            medium_density: 0.25,
            medium_decay: 0.5,
            medium_weight: 0.125,
            exposure: 3.0,
            sample_count: 200,
            light_index: 0,
        };
        let restored = deserialize(&serialize(&params)).expect("valid");
        assert_eq!(restored, params);
    }

    #[test]
    fn test_light_index_is_not_persisted() {
        let params = EffectParameters {
            light_index: 4,
            ..Default::default()
        };
        let restored = deserialize(&serialize(&params)).expect("valid");
        assert_eq!(restored.light_index, 0);
    }

    #[test]
    fn test_missing_key() {
        let mut vars = serialize(&EffectParameters::default());
        vars.values.remove(KEY_MEDIUM_DECAY);
        match deserialize(&vars) {
            Err(GodRaysError::Persist(PersistError::MissingKey(key))) => {
                assert_eq!(key, KEY_MEDIUM_DECAY);
            }
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type() {
        let mut vars = serialize(&EffectParameters::default());
        vars.insert(KEY_NUM_SAMPLES, PassValue::F64(64.0));
        assert!(matches!(
            deserialize(&vars),
            Err(GodRaysError::Persist(PersistError::TypeMismatch {
                expected: "i32",
                ..
            }))
        ));
    }

    #[test]
    fn test_negative_persisted_sample_count_rejected() {
        let mut vars = serialize(&EffectParameters::default());
        vars.insert(KEY_NUM_SAMPLES, PassValue::I32(-8));
        assert!(matches!(
            deserialize(&vars),
            Err(GodRaysError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_ron_round_trip_keeps_keys() {
        let vars = serialize(&EffectParameters::default());
        let text = ron::to_string(&vars).expect("serialize");
        assert!(text.contains("effect.numSamples"), "{text}");
        let parsed: PassVariables = ron::from_str(&text).expect("parse");
        assert_eq!(parsed, vars);
    }
}
