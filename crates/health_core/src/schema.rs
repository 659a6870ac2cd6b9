//! Feature schema for the health classifier
//!
//! The slot order is the column order the scaler and classifier were fit
//! with. It never changes at runtime.

use crate::errors::{HealthError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the derived symptom count column
pub const SYMPTOM_COUNT_FEATURE: &str = "SymptomCount";

/// Resolved value that does not count as a symptom
pub const NORMAL_VALUE: &str = "normal";

/// Key under which the info view lists target labels
pub const TARGET_FEATURE: &str = "HealthStatus";

/// Record key for the animal's name. Carried through, never encoded.
pub const ANIMAL_NAME_FIELD: &str = "AnimalName";

/// Column order used when the artifacts were fit (AnimalName excluded)
pub const TRAINED_FEATURE_ORDER: [&str; 6] = [
    "BloodBrainDisease",
    "AppearenceDisease",
    "GeneralDisease",
    "LungDisease",
    "AbdominalDisease",
    SYMPTOM_COUNT_FEATURE,
];

/// Form field name to feature name
pub const FORM_FIELD_ALIASES: [(&str, &str); 6] = [
    ("animal_name", ANIMAL_NAME_FIELD),
    ("blood_brain", "BloodBrainDisease"),
    ("appearance", "AppearenceDisease"),
    ("general", "GeneralDisease"),
    ("lung", "LungDisease"),
    ("abdominal", "AbdominalDisease"),
];

/// One position in the feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "name", rename_all = "snake_case")]
pub enum FeatureSlot {
    /// Encoded from the caller's value through the feature's vocabulary
    Categorical(String),
    /// Running count of non-normal categorical values before this slot
    SymptomCount,
}

impl FeatureSlot {
    /// Column name of the slot
    pub fn name(&self) -> &str {
        match self {
            FeatureSlot::Categorical(name) => name,
            FeatureSlot::SymptomCount => SYMPTOM_COUNT_FEATURE,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, FeatureSlot::SymptomCount)
    }
}

/// Ordered feature slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    slots: Vec<FeatureSlot>,
}

impl FeatureSchema {
    /// Build a schema, rejecting empty, duplicated or multiply-computed layouts
    pub fn new(slots: Vec<FeatureSlot>) -> Result<Self> {
        if slots.is_empty() {
            return Err(HealthError::InvalidSchema(
                "schema must declare at least one feature".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for slot in &slots {
            if !seen.insert(slot.name()) {
                return Err(HealthError::InvalidSchema(format!(
                    "duplicate feature {}",
                    slot.name()
                )));
            }
        }

        if slots.iter().filter(|slot| slot.is_computed()).count() > 1 {
            return Err(HealthError::InvalidSchema(
                "at most one computed feature is supported".to_string(),
            ));
        }

        Ok(Self { slots })
    }

    /// Build a schema from column names; `SymptomCount` becomes the computed slot
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let slots = names
            .iter()
            .map(|name| match name.as_ref() {
                SYMPTOM_COUNT_FEATURE => FeatureSlot::SymptomCount,
                other => FeatureSlot::Categorical(other.to_string()),
            })
            .collect();
        Self::new(slots)
    }

    /// The schema the shipped artifacts were trained with
    pub fn animal_health() -> Self {
        let slots = TRAINED_FEATURE_ORDER
            .iter()
            .map(|name| match *name {
                SYMPTOM_COUNT_FEATURE => FeatureSlot::SymptomCount,
                other => FeatureSlot::Categorical(other.to_string()),
            })
            .collect();
        Self { slots }
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Column names in order
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(FeatureSlot::name).collect()
    }

    /// Names of the slots that require caller input
    pub fn categorical_features(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(|slot| match slot {
            FeatureSlot::Categorical(name) => Some(name.as_str()),
            FeatureSlot::SymptomCount => None,
        })
    }

    /// Check an artifact's declared column order against this schema.
    ///
    /// An empty declaration means the artifact did not record names and only
    /// the width is checked by the caller.
    pub fn check_feature_names(&self, artifact: &str, declared: &[String]) -> Result<()> {
        if declared.is_empty() {
            return Ok(());
        }

        let expected = self.names();
        if declared.len() != expected.len()
            || declared.iter().zip(expected.iter()).any(|(a, b)| a != b)
        {
            return Err(HealthError::SchemaMismatch(format!(
                "{artifact} was fit with columns {declared:?}, expected {expected:?}"
            )));
        }
        Ok(())
    }

    /// Check an artifact's input width against this schema
    pub fn check_width(&self, artifact: &str, width: usize) -> Result<()> {
        if width != self.len() {
            return Err(HealthError::SchemaMismatch(format!(
                "{artifact} expects {width} features, schema declares {}",
                self.len()
            )));
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::animal_health()
    }
}
