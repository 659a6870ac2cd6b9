//! Feature vector construction from raw symptom records
//!
//! All values are small non-negative integers: category codes plus the
//! derived symptom count.

use crate::errors::{HealthError, Result};
use crate::schema::{FeatureSchema, FeatureSlot, FORM_FIELD_ALIASES, NORMAL_VALUE};
use crate::vocabulary::{encode_category, UnknownCategory, VocabularyTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied values keyed by feature name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInputRecord {
    values: BTreeMap<String, String>,
}

impl RawInputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature value, returning the record for chaining
    pub fn with(mut self, feature: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(feature, value);
        self
    }

    pub fn insert(&mut self, feature: impl Into<String>, value: impl Into<String>) {
        self.values.insert(feature.into(), value.into());
    }

    pub fn get(&self, feature: &str) -> Option<&str> {
        self.values.get(feature).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build a record from web form field names (`blood_brain`, `lung`, ...).
    ///
    /// Fields without an alias are kept under their own name.
    pub fn from_form<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut record = Self::new();
        for (field, value) in fields {
            let feature = FORM_FIELD_ALIASES
                .iter()
                .find(|(alias, _)| *alias == field)
                .map(|(_, feature)| *feature)
                .unwrap_or(field);
            record.insert(feature, value);
        }
        record
    }

    /// Parse a `Feature=value` assignment into the record
    pub fn insert_assignment(&mut self, assignment: &str) -> Result<()> {
        let (feature, value) = assignment.split_once('=').ok_or_else(|| {
            HealthError::Config(format!("expected Feature=value, got {assignment:?}"))
        })?;
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(HealthError::Config(format!(
                "empty feature name in {assignment:?}"
            )));
        }
        self.insert(feature, value);
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawInputRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Encoded feature row aligned to the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedVector {
    /// One value per schema slot, in schema order
    pub values: Vec<i64>,
    /// Non-normal categorical values counted in this pass
    pub symptom_count: i64,
    /// Values that were unseen and replaced by a fallback class
    #[serde(default)]
    pub diagnostics: Vec<UnknownCategory>,
}

impl EncodedVector {
    /// Single-row floating point view for the scaler
    pub fn as_row(&self) -> Vec<f64> {
        self.values.iter().map(|&v| v as f64).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encode a record slot by slot.
///
/// The computed slot receives the number of categorical slots before it
/// whose resolved value is not `normal`. The first encoding error aborts the
/// whole vector.
pub fn build_feature_vector(
    record: &RawInputRecord,
    schema: &FeatureSchema,
    vocabularies: &VocabularyTable,
) -> Result<EncodedVector> {
    let mut values = Vec::with_capacity(schema.len());
    let mut diagnostics = Vec::new();
    let mut symptom_count = 0i64;

    for slot in schema.slots() {
        match slot {
            FeatureSlot::SymptomCount => values.push(symptom_count),
            FeatureSlot::Categorical(feature) => {
                let encoded = encode_category(vocabularies, feature, record.get(feature))?;
                values.push(encoded.code as i64);
                if encoded.resolved != NORMAL_VALUE {
                    symptom_count += 1;
                }
                diagnostics.extend(encoded.unknown);
            }
        }
    }

    Ok(EncodedVector {
        values,
        symptom_count,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn vocabularies() -> VocabularyTable {
        let mut table = VocabularyTable::new();
        for name in [
            "BloodBrainDisease",
            "AppearenceDisease",
            "LungDisease",
            "AbdominalDisease",
        ] {
            table.insert(name.to_string(), Vocabulary::new(["normal", "mild", "severe"]));
        }
        table.insert(
            "GeneralDisease".to_string(),
            Vocabulary::new(["normal", "fever", "lethargy"]),
        );
        table
    }

    fn healthy_record() -> RawInputRecord {
        RawInputRecord::new()
            .with("AnimalName", "Bella")
            .with("BloodBrainDisease", "normal")
            .with("AppearenceDisease", "normal")
            .with("GeneralDisease", "normal")
            .with("LungDisease", "normal")
            .with("AbdominalDisease", "normal")
    }

    #[test]
    fn healthy_record_encodes_to_zeros() {
        let schema = FeatureSchema::animal_health();
        let encoded = build_feature_vector(&healthy_record(), &schema, &vocabularies()).unwrap();
        assert_eq!(encoded.values, vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(encoded.symptom_count, 0);
        assert!(encoded.diagnostics.is_empty());
    }

    #[test]
    fn symptom_count_tracks_non_normal_values() {
        let schema = FeatureSchema::animal_health();
        let record = healthy_record()
            .with("GeneralDisease", "Fever")
            .with("LungDisease", "SEVERE");
        let encoded = build_feature_vector(&record, &schema, &vocabularies()).unwrap();
        assert_eq!(encoded.values, vec![0, 0, 1, 2, 0, 2]);
        assert_eq!(encoded.symptom_count, 2);
    }

    #[test]
    fn fallback_value_does_not_count_as_symptom() {
        let schema = FeatureSchema::animal_health();
        let record = healthy_record().with("GeneralDisease", "unknown_value");
        let encoded = build_feature_vector(&record, &schema, &vocabularies()).unwrap();
        assert_eq!(encoded.values[2], 0);
        assert_eq!(encoded.symptom_count, 0);
        assert_eq!(encoded.diagnostics.len(), 1);
        assert_eq!(encoded.diagnostics[0].substitute, "normal");
    }

    #[test]
    fn computed_slot_only_counts_earlier_positions() {
        let schema = FeatureSchema::from_names(&[
            "GeneralDisease",
            "SymptomCount",
            "LungDisease",
        ])
        .unwrap();
        let record = healthy_record()
            .with("GeneralDisease", "fever")
            .with("LungDisease", "mild");
        let encoded = build_feature_vector(&record, &schema, &vocabularies()).unwrap();
        assert_eq!(encoded.values, vec![1, 1, 1]);
        assert_eq!(encoded.symptom_count, 2);
    }

    #[test]
    fn missing_feature_aborts_without_partial_vector() {
        let schema = FeatureSchema::animal_health();
        let record = RawInputRecord::new()
            .with("BloodBrainDisease", "normal")
            .with("AppearenceDisease", "normal");
        let err = build_feature_vector(&record, &schema, &vocabularies()).unwrap_err();
        assert!(matches!(err, HealthError::MissingFeature(f) if f == "GeneralDisease"));
    }

    #[test]
    fn form_fields_map_to_feature_names() {
        let record = RawInputRecord::from_form([
            ("animal_name", "Rex"),
            ("blood_brain", "normal"),
            ("appearance", "normal"),
            ("general", "fever"),
            ("lung", "normal"),
            ("abdominal", "normal"),
            ("unmapped", "kept"),
        ]);
        assert_eq!(record.get("AnimalName"), Some("Rex"));
        assert_eq!(record.get("GeneralDisease"), Some("fever"));
        assert_eq!(record.get("AppearenceDisease"), Some("normal"));
        assert_eq!(record.get("unmapped"), Some("kept"));
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn assignments_parse_feature_and_value() {
        let mut record = RawInputRecord::new();
        record.insert_assignment("GeneralDisease= Fever ").unwrap();
        assert_eq!(record.get("GeneralDisease"), Some(" Fever "));
        assert!(record.insert_assignment("no-separator").is_err());
        assert!(record.insert_assignment("=value").is_err());
    }

    #[test]
    fn record_deserializes_from_flat_object() {
        let record: RawInputRecord =
            serde_json::from_str(r#"{"GeneralDisease": "fever", "AnimalName": "Milo"}"#).unwrap();
        assert_eq!(record.get("GeneralDisease"), Some("fever"));
        assert_eq!(record.get("AnimalName"), Some("Milo"));
    }
}
