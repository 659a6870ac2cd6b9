//! Per-feature vocabularies and the category encoder
//!
//! A vocabulary keeps the classes in the order they had when the encoder was
//! fit. A class's code is its position in that order, and the first class is
//! the substitute for values the encoder has never seen.

use crate::errors::{HealthError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Trim and lowercase a raw categorical value
pub fn normalize_input(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Known classes for one feature, in fit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    classes: Vec<String>,
    normalized: Vec<String>,
}

impl Vocabulary {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        let normalized = classes.iter().map(|c| c.to_lowercase()).collect();
        Self {
            classes,
            normalized,
        }
    }

    /// Classes as declared
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Classes sorted for display
    pub fn sorted_classes(&self) -> Vec<String> {
        let mut classes = self.classes.clone();
        classes.sort();
        classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Lowercased first class, substituted for unseen values
    pub fn fallback(&self) -> Option<&str> {
        self.normalized.first().map(String::as_str)
    }

    /// Code of an already normalized value, if known
    pub fn code_of(&self, normalized: &str) -> Option<usize> {
        self.normalized.iter().position(|class| class == normalized)
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(classes: Vec<String>) -> Self {
        Self::new(classes)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.classes
    }
}

/// Vocabularies keyed by feature name
pub type VocabularyTable = BTreeMap<String, Vocabulary>;

/// An unseen value replaced by the vocabulary's fallback class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownCategory {
    pub feature: String,
    pub value: String,
    pub substitute: String,
}

/// Outcome of encoding one categorical value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCategory {
    /// Position of the resolved class in fit order
    pub code: usize,
    /// Lowercased class the value resolved to
    pub resolved: String,
    /// Set when the value was unseen and the fallback was used
    pub unknown: Option<UnknownCategory>,
}

/// Encode one raw value for `feature`.
///
/// Missing input is reported before a missing vocabulary, and an unseen
/// value never fails: it resolves to the first declared class.
pub fn encode_category(
    vocabularies: &VocabularyTable,
    feature: &str,
    raw: Option<&str>,
) -> Result<EncodedCategory> {
    let value = raw.map(normalize_input).unwrap_or_default();
    if value.is_empty() {
        return Err(HealthError::MissingFeature(feature.to_string()));
    }

    let vocabulary = vocabularies
        .get(feature)
        .filter(|vocabulary| !vocabulary.is_empty())
        .ok_or_else(|| HealthError::MissingEncoder(feature.to_string()))?;

    if let Some(code) = vocabulary.code_of(&value) {
        return Ok(EncodedCategory {
            code,
            resolved: value,
            unknown: None,
        });
    }

    // non-empty vocabulary, checked above
    let substitute = vocabulary.fallback().unwrap_or_default().to_string();
    warn!(
        feature,
        value = %value,
        substitute = %substitute,
        "Unknown category, using fallback class"
    );

    Ok(EncodedCategory {
        code: 0,
        unknown: Some(UnknownCategory {
            feature: feature.to_string(),
            value,
            substitute: substitute.clone(),
        }),
        resolved: substitute,
    })
}
