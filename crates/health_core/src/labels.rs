//! Target label decoding

use crate::errors::{HealthError, Result};
use serde::{Deserialize, Serialize};

/// Maps encoded target indices back to health status labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDecoder {
    pub classes: Vec<String>,
}

impl TargetDecoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.len() < 2 {
            return Err(HealthError::SchemaMismatch(format!(
                "target decoder needs at least two labels, has {}",
                self.classes.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Label for an encoded index
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                HealthError::PredictionFailure(format!(
                    "predicted class {index} is not a known target label"
                ))
            })
    }

    /// Labels sorted for display
    pub fn sorted_classes(&self) -> Vec<String> {
        let mut classes = self.classes.clone();
        classes.sort();
        classes
    }
}
