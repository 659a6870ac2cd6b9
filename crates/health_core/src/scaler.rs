//! Pre-fit numeric scalers
//!
//! Parameters are exported from the training environment; nothing here fits
//! a transform.

use crate::errors::{HealthError, Result};
use serde::{Deserialize, Serialize};

/// A fitted per-column transform applied to one encoded row
pub trait Scaler: Send + Sync {
    /// Number of columns the transform was fit on
    fn n_features(&self) -> usize;

    /// Transform a single row
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>>;
}

/// Transform parameters by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerKind {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// Serialized scaler artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    /// Column names the scaler was fit on, if recorded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub transform: ScalerKind,
}

impl ScalerArtifact {
    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            feature_names: Vec::new(),
            transform: ScalerKind::Standard { mean, scale },
        }
    }

    pub fn min_max(min: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            feature_names: Vec::new(),
            transform: ScalerKind::MinMax { min, scale },
        }
    }

    /// Check parameter shapes and values
    pub fn validate(&self) -> Result<()> {
        let (offsets, scale) = match &self.transform {
            ScalerKind::Standard { mean, scale } => (mean, scale),
            ScalerKind::MinMax { min, scale } => (min, scale),
        };

        if offsets.is_empty() {
            return Err(HealthError::SchemaMismatch(
                "scaler has no fitted columns".to_string(),
            ));
        }
        if offsets.len() != scale.len() {
            return Err(HealthError::SchemaMismatch(format!(
                "scaler parameter lengths differ: {} offsets, {} scales",
                offsets.len(),
                scale.len()
            )));
        }
        if !self.feature_names.is_empty() && self.feature_names.len() != offsets.len() {
            return Err(HealthError::SchemaMismatch(format!(
                "scaler names {} columns but has {} parameters",
                self.feature_names.len(),
                offsets.len()
            )));
        }
        if let Some(index) = offsets
            .iter()
            .chain(scale.iter())
            .position(|v| !v.is_finite())
        {
            return Err(HealthError::SchemaMismatch(format!(
                "scaler parameter {index} is not finite"
            )));
        }
        Ok(())
    }
}

impl Scaler for ScalerArtifact {
    fn n_features(&self) -> usize {
        match &self.transform {
            ScalerKind::Standard { mean, .. } => mean.len(),
            ScalerKind::MinMax { min, .. } => min.len(),
        }
    }

    fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(HealthError::PredictionFailure(format!(
                "scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }

        let scaled: Vec<f64> = match &self.transform {
            ScalerKind::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale.iter()))
                .map(|(&x, (&m, &s))| {
                    // zero variance columns are left unscaled
                    let s = if s == 0.0 { 1.0 } else { s };
                    (x - m) / s
                })
                .collect(),
            ScalerKind::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale.iter()))
                .map(|(&x, (&lo, &s))| x * s + lo)
                .collect(),
        };

        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(HealthError::PredictionFailure(
                "scaler produced a non-finite value".to_string(),
            ));
        }
        Ok(scaled)
    }
}
