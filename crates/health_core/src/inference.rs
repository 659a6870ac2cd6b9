//! Encode → scale → classify → verdict pipeline
//!
//! A `Predictor` is built once at startup from the loaded artifacts and is
//! read-only afterwards, so a host can share it across requests behind an
//! `Arc` without locking.

use crate::artifacts::{ArtifactBundle, ArtifactKind};
use crate::classifier::{argmax, check_distribution, Classifier, ClassifierArtifact};
use crate::errors::{HealthError, Result};
use crate::features::{build_feature_vector, EncodedVector, RawInputRecord};
use crate::labels::TargetDecoder;
use crate::scaler::Scaler;
use crate::schema::{FeatureSchema, TARGET_FEATURE};
use crate::verdict::{Verdict, VerdictPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Probability assigned to one target label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Full result of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Decoded target label
    pub label: String,
    /// One entry per classifier output, in output order
    pub probabilities: Vec<ClassProbability>,
    /// Highest class probability
    pub confidence: f64,
    pub verdict: Verdict,
    pub encoded: EncodedVector,
}

/// What a rendering surface needs to show a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictView {
    pub result: String,
    pub confidence: String,
    pub class: String,
}

impl From<&Verdict> for VerdictView {
    fn from(verdict: &Verdict) -> Self {
        Self {
            result: verdict.message.clone(),
            confidence: verdict.confidence_text.clone(),
            class: verdict.display_class().to_string(),
        }
    }
}

/// Either a verdict or an error message, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: Option<VerdictView>,
    pub error: Option<String>,
}

/// Known values per feature, sorted, plus target labels under `HealthStatus`
pub type InfoView = BTreeMap<String, Vec<String>>;

/// Raw classifier output for one scaled row
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Target-encoder index of the predicted class
    pub class_index: usize,
    pub probabilities: Vec<f64>,
    pub confidence: f64,
}

/// Scale and classify one encoded row.
///
/// Every failure, including a malformed probability vector, comes back as
/// `PredictionFailure`.
pub fn run_model(
    scaler: &dyn Scaler,
    classifier: &dyn Classifier,
    expected_classes: usize,
    encoded: &EncodedVector,
) -> Result<ModelOutput> {
    let scaled = scaler.transform(&encoded.as_row()).map_err(into_prediction_failure)?;
    let probabilities = classifier
        .predict_proba(&scaled)
        .map_err(into_prediction_failure)?;
    check_distribution(&probabilities, expected_classes)?;

    let position = argmax(&probabilities)
        .ok_or_else(|| HealthError::PredictionFailure("empty probability vector".to_string()))?;
    let confidence = probabilities[position];

    Ok(ModelOutput {
        class_index: classifier.class_index(position),
        probabilities,
        confidence,
    })
}

fn into_prediction_failure(err: HealthError) -> HealthError {
    match err {
        HealthError::PredictionFailure(_) => err,
        other => HealthError::PredictionFailure(other.to_string()),
    }
}

/// Immutable inference context
#[derive(Debug, Clone)]
pub struct Predictor {
    schema: FeatureSchema,
    artifacts: ArtifactBundle,
    policy: VerdictPolicy,
}

impl Predictor {
    /// Build a predictor and check the loaded artifacts against `schema`.
    ///
    /// Missing artifacts are allowed here and surface per request as
    /// `ModelUnavailable`; artifacts that are present but disagree with the
    /// schema are a `SchemaMismatch`.
    pub fn new(
        schema: FeatureSchema,
        artifacts: ArtifactBundle,
        policy: VerdictPolicy,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&policy.uncertain_threshold) {
            return Err(HealthError::Config(format!(
                "uncertain threshold {} is outside [0, 1]",
                policy.uncertain_threshold
            )));
        }

        if let Some(scaler) = &artifacts.scaler {
            schema.check_width("scaler", scaler.n_features())?;
            schema.check_feature_names("scaler", &scaler.feature_names)?;
        }
        if let Some(classifier) = &artifacts.classifier {
            schema.check_width("classifier", classifier.n_features())?;
            schema.check_feature_names("classifier", &classifier.feature_names)?;
        }
        if let (Some(classifier), Some(target)) = (&artifacts.classifier, &artifacts.target) {
            if classifier.n_classes() != target.len() {
                return Err(HealthError::SchemaMismatch(format!(
                    "classifier predicts {} classes, target decoder knows {}",
                    classifier.n_classes(),
                    target.len()
                )));
            }
            if let Some(bad) = classifier.classes.iter().find(|&&c| c >= target.len()) {
                return Err(HealthError::SchemaMismatch(format!(
                    "classifier class {bad} has no target label"
                )));
            }
        }
        if let Some(vocabularies) = &artifacts.vocabularies {
            for feature in schema.categorical_features() {
                if vocabularies.get(feature).map_or(true, |v| v.is_empty()) {
                    warn!(feature, "No vocabulary for schema feature; requests will fail");
                }
            }
        }

        Ok(Self {
            schema,
            artifacts,
            policy,
        })
    }

    /// Build a predictor that refuses to start without every artifact
    pub fn strict(
        schema: FeatureSchema,
        artifacts: ArtifactBundle,
        policy: VerdictPolicy,
    ) -> Result<Self> {
        artifacts.require_complete()?;
        Self::new(schema, artifacts, policy)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn artifacts(&self) -> &ArtifactBundle {
        &self.artifacts
    }

    pub fn policy(&self) -> VerdictPolicy {
        self.policy
    }

    /// Whether every artifact is loaded
    pub fn is_ready(&self) -> bool {
        self.artifacts.is_complete()
    }

    /// Encode a record without running the model
    pub fn encode(&self, record: &RawInputRecord) -> Result<EncodedVector> {
        let vocabularies = self.artifacts.vocabularies.as_ref().ok_or_else(|| {
            HealthError::ModelUnavailable(ArtifactKind::Vocabularies.to_string())
        })?;
        build_feature_vector(record, &self.schema, vocabularies)
    }

    /// Run the whole pipeline for one record
    pub fn predict(&self, record: &RawInputRecord) -> Result<Prediction> {
        self.artifacts.require_complete()?;
        let (Some(classifier), Some(vocabularies), Some(scaler), Some(target)) = (
            &self.artifacts.classifier,
            &self.artifacts.vocabularies,
            &self.artifacts.scaler,
            &self.artifacts.target,
        ) else {
            return Err(HealthError::ModelUnavailable("artifact bundle".to_string()));
        };

        let encoded = build_feature_vector(record, &self.schema, vocabularies)?;
        let output = run_model(scaler, classifier, target.len(), &encoded)?;
        let label = target.decode(output.class_index)?.to_string();
        let probabilities = label_probabilities(classifier, target, &output.probabilities)?;
        let verdict = self.policy.classify(&label, output.confidence);

        debug!(
            features = ?encoded.values,
            label = %label,
            confidence = output.confidence,
            tier = %verdict.tier,
            "Prediction complete"
        );

        Ok(Prediction {
            label,
            probabilities,
            confidence: output.confidence,
            verdict,
            encoded,
        })
    }

    /// Run the pipeline and fold the result into a renderable outcome
    pub fn evaluate(&self, record: &RawInputRecord) -> PredictionOutcome {
        match self.predict(record) {
            Ok(prediction) => PredictionOutcome {
                prediction: Some(VerdictView::from(&prediction.verdict)),
                error: None,
            },
            Err(e) => {
                if e.is_input_error() {
                    debug!("Prediction rejected: {}", e);
                } else {
                    warn!("Prediction rejected: {}", e);
                }
                PredictionOutcome {
                    prediction: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Known vocabularies and target labels, sorted
    pub fn info(&self) -> Result<InfoView> {
        let vocabularies = self
            .artifacts
            .vocabularies
            .as_ref()
            .ok_or_else(|| {
                HealthError::ModelUnavailable(ArtifactKind::Vocabularies.to_string())
            })?;

        let mut view: InfoView = vocabularies
            .iter()
            .map(|(feature, vocabulary)| (feature.clone(), vocabulary.sorted_classes()))
            .collect();
        if let Some(target) = &self.artifacts.target {
            view.insert(TARGET_FEATURE.to_string(), target.sorted_classes());
        }
        Ok(view)
    }
}

fn label_probabilities(
    classifier: &ClassifierArtifact,
    target: &TargetDecoder,
    probabilities: &[f64],
) -> Result<Vec<ClassProbability>> {
    probabilities
        .iter()
        .enumerate()
        .map(|(position, &probability)| {
            Ok(ClassProbability {
                label: target.decode(classifier.class_label(position))?.to_string(),
                probability,
            })
        })
        .collect()
}
