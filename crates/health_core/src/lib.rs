//! Animal health verdict engine
//!
//! Turns categorical symptom observations into a graded health verdict using
//! a classifier trained elsewhere.
//!
//! Modules:
//! - `schema`: Fixed feature order the artifacts were fit with
//! - `vocabulary`: Per-feature vocabularies and the category encoder
//! - `features`: Raw input records and feature vector construction
//! - `scaler`: Pre-fit numeric scalers
//! - `classifier`: Pre-fit probabilistic classifiers
//! - `labels`: Target label decoding
//! - `artifacts`: Artifact loading and bundle fingerprints
//! - `verdict`: Severity tiers
//! - `inference`: The end-to-end pipeline and info view
//! - `config`: Host configuration

pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod features;
pub mod inference;
pub mod labels;
pub mod scaler;
pub mod schema;
pub mod serialization;
pub mod verdict;
pub mod vocabulary;

pub use artifacts::{ArtifactBundle, ArtifactKind, ArtifactPaths};
pub use classifier::{Classifier, ClassifierArtifact, ClassifierModel};
pub use config::HealthConfig;
pub use errors::{HealthError, Result};
pub use features::{build_feature_vector, EncodedVector, RawInputRecord};
pub use inference::{InfoView, Prediction, PredictionOutcome, Predictor, VerdictView};
pub use labels::TargetDecoder;
pub use scaler::{Scaler, ScalerArtifact};
pub use schema::{FeatureSchema, FeatureSlot, TRAINED_FEATURE_ORDER};
pub use verdict::{classify_verdict, Tier, Verdict, VerdictPolicy};
pub use vocabulary::{encode_category, normalize_input, UnknownCategory, Vocabulary, VocabularyTable};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load artifacts described by `config` and build a predictor.
///
/// With `artifacts.require_all` set, any missing artifact or a fingerprint
/// that differs from `artifacts.expected_hash` is a startup error.
pub fn predictor_from_config(config: &HealthConfig) -> Result<Predictor> {
    config.validate()?;
    let bundle = ArtifactBundle::load(&config.artifact_paths());

    if config.artifacts.require_all {
        bundle.require_complete()?;
    }
    if let Some(expected) = &config.artifacts.expected_hash {
        let actual = bundle.fingerprint()?;
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(HealthError::SchemaMismatch(format!(
                "artifact fingerprint {actual} does not match expected {expected}"
            )));
        }
    }

    Predictor::new(FeatureSchema::animal_health(), bundle, config.verdict_policy())
}
