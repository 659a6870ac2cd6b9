//! Model artifact loading
//!
//! Four artifacts make up a bundle: the classifier, the per-feature
//! vocabularies, the scaler and the target decoder. Each one is loaded on
//! its own so a broken file leaves the rest usable; callers decide whether a
//! partial bundle may serve requests.

use crate::classifier::ClassifierArtifact;
use crate::errors::{HealthError, Result};
use crate::labels::TargetDecoder;
use crate::scaler::ScalerArtifact;
use crate::serialization::Fingerprint;
use crate::vocabulary::VocabularyTable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_CLASSIFIER_FILE: &str = "best_model.json";
pub const DEFAULT_VOCABULARIES_FILE: &str = "label_encoders.json";
pub const DEFAULT_SCALER_FILE: &str = "scaler.json";
pub const DEFAULT_TARGET_FILE: &str = "label_encoder.json";

/// The four artifacts of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Classifier,
    Vocabularies,
    Scaler,
    TargetDecoder,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Classifier,
        ArtifactKind::Vocabularies,
        ArtifactKind::Scaler,
        ArtifactKind::TargetDecoder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "classifier",
            ArtifactKind::Vocabularies => "vocabularies",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::TargetDecoder => "target decoder",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File locations of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub classifier: PathBuf,
    pub vocabularies: PathBuf,
    pub scaler: PathBuf,
    pub target: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            classifier: dir.join(DEFAULT_CLASSIFIER_FILE),
            vocabularies: dir.join(DEFAULT_VOCABULARIES_FILE),
            scaler: dir.join(DEFAULT_SCALER_FILE),
            target: dir.join(DEFAULT_TARGET_FILE),
        }
    }

    pub fn path_of(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Classifier => &self.classifier,
            ArtifactKind::Vocabularies => &self.vocabularies,
            ArtifactKind::Scaler => &self.scaler,
            ArtifactKind::TargetDecoder => &self.target,
        }
    }
}

fn read_json<T: DeserializeOwned>(kind: ArtifactKind, path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|e| HealthError::ArtifactLoad {
        artifact: kind,
        reason: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_str(&data).map_err(|e| HealthError::ArtifactLoad {
        artifact: kind,
        reason: format!("{}: {e}", path.display()),
    })
}

fn load_classifier(path: &Path) -> Result<ClassifierArtifact> {
    let classifier: ClassifierArtifact = read_json(ArtifactKind::Classifier, path)?;
    classifier.validate()?;
    Ok(classifier)
}

fn load_scaler(path: &Path) -> Result<ScalerArtifact> {
    let scaler: ScalerArtifact = read_json(ArtifactKind::Scaler, path)?;
    scaler.validate()?;
    Ok(scaler)
}

fn load_target(path: &Path) -> Result<TargetDecoder> {
    let target: TargetDecoder = read_json(ArtifactKind::TargetDecoder, path)?;
    target.validate()?;
    Ok(target)
}

fn settle<T>(kind: ArtifactKind, paths: &ArtifactPaths, loaded: Result<T>) -> Option<T> {
    let path = paths.path_of(kind);
    match loaded {
        Ok(value) => {
            info!(artifact = %kind, path = %path.display(), "Artifact loaded");
            Some(value)
        }
        Err(e) => {
            error!(artifact = %kind, path = %path.display(), "Artifact load failed: {}", e);
            None
        }
    }
}

/// Loaded artifacts; any slot may be empty after a failed load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactBundle {
    pub classifier: Option<ClassifierArtifact>,
    pub vocabularies: Option<VocabularyTable>,
    pub scaler: Option<ScalerArtifact>,
    pub target: Option<TargetDecoder>,
}

impl ArtifactBundle {
    /// A bundle with every artifact present
    pub fn complete(
        classifier: ClassifierArtifact,
        vocabularies: VocabularyTable,
        scaler: ScalerArtifact,
        target: TargetDecoder,
    ) -> Self {
        Self {
            classifier: Some(classifier),
            vocabularies: Some(vocabularies),
            scaler: Some(scaler),
            target: Some(target),
        }
    }

    /// Load every artifact independently, logging each outcome
    pub fn load(paths: &ArtifactPaths) -> Self {
        let bundle = Self {
            classifier: settle(
                ArtifactKind::Classifier,
                paths,
                load_classifier(&paths.classifier),
            ),
            vocabularies: settle(
                ArtifactKind::Vocabularies,
                paths,
                read_json(ArtifactKind::Vocabularies, &paths.vocabularies),
            ),
            scaler: settle(ArtifactKind::Scaler, paths, load_scaler(&paths.scaler)),
            target: settle(
                ArtifactKind::TargetDecoder,
                paths,
                load_target(&paths.target),
            ),
        };

        let missing = bundle.missing();
        if !missing.is_empty() {
            error!(missing = ?missing, "Artifact bundle is incomplete");
        }
        bundle
    }

    /// Load every artifact, failing on the first one that cannot be read
    pub fn load_strict(paths: &ArtifactPaths) -> Result<Self> {
        Ok(Self::complete(
            load_classifier(&paths.classifier)?,
            read_json(ArtifactKind::Vocabularies, &paths.vocabularies)?,
            load_scaler(&paths.scaler)?,
            load_target(&paths.target)?,
        ))
    }

    pub fn has(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Classifier => self.classifier.is_some(),
            ArtifactKind::Vocabularies => self.vocabularies.is_some(),
            ArtifactKind::Scaler => self.scaler.is_some(),
            ArtifactKind::TargetDecoder => self.target.is_some(),
        }
    }

    /// Artifacts that are not loaded
    pub fn missing(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// `ModelUnavailable` naming every absent artifact
    pub fn require_complete(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(ArtifactKind::as_str).collect();
        Err(HealthError::ModelUnavailable(names.join(", ")))
    }

    /// BLAKE3 digest over the canonical form of a complete bundle
    pub fn fingerprint(&self) -> Result<String> {
        self.require_complete()?;
        let mut fp = Fingerprint::new();
        fp.add(ArtifactKind::Classifier.as_str(), &self.classifier)?;
        fp.add(ArtifactKind::Vocabularies.as_str(), &self.vocabularies)?;
        fp.add(ArtifactKind::Scaler.as_str(), &self.scaler)?;
        fp.add(ArtifactKind::TargetDecoder.as_str(), &self.target)?;
        Ok(fp.finish())
    }

    /// Write the bundle as JSON files at `paths`
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        self.require_complete()?;
        write_json(&paths.classifier, &self.classifier)?;
        write_json(&paths.vocabularies, &self.vocabularies)?;
        write_json(&paths.scaler, &self.scaler)?;
        write_json(&paths.target, &self.target)?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
