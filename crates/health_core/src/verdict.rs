//! Severity tiers derived from the predicted label and its confidence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this confidence the prediction is reported as uncertain
pub const DEFAULT_UNCERTAIN_THRESHOLD: f64 = 0.60;

/// Target label that maps to the critical tier (compared case-insensitively)
pub const CRITICAL_LABEL: &str = "critical";

/// Severity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Uncertain,
    Critical,
    Normal,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Uncertain => "uncertain",
            Tier::Critical => "critical",
            Tier::Normal => "normal",
        }
    }

    /// Message shown to the operator
    pub fn message(&self) -> &'static str {
        match self {
            Tier::Uncertain => "Uncertain Health Status - Professional Evaluation Recommended",
            Tier::Critical => "Critical Health Condition Detected",
            Tier::Normal => "Normal Health Status",
        }
    }

    /// Styling hint for rendering surfaces
    pub fn display_class(&self) -> &'static str {
        match self {
            Tier::Uncertain => "warning",
            Tier::Critical => "danger",
            Tier::Normal => "safe",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence as a whole percentage, e.g. `0.873` becomes `"87%"`
pub fn format_percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Graded verdict for one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub tier: Tier,
    pub message: String,
    pub confidence: f64,
    /// e.g. `"87% confidence"`
    pub confidence_text: String,
}

impl Verdict {
    pub fn display_class(&self) -> &'static str {
        self.tier.display_class()
    }
}

/// Tier selection rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// Confidences strictly below this are uncertain
    pub uncertain_threshold: f64,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            uncertain_threshold: DEFAULT_UNCERTAIN_THRESHOLD,
        }
    }
}

impl VerdictPolicy {
    pub fn new(uncertain_threshold: f64) -> Self {
        Self {
            uncertain_threshold,
        }
    }

    pub fn tier(&self, label: &str, confidence: f64) -> Tier {
        if confidence < self.uncertain_threshold {
            Tier::Uncertain
        } else if label.eq_ignore_ascii_case(CRITICAL_LABEL) {
            Tier::Critical
        } else {
            Tier::Normal
        }
    }

    pub fn classify(&self, label: &str, confidence: f64) -> Verdict {
        let tier = self.tier(label, confidence);
        Verdict {
            tier,
            message: tier.message().to_string(),
            confidence,
            confidence_text: format!("{} confidence", format_percent(confidence)),
        }
    }
}

/// Classify with the default threshold
pub fn classify_verdict(label: &str, confidence: f64) -> Verdict {
    VerdictPolicy::default().classify(label, confidence)
}
