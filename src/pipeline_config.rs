//! Surveillance configuration.
//!
//! Everything a deployment tunes without a code change: the per-disease
//! threshold table, the always-critical set, completeness field weights,
//! case-linking radius and window, oracle call shapes, the notification
//! floor and the conversation idle TTL. Loaded from JSON; every field has a
//! default so a partial file only overrides what it names.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{DiseaseType, UrgencyLevel};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Config is not valid JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Shape of one oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallProfile {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl CallProfile {
    /// Short, conversational reply.
    pub fn dialogue() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }

    /// Longer, near-deterministic structured assessment.
    pub fn classification() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Completeness weight per field. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub symptoms: f64,
    pub location: f64,
    pub onset: f64,
    pub cases_count: f64,
    pub reporter_relationship: f64,
    pub affected_description: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            symptoms: 0.25,
            location: 0.25,
            onset: 0.20,
            cases_count: 0.15,
            reporter_relationship: 0.10,
            affected_description: 0.05,
        }
    }
}

impl FieldWeights {
    pub fn sum(&self) -> f64 {
        self.symptoms
            + self.location
            + self.onset
            + self.cases_count
            + self.reporter_relationship
            + self.affected_description
    }

    fn all(&self) -> [f64; 6] {
        [
            self.symptoms,
            self.location,
            self.onset,
            self.cases_count,
            self.reporter_relationship,
            self.affected_description,
        ]
    }
}

/// Case-count thresholds for one disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseThreshold {
    /// Area case count at which a cluster alert is raised.
    pub alert_cases: u32,
    /// Area case count at which a suspected outbreak is raised.
    pub outbreak_cases: u32,
    /// How far back related reports count toward the area total.
    pub window_days: u32,
    /// Any death escalates to suspected outbreak.
    pub any_death_is_critical: bool,
}

impl DiseaseThreshold {
    pub fn builtin(disease: DiseaseType) -> Self {
        let (alert_cases, outbreak_cases, window_days, any_death_is_critical) = match disease {
            DiseaseType::Cholera => (1, 3, 7, true),
            DiseaseType::Dengue => (5, 20, 7, true),
            DiseaseType::Malaria => (10, 50, 7, false),
            DiseaseType::Measles => (1, 5, 14, true),
            DiseaseType::Meningitis => (1, 3, 7, true),
            DiseaseType::Unknown => (5, 10, 7, true),
        };
        Self {
            alert_cases,
            outbreak_cases,
            window_days,
            any_death_is_critical,
        }
    }
}

/// Per-disease thresholds. Diseases missing from the table use their
/// built-in row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable(HashMap<DiseaseType, DiseaseThreshold>);

impl Default for ThresholdTable {
    fn default() -> Self {
        Self(
            DiseaseType::all()
                .iter()
                .map(|d| (*d, DiseaseThreshold::builtin(*d)))
                .collect(),
        )
    }
}

impl ThresholdTable {
    pub fn get(&self, disease: DiseaseType) -> DiseaseThreshold {
        self.0
            .get(&disease)
            .copied()
            .unwrap_or_else(|| DiseaseThreshold::builtin(disease))
    }

    pub fn set(&mut self, disease: DiseaseType, threshold: DiseaseThreshold) {
        self.0.insert(disease, threshold);
    }

    /// Widest counting window over every disease.
    pub fn longest_window_days(&self) -> u32 {
        DiseaseType::all()
            .iter()
            .map(|d| self.get(*d).window_days)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Completeness at which investigating moves to confirming.
    pub completeness_threshold: f64,
    /// Consecutive oracle failures before the conversation errors out.
    pub max_consecutive_failures: u32,
    /// Most recent messages sent to the oracle as context.
    pub max_history_messages: usize,
    pub call: CallProfile,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            completeness_threshold: 0.5,
            max_consecutive_failures: 3,
            max_history_messages: 20,
            call: CallProfile::dialogue(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub thresholds: ThresholdTable,
    /// Diseases whose mere suspicion floors urgency at critical.
    pub always_critical: Vec<DiseaseType>,
    pub call: CallProfile,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            always_critical: vec![DiseaseType::Cholera, DiseaseType::Meningitis],
            call: CallProfile::classification(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    pub radius_km: f64,
    pub window_days: u32,
    pub max_links: usize,
    /// When set, reports with no spatial match but at least this Jaccard
    /// similarity get a `symptom` link. Off by default.
    pub symptom_only_min_similarity: Option<f64>,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            window_days: 7,
            max_links: 50,
            symptom_only_min_similarity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveillanceConfig {
    pub field_weights: FieldWeights,
    pub dialogue: DialogueConfig,
    pub classification: ClassificationConfig,
    pub linking: LinkingConfig,
    /// Lowest urgency that triggers officer notifications.
    pub notification_floor: UrgencyLevel,
    pub conversation_ttl_hours: u32,
}

impl Default for SurveillanceConfig {
    fn default() -> Self {
        Self {
            field_weights: FieldWeights::default(),
            dialogue: DialogueConfig::default(),
            classification: ClassificationConfig::default(),
            linking: LinkingConfig::default(),
            notification_floor: UrgencyLevel::Medium,
            conversation_ttl_hours: 24,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl SurveillanceConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SurveillanceConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn conversation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.conversation_ttl_hours))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.field_weights;
        if weights.all().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid("field weights must be non-negative".into()));
        }
        if (weights.sum() - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "field weights must sum to 1.0, got {:.4}",
                weights.sum()
            )));
        }
        if !(0.0..=1.0).contains(&self.dialogue.completeness_threshold) {
            return Err(ConfigError::Invalid(
                "dialogue.completeness_threshold must be within [0, 1]".into(),
            ));
        }
        if self.dialogue.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "dialogue.max_consecutive_failures must be at least 1".into(),
            ));
        }
        if !(self.linking.radius_km.is_finite() && self.linking.radius_km > 0.0) {
            return Err(ConfigError::Invalid("linking.radius_km must be positive".into()));
        }
        if let Some(min) = self.linking.symptom_only_min_similarity {
            if !(0.0..=1.0).contains(&min) {
                return Err(ConfigError::Invalid(
                    "linking.symptom_only_min_similarity must be within [0, 1]".into(),
                ));
            }
        }
        for disease in DiseaseType::all() {
            let t = self.classification.thresholds.get(*disease);
            if t.alert_cases == 0 || t.alert_cases > t.outbreak_cases {
                return Err(ConfigError::Invalid(format!(
                    "{disease}: need 0 < alert_cases <= outbreak_cases"
                )));
            }
        }
        Ok(())
    }
}
