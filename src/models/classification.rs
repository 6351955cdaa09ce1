use serde::{Deserialize, Serialize};

use super::enums::{AlertType, DiseaseType, UrgencyLevel};

/// Reasoning recorded when automated classification could not run.
pub const MANUAL_REVIEW_REASONING: &str =
    "Automated classification unavailable. Manual review required";
pub const MANUAL_REVIEW_ACTION: &str = "Manual review required - automated classification failed";

/// Result of classifying one completed conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub suspected_disease: DiseaseType,
    pub confidence: f64,
    pub completeness: f64,
    pub urgency: UrgencyLevel,
    pub alert_type: AlertType,
    pub reasoning: String,
    pub recommended_actions: Vec<String>,
    pub follow_up_questions: Vec<String>,
    /// Set when the oracle proposal was replaced by the safe default.
    #[serde(default)]
    pub manual_review: bool,
}

impl Classification {
    /// Safe default used when the oracle proposal is unavailable.
    pub fn safe_default() -> Self {
        Self {
            suspected_disease: DiseaseType::Unknown,
            confidence: 0.0,
            completeness: 0.0,
            urgency: UrgencyLevel::Medium,
            alert_type: AlertType::SingleCase,
            reasoning: MANUAL_REVIEW_REASONING.to_string(),
            recommended_actions: vec![MANUAL_REVIEW_ACTION.to_string()],
            follow_up_questions: Vec::new(),
            manual_review: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_default_is_medium_single_case_flagged() {
        let c = Classification::safe_default();
        assert_eq!(c.urgency, UrgencyLevel::Medium);
        assert_eq!(c.alert_type, AlertType::SingleCase);
        assert!(c.manual_review);
        assert!(c.reasoning.contains("Manual review required"));
        assert_eq!(c.confidence, 0.0);
    }
}
