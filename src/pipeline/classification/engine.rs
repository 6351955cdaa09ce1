use chrono::{DateTime, Utc};

use super::prompt::build_classification_prompt;
use super::rules::{area_case_count, check_thresholds, urgency_floor, UrgencyFloor};
use crate::models::enums::{AlertType, DiseaseType, UrgencyLevel};
use crate::models::{Classification, ExtractedData, Report};
use crate::pipeline::extraction::completeness_score;
use crate::pipeline::oracle::{parse_oracle_response, Fields, Oracle, OracleMessage, OracleRequest};
use crate::pipeline_config::{ClassificationConfig, FieldWeights};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub classification: Classification,
    /// Oracle proposal was unusable and the safe default was used.
    pub degraded: bool,
    pub floor: UrgencyFloor,
    pub area_cases: u32,
}

/// Oracle proposal before the rules are applied.
#[derive(Debug, Clone, PartialEq)]
struct Proposal {
    disease: DiseaseType,
    confidence: f64,
    urgency: UrgencyLevel,
    alert_type: AlertType,
    reasoning: String,
    recommended_actions: Vec<String>,
    follow_up_questions: Vec<String>,
}

impl Proposal {
    /// Unreadable urgency or alert type fall back to medium / single case.
    fn from_fields(fields: Fields<'_>) -> Self {
        let label = |key: &str| {
            fields
                .string(key)
                .map(|v| v.trim().to_lowercase().replace([' ', '-'], "_"))
        };
        Self {
            disease: fields
                .string("suspected_disease")
                .map(|d| DiseaseType::from_label(&d))
                .unwrap_or(DiseaseType::Unknown),
            confidence: fields.unit("confidence").unwrap_or(0.0),
            urgency: label("urgency")
                .and_then(|u| u.parse().ok())
                .unwrap_or(UrgencyLevel::Medium),
            alert_type: label("alert_type")
                .and_then(|a| a.parse().ok())
                .unwrap_or(AlertType::SingleCase),
            reasoning: fields.string("reasoning").unwrap_or_default(),
            recommended_actions: fields.strings("recommended_actions"),
            follow_up_questions: fields.strings("follow_up_questions"),
        }
    }
}

/// Classifies completed reports. The oracle proposes; the threshold rules
/// bound the result from below.
pub struct ClassificationEngine<'a> {
    oracle: &'a dyn Oracle,
    config: &'a ClassificationConfig,
    weights: &'a FieldWeights,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        config: &'a ClassificationConfig,
        weights: &'a FieldWeights,
    ) -> Self {
        Self {
            oracle,
            config,
            weights,
        }
    }

    /// Never fails. An unusable oracle reply degrades to the safe default,
    /// which still passes through the floor and threshold rules.
    pub fn classify(
        &self,
        extraction: &ExtractedData,
        related: &[Report],
        now: DateTime<Utc>,
    ) -> ClassificationOutcome {
        let _span = tracing::info_span!(
            "classify",
            related = related.len(),
            extracted_disease = extraction.disease().as_str(),
        )
        .entered();

        let proposal = self.propose(extraction, related);
        let degraded = proposal.is_none();

        let mut classification = match proposal {
            Some(p) => Classification {
                suspected_disease: p.disease,
                confidence: p.confidence,
                completeness: 0.0,
                urgency: p.urgency,
                alert_type: p.alert_type,
                reasoning: p.reasoning,
                recommended_actions: p.recommended_actions,
                follow_up_questions: p.follow_up_questions,
                manual_review: false,
            },
            None => Classification::safe_default(),
        };

        let proposed_disease = classification.suspected_disease;
        let disease = if proposed_disease.is_known() {
            proposed_disease
        } else {
            extraction.disease()
        };
        classification.suspected_disease = disease;

        let threshold = self.config.thresholds.get(disease);
        let area_cases = area_case_count(extraction, disease, related, &threshold, now);
        let deaths = extraction.deaths();

        let floor = urgency_floor(
            deaths,
            &[disease, extraction.disease()],
            area_cases,
            &threshold,
            self.config,
        );
        if floor.level > classification.urgency {
            tracing::info!(
                proposed = classification.urgency.as_str(),
                floor = floor.level.as_str(),
                rule = floor.reason,
                "Urgency raised to rule floor"
            );
            classification.urgency = floor.level;
        }

        let check = check_thresholds(disease, area_cases, deaths, &threshold);
        if check.exceeded {
            if check.alert_type.rank() > classification.alert_type.rank() {
                classification.alert_type = check.alert_type;
            }
            append_reasoning(&mut classification.reasoning, &format!("THRESHOLD: {}", check.detail));
        }

        classification.completeness = completeness_score(extraction, self.weights);

        tracing::info!(
            disease = disease.as_str(),
            urgency = classification.urgency.as_str(),
            alert_type = classification.alert_type.as_str(),
            area_cases,
            degraded,
            "Report classified"
        );

        ClassificationOutcome {
            classification,
            degraded,
            floor,
            area_cases,
        }
    }

    fn propose(&self, extraction: &ExtractedData, related: &[Report]) -> Option<Proposal> {
        let request = OracleRequest::new(
            build_classification_prompt(extraction, related),
            vec![OracleMessage::user("Classify this report.")],
            &self.config.call,
        );

        let raw = match self.oracle.complete(&request) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), degraded = true, "Classification oracle call failed");
                return None;
            }
        };

        let payload = parse_oracle_response(&raw);
        match payload.fields() {
            Some(fields) => Some(Proposal::from_fields(fields)),
            None => {
                tracing::warn!(degraded = true, "Classification reply unparsed, using safe default");
                None
            }
        }
    }
}

fn append_reasoning(reasoning: &mut String, note: &str) {
    if reasoning.trim().is_empty() {
        reasoning.push_str(note);
    } else {
        reasoning.push_str(" | ");
        reasoning.push_str(note);
    }
}
