use crate::models::{ExtractedData, Report};

/// Related reports beyond this many are summarized by count only.
const MAX_RELATED_IN_PROMPT: usize = 10;

const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"
You are a health surveillance analyst. You receive one community health report
and a summary of recent related reports from the same area. Classify it for
the health officer on duty.

DISEASES: cholera (watery diarrhea, vomiting, dehydration), dengue (high fever,
pain behind the eyes, joint pain, rash), malaria (fever, chills, sweating),
measles (fever, rash starting on the face, cough, red eyes), meningitis (severe
headache, stiff neck, fever, light sensitivity). Use unknown when the picture
does not clearly match.

URGENCY:
- critical: any death, suspected cholera or meningitis, ten or more cases
- high: three to nine cases, rapid spread, outbreak-prone disease
- medium: a single case of a notifiable disease, unclear but concerning
- low: mild, isolated, no spread

ALERT TYPE: single_case, cluster (several linked cases), suspected_outbreak,
rumor (second-hand, unverified).

OUTPUT: a single JSON object, no other text:
{
  "suspected_disease": "cholera | dengue | malaria | measles | meningitis | unknown",
  "confidence": 0.0 to 1.0,
  "urgency": "critical | high | medium | low",
  "alert_type": "single_case | cluster | suspected_outbreak | rumor",
  "reasoning": "two sentences at most",
  "recommended_actions": ["..."],
  "follow_up_questions": ["..."]
}
"#;

/// System prompt for classifying one report.
pub fn build_classification_prompt(extraction: &ExtractedData, related: &[Report]) -> String {
    let report = serde_json::to_string_pretty(extraction).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{CLASSIFICATION_SYSTEM_PROMPT}\nREPORT:\n{report}\n\nRELATED REPORTS:\n{}\n",
        summarize_related(related)
    )
}

/// One line per related report, newest first as given.
pub fn summarize_related(related: &[Report]) -> String {
    if related.is_empty() {
        return "none".to_string();
    }

    let mut lines: Vec<String> = related
        .iter()
        .take(MAX_RELATED_IN_PROMPT)
        .map(|r| {
            format!(
                "- {} {} at {}: cases={} deaths={} urgency={} status={}",
                r.created_at.format("%Y-%m-%d"),
                r.classification.suspected_disease,
                r.data.location_label().unwrap_or("unknown location"),
                r.data.cases_count.unwrap_or(1),
                r.data.deaths(),
                r.urgency(),
                r.status,
            )
        })
        .collect();

    if related.len() > MAX_RELATED_IN_PROMPT {
        lines.push(format!("- and {} more", related.len() - MAX_RELATED_IN_PROMPT));
    }
    lines.join("\n")
}
