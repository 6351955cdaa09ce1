//! Extraction merger.
//!
//! Combines the accumulated extraction with the partial extraction from the
//! latest turn. Lists are unioned (first occurrence keeps its position),
//! scalars are replaced only by a present incoming value. Nothing already
//! known is erased by a turn that fails to mention it.

use crate::models::ExtractedData;

pub fn merge(prior: &ExtractedData, incoming: &ExtractedData) -> ExtractedData {
    let mut symptoms = prior.symptoms.clone();
    for symptom in &incoming.symptoms {
        if !symptoms.contains(symptom) {
            symptoms.push(symptom.clone());
        }
    }

    // An incoming "unknown" carries no information; it never replaces a known disease.
    let suspected_disease = match (prior.suspected_disease, incoming.suspected_disease) {
        (Some(known), Some(next)) if known.is_known() && !next.is_known() => Some(known),
        (prior, incoming) => incoming.or(prior),
    };

    ExtractedData {
        symptoms,
        suspected_disease,
        location_text: pick(&prior.location_text, &incoming.location_text),
        location_normalized: pick(&prior.location_normalized, &incoming.location_normalized),
        location_coords: incoming.location_coords.or(prior.location_coords),
        onset_text: pick(&prior.onset_text, &incoming.onset_text),
        onset_date: incoming.onset_date.or(prior.onset_date),
        cases_count: incoming.cases_count.or(prior.cases_count),
        deaths_count: incoming.deaths_count.or(prior.deaths_count),
        affected_description: pick(&prior.affected_description, &incoming.affected_description),
        reporter_relationship: incoming.reporter_relationship.or(prior.reporter_relationship),
    }
}

fn pick(prior: &Option<String>, incoming: &Option<String>) -> Option<String> {
    incoming.clone().or_else(|| prior.clone())
}
