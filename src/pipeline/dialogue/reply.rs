use chrono::NaiveDate;

use crate::models::enums::{ConversationMode, DiseaseType, Language, ReporterRelation};
use crate::models::{ExtractedData, GeoPoint};
use crate::pipeline::oracle::Fields;

/// Typed view of a dialogue oracle reply. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogueReply {
    pub response: Option<String>,
    pub detected_language: Option<Language>,
    pub health_signal: bool,
    pub extraction: ExtractedData,
    pub proposed_mode: Option<ConversationMode>,
    pub reasoning: Option<String>,
}

impl DialogueReply {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        let detected_language = fields
            .string("detected_language")
            .and_then(|l| l.to_lowercase().parse::<Language>().ok())
            .filter(|l| *l != Language::Unknown);
        let proposed_mode = fields
            .string("transition_to")
            .and_then(|m| m.to_lowercase().parse::<ConversationMode>().ok());

        Self {
            response: fields.string("response"),
            detected_language,
            health_signal: fields.flag("health_signal_detected").unwrap_or(false),
            extraction: fields
                .object("extracted_data")
                .map(extraction_from_fields)
                .unwrap_or_default(),
            proposed_mode,
            reasoning: fields.string("reasoning"),
        }
    }
}

/// Decode an `extracted_data` object. Unusable values read as absent.
pub fn extraction_from_fields(fields: Fields<'_>) -> ExtractedData {
    let mut symptoms: Vec<String> = Vec::new();
    for raw in fields.strings("symptoms") {
        let symptom = raw.to_lowercase();
        if !symptoms.contains(&symptom) {
            symptoms.push(symptom);
        }
    }

    let location_coords = fields.object("location_coords").and_then(|c| {
        let lat = c.0.get("lat")?.as_f64()?;
        let lon = c.0.get("lon")?.as_f64()?;
        Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid)
    });

    ExtractedData {
        symptoms,
        suspected_disease: fields
            .string("suspected_disease")
            .map(|d| DiseaseType::from_label(&d)),
        location_text: fields.string("location_text"),
        location_normalized: fields.string("location_normalized"),
        location_coords,
        onset_text: fields.string("onset_text"),
        onset_date: fields
            .string("onset_date")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        cases_count: fields.count("cases_count"),
        deaths_count: fields.count("deaths_count"),
        affected_description: fields.string("affected_description"),
        reporter_relationship: fields
            .string("reporter_relationship")
            .and_then(|r| parse_relationship(&r)),
    }
}

fn parse_relationship(raw: &str) -> Option<ReporterRelation> {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
        .parse()
        .ok()
}
