use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{DiseaseType, ReporterRelation};

/// Resolved coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Structured signal accumulated from a reporter's free text.
/// Every field is optional; any subset is a meaningful extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedData {
    pub symptoms: Vec<String>,
    pub suspected_disease: Option<DiseaseType>,
    pub location_text: Option<String>,
    pub location_normalized: Option<String>,
    pub location_coords: Option<GeoPoint>,
    pub onset_text: Option<String>,
    pub onset_date: Option<NaiveDate>,
    pub cases_count: Option<u32>,
    pub deaths_count: Option<u32>,
    pub affected_description: Option<String>,
    pub reporter_relationship: Option<ReporterRelation>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        *self == ExtractedData::default()
    }

    /// Effective disease: absent means unknown.
    pub fn disease(&self) -> DiseaseType {
        self.suspected_disease.unwrap_or(DiseaseType::Unknown)
    }

    pub fn has_symptoms(&self) -> bool {
        self.symptoms.iter().any(|s| !s.trim().is_empty())
    }

    pub fn has_location(&self) -> bool {
        present(&self.location_text) || present(&self.location_normalized)
    }

    pub fn has_onset(&self) -> bool {
        present(&self.onset_text) || self.onset_date.is_some()
    }

    pub fn has_affected_description(&self) -> bool {
        present(&self.affected_description)
    }

    /// Best human-readable location: normalized form first.
    pub fn location_label(&self) -> Option<&str> {
        self.location_normalized
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.location_text.as_deref().filter(|s| !s.trim().is_empty()))
    }

    pub fn deaths(&self) -> u32 {
        self.deaths_count.unwrap_or(0)
    }
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(ExtractedData::default().is_empty());
        assert_eq!(ExtractedData::default().disease(), DiseaseType::Unknown);
    }

    #[test]
    fn blank_strings_do_not_count_as_present() {
        let data = ExtractedData {
            location_text: Some("   ".into()),
            onset_text: Some(String::new()),
            symptoms: vec![" ".into()],
            ..Default::default()
        };
        assert!(!data.has_location());
        assert!(!data.has_onset());
        assert!(!data.has_symptoms());
    }

    #[test]
    fn location_label_prefers_normalized() {
        let data = ExtractedData {
            location_text: Some("near the market in kassala".into()),
            location_normalized: Some("Kassala".into()),
            ..Default::default()
        };
        assert_eq!(data.location_label(), Some("Kassala"));
    }

    #[test]
    fn onset_date_alone_counts() {
        let data = ExtractedData {
            onset_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        assert!(data.has_onset());
    }

    #[test]
    fn geo_point_validation() {
        assert!(GeoPoint::new(15.45, 36.4).is_valid());
        assert!(!GeoPoint::new(95.0, 0.0).is_valid());
    }
}
