use crate::models::ExtractedData;
use crate::pipeline_config::FieldWeights;

/// Weighted completeness of an extraction in [0, 1].
///
/// Each weighted field contributes its full weight when present and nothing
/// otherwise. Partial reports score partially; there is no required field.
pub fn completeness_score(data: &ExtractedData, weights: &FieldWeights) -> f64 {
    let mut score = 0.0;
    if data.has_symptoms() {
        score += weights.symptoms;
    }
    if data.has_location() {
        score += weights.location;
    }
    if data.has_onset() {
        score += weights.onset;
    }
    if data.cases_count.is_some() {
        score += weights.cases_count;
    }
    if data.reporter_relationship.is_some() {
        score += weights.reporter_relationship;
    }
    if data.has_affected_description() {
        score += weights.affected_description;
    }
    score.clamp(0.0, 1.0)
}

/// Weighted fields still missing, most valuable first. Used to steer the
/// next clarifying question.
pub fn missing_fields(data: &ExtractedData, weights: &FieldWeights) -> Vec<&'static str> {
    let mut missing: Vec<(&'static str, f64)> = Vec::new();
    if !data.has_symptoms() {
        missing.push(("symptoms", weights.symptoms));
    }
    if !data.has_location() {
        missing.push(("location", weights.location));
    }
    if !data.has_onset() {
        missing.push(("onset", weights.onset));
    }
    if data.cases_count.is_none() {
        missing.push(("cases_count", weights.cases_count));
    }
    if data.reporter_relationship.is_none() {
        missing.push(("reporter_relationship", weights.reporter_relationship));
    }
    if !data.has_affected_description() {
        missing.push(("affected_description", weights.affected_description));
    }
    missing.sort_by(|a, b| b.1.total_cmp(&a.1));
    missing.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ReporterRelation;

    fn weights() -> FieldWeights {
        FieldWeights::default()
    }

    /// Builds an extraction with the weighted fields selected by `mask` bits.
    fn with_fields(mask: u8) -> ExtractedData {
        let mut data = ExtractedData::default();
        if mask & 1 != 0 {
            data.symptoms = vec!["fever".into()];
        }
        if mask & 2 != 0 {
            data.location_text = Some("Kassala".into());
        }
        if mask & 4 != 0 {
            data.onset_text = Some("yesterday".into());
        }
        if mask & 8 != 0 {
            data.cases_count = Some(2);
        }
        if mask & 16 != 0 {
            data.reporter_relationship = Some(ReporterRelation::Neighbor);
        }
        if mask & 32 != 0 {
            data.affected_description = Some("children".into());
        }
        data
    }

    #[test]
    fn empty_scores_zero() {
        assert_eq!(completeness_score(&ExtractedData::default(), &weights()), 0.0);
    }

    #[test]
    fn full_scores_one() {
        let score = completeness_score(&with_fields(0b11_1111), &weights());
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn symptoms_and_location_score_exactly_their_weights() {
        let w = weights();
        let data = ExtractedData {
            symptoms: vec!["fever".into()],
            location_text: Some("Kassala".into()),
            ..Default::default()
        };
        let score = completeness_score(&data, &w);
        assert_eq!(score, w.symptoms + w.location);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn monotonic_as_fields_are_added() {
        let w = weights();
        for base in 0u8..64 {
            let before = completeness_score(&with_fields(base), &w);
            for bit in 0..6 {
                let after = completeness_score(&with_fields(base | (1 << bit)), &w);
                assert!(after >= before, "mask {base:#b} + bit {bit}");
            }
        }
    }

    #[test]
    fn custom_weights_are_honored() {
        let w = FieldWeights {
            symptoms: 0.5,
            location: 0.5,
            onset: 0.0,
            cases_count: 0.0,
            reporter_relationship: 0.0,
            affected_description: 0.0,
        };
        assert_eq!(completeness_score(&with_fields(0b1), &w), 0.5);
        assert_eq!(completeness_score(&with_fields(0b11_1100), &w), 0.0);
    }

    #[test]
    fn normalized_location_counts_as_location() {
        let data = ExtractedData {
            location_normalized: Some("Gedaref".into()),
            ..Default::default()
        };
        assert_eq!(completeness_score(&data, &weights()), weights().location);
    }

    #[test]
    fn missing_fields_ordered_by_weight() {
        let data = with_fields(0b1);
        let missing = missing_fields(&data, &weights());
        assert_eq!(missing[0], "location");
        assert_eq!(missing[1], "onset");
        assert_eq!(missing.last(), Some(&"affected_description"));
        assert!(missing_fields(&with_fields(0b11_1111), &weights()).is_empty());
    }
}
