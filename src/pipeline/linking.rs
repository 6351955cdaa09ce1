//! Case linking: finds earlier open reports near the new one in space and
//! time, scores them, and persists typed links.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{LinkType, ReportStatus};
use crate::models::{GeoPoint, Report, ReportLink};
use crate::pipeline::traits::ReportStore;
use crate::pipeline_config::LinkingConfig;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Anything that is not a letter, digit or whitespace.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Statuses a report must have to be linked against.
pub const LINKABLE_STATUSES: [ReportStatus; 2] = [ReportStatus::Open, ReportStatus::Investigating];

/// Great-circle distance in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Jaccard similarity of two symptom lists, case-insensitive. Zero when
/// both are empty.
pub fn symptom_jaccard(a: &[String], b: &[String]) -> f64 {
    let left: HashSet<String> = a.iter().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect();
    let right: HashSet<String> = b.iter().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect();

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize_location(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Two place descriptions refer to the same place when their normalized
/// token sets are equal or one contains the other.
pub fn locations_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_location(a), normalize_location(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let left: HashSet<&str> = a.split(' ').collect();
    let right: HashSet<&str> = b.split(' ').collect();
    left.is_subset(&right) || right.is_subset(&left)
}

/// An earlier report judged related to a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedCase {
    pub report: Report,
    pub score: f64,
    pub link_type: LinkType,
    pub distance_km: Option<f64>,
}

/// Outcome of persisting links for one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Score one candidate against the new report. `None` when unrelated.
fn score_candidate(
    new_report: &Report,
    candidate: &Report,
    window: Duration,
    radius_km: f64,
    config: &LinkingConfig,
) -> Option<RelatedCase> {
    if candidate.id == new_report.id || candidate.conversation_id == new_report.conversation_id {
        return None;
    }
    if (new_report.created_at - candidate.created_at).abs() > window {
        return None;
    }

    let jaccard = symptom_jaccard(&new_report.data.symptoms, &candidate.data.symptoms);
    let related = |link_type, score, distance_km| RelatedCase {
        report: candidate.clone(),
        score: clamp_score(score),
        link_type,
        distance_km,
    };

    if let (Some(a), Some(b)) = (new_report.data.location_coords, candidate.data.location_coords) {
        let d = haversine_km(a, b);
        return (d <= radius_km)
            .then(|| related(LinkType::Geographic, 0.5 * jaccard + 0.5 * (1.0 - d / radius_km), Some(d)));
    }

    let same_place = match (new_report.data.location_label(), candidate.data.location_label()) {
        (Some(a), Some(b)) => locations_match(a, b),
        _ => false,
    };
    if same_place {
        return Some(related(LinkType::Temporal, 0.5 * jaccard + 0.25, None));
    }

    match config.symptom_only_min_similarity {
        Some(min) if jaccard > 0.0 && jaccard >= min => {
            Some(related(LinkType::Symptom, 0.5 * jaccard, None))
        }
        _ => None,
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Rank candidates for `new_report`. Pure: no store access.
pub fn rank_candidates(
    new_report: &Report,
    candidates: &[Report],
    window_days: u32,
    radius_km: f64,
    config: &LinkingConfig,
) -> Vec<RelatedCase> {
    let window = Duration::days(i64::from(window_days));
    let mut related: Vec<RelatedCase> = candidates
        .iter()
        .filter(|c| LINKABLE_STATUSES.contains(&c.status))
        .filter_map(|c| score_candidate(new_report, c, window, radius_km, config))
        .collect();

    related.sort_by(|a, b| b.score.total_cmp(&a.score));
    related.truncate(config.max_links);
    related
}

/// Store-backed linker.
pub struct CaseLinker<'a> {
    store: &'a dyn ReportStore,
    config: &'a LinkingConfig,
}

impl<'a> CaseLinker<'a> {
    pub fn new(store: &'a dyn ReportStore, config: &'a LinkingConfig) -> Self {
        Self { store, config }
    }

    /// Related reports using the configured window and radius.
    pub fn find_related(&self, new_report: &Report) -> Result<Vec<RelatedCase>, DatabaseError> {
        self.find_related_within(new_report, self.config.window_days, self.config.radius_km)
    }

    pub fn find_related_within(
        &self,
        new_report: &Report,
        window_days: u32,
        radius_km: f64,
    ) -> Result<Vec<RelatedCase>, DatabaseError> {
        let since = new_report.created_at - Duration::days(i64::from(window_days));
        let candidates = self.store.candidate_reports(since, &LINKABLE_STATUSES)?;
        let related = rank_candidates(new_report, &candidates, window_days, radius_km, self.config);

        tracing::debug!(
            report_id = %new_report.id,
            candidates = candidates.len(),
            related = related.len(),
            "Related cases found"
        );
        Ok(related)
    }

    /// Persist one link per related case. Each insert stands alone; a
    /// failure is logged and the rest proceed.
    pub fn link_report(
        &self,
        report_id: &Uuid,
        related: &[RelatedCase],
        now: DateTime<Utc>,
    ) -> LinkSummary {
        let mut summary = LinkSummary::default();

        for case in related {
            let Some(link) =
                ReportLink::new(*report_id, case.report.id, case.link_type, case.score, now)
            else {
                continue;
            };
            match self.store.create_link(&link) {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.duplicates += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        report_id = %report_id,
                        related_id = %case.report.id,
                        error = %e,
                        "Failed to create report link"
                    );
                }
            }
        }

        tracing::info!(
            report_id = %report_id,
            created = summary.created,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Report links written"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::enums::{DiseaseType, Platform};
    use crate::models::{Classification, ConversationState};

    fn report_at(
        at: DateTime<Utc>,
        coords: Option<GeoPoint>,
        location: Option<&str>,
        symptoms: &[&str],
    ) -> Report {
        let mut conv = ConversationState::new("h", Platform::Telegram, at);
        conv.extracted.location_coords = coords;
        conv.extracted.location_text = location.map(str::to_string);
        conv.extracted.symptoms = symptoms.iter().map(|s| s.to_string()).collect();
        let mut c = Classification::safe_default();
        c.suspected_disease = DiseaseType::Cholera;
        Report::from_classification(&conv, c, at)
    }

    #[test]
    fn haversine_known_distances() {
        let kassala = GeoPoint::new(15.4510, 36.4000);
        assert!(haversine_km(kassala, kassala).abs() < 1e-9);
        // One degree of latitude is about 111.2 km.
        let north = GeoPoint::new(16.4510, 36.4000);
        assert!((haversine_km(kassala, north) - 111.19).abs() < 0.1);
    }

    #[test]
    fn jaccard_is_case_insensitive_and_bounded() {
        let a = vec!["Fever".to_string(), "vomiting".to_string()];
        let b = vec!["fever".to_string(), "rash".to_string()];
        assert!((symptom_jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(symptom_jaccard(&a, &a), 1.0);
        assert_eq!(symptom_jaccard(&[], &[]), 0.0);
    }

    #[test]
    fn location_normalization_and_matching() {
        assert_eq!(normalize_location("  Kassala,  Market! "), "kassala market");
        assert!(locations_match("Kassala", "kassala market"));
        assert!(locations_match("KASSALA MARKET", "market, kassala"));
        assert!(!locations_match("Kassala", "Gedaref"));
        assert!(!locations_match("", "Kassala"));
        assert!(locations_match("سوق كسلا", "كسلا"));
    }

    #[test]
    fn nearby_recent_reports_link_geographically() {
        let now = Utc::now();
        // About 2 km apart, three days apart, sharing 2 of 3 symptoms.
        let old = report_at(
            now - Duration::days(3),
            Some(GeoPoint::new(15.4510, 36.4000)),
            None,
            &["diarrhea", "vomiting"],
        );
        let new = report_at(
            now,
            Some(GeoPoint::new(15.4690, 36.4000)),
            None,
            &["diarrhea", "vomiting", "fever"],
        );

        let related = rank_candidates(&new, &[old.clone()], 7, 10.0, &LinkingConfig::default());
        assert_eq!(related.len(), 1);
        let case = &related[0];
        assert_eq!(case.link_type, LinkType::Geographic);
        assert_eq!(case.report.id, old.id);
        let d = case.distance_km.unwrap();
        assert!((d - 2.0).abs() < 0.1, "distance {d}");
        let expected = 0.5 * (2.0 / 3.0) + 0.5 * (1.0 - d / 10.0);
        assert!((case.score - expected).abs() < 1e-9);
    }

    #[test]
    fn far_or_old_reports_are_not_related() {
        let now = Utc::now();
        let here = GeoPoint::new(15.45, 36.40);
        let new = report_at(now, Some(here), None, &["fever"]);
        let far = report_at(now, Some(GeoPoint::new(15.70, 36.40)), None, &["fever"]);
        let old = report_at(now - Duration::days(8), Some(here), None, &["fever"]);

        assert!(rank_candidates(&new, &[far, old], 7, 10.0, &LinkingConfig::default()).is_empty());
    }

    #[test]
    fn text_match_without_coordinates_is_temporal() {
        let now = Utc::now();
        let new = report_at(now, None, Some("Kassala market"), &["fever"]);
        let old = report_at(now - Duration::days(1), None, Some("kassala"), &["cough"]);

        let related = rank_candidates(&new, &[old], 7, 10.0, &LinkingConfig::default());
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].link_type, LinkType::Temporal);
        assert!((related[0].score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn self_and_closed_reports_are_skipped() {
        let now = Utc::now();
        let new = report_at(now, None, Some("Kassala"), &["fever"]);
        let mut closed = report_at(now, None, Some("Kassala"), &["fever"]);
        closed.status = ReportStatus::Resolved;

        let related =
            rank_candidates(&new, &[new.clone(), closed], 7, 10.0, &LinkingConfig::default());
        assert!(related.is_empty());
    }

    #[test]
    fn symptom_only_links_require_configuration() {
        let now = Utc::now();
        let new = report_at(now, None, Some("Kassala"), &["fever", "rash"]);
        let other = report_at(now, None, Some("Gedaref"), &["fever", "rash"]);

        let mut config = LinkingConfig::default();
        assert!(rank_candidates(&new, &[other.clone()], 7, 10.0, &config).is_empty());

        config.symptom_only_min_similarity = Some(0.5);
        let related = rank_candidates(&new, &[other], 7, 10.0, &config);
        assert_eq!(related[0].link_type, LinkType::Symptom);
        assert!((related[0].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn results_sorted_and_capped() {
        let now = Utc::now();
        let here = GeoPoint::new(15.45, 36.40);
        let new = report_at(now, Some(here), None, &["fever"]);
        let candidates: Vec<Report> = (0..6)
            .map(|i| {
                let p = GeoPoint::new(15.45 + 0.01 * f64::from(i), 36.40);
                report_at(now - Duration::hours(1), Some(p), None, &["fever"])
            })
            .collect();

        let config = LinkingConfig {
            max_links: 4,
            ..Default::default()
        };
        let related = rank_candidates(&new, &candidates, 7, 10.0, &config);
        assert_eq!(related.len(), 4);
        assert!(related.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(related.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn store_backed_find_and_link() {
        let store = SqliteStore::in_memory().unwrap();
        let config = LinkingConfig::default();
        let now = Utc::now();

        let old = report_at(now - Duration::days(2), None, Some("Kassala"), &["fever"]);
        store.create_report(&old).unwrap();
        let new = report_at(now, None, Some("Kassala"), &["fever"]);
        store.create_report(&new).unwrap();

        let linker = CaseLinker::new(&store, &config);
        let related = linker.find_related(&new).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].report.id, old.id);

        let first = linker.link_report(&new.id, &related, now);
        assert_eq!(first.created, 1);
        // Linking again is a no-op.
        let second = linker.link_report(&new.id, &related, now);
        assert_eq!(second, LinkSummary { created: 0, duplicates: 1, failed: 0 });
        assert_eq!(store.links_for_report(&old.id).unwrap().len(), 1);
    }

    #[test]
    fn link_failures_are_counted_not_fatal() {
        let store = SqliteStore::in_memory().unwrap();
        let config = LinkingConfig::default();
        let now = Utc::now();
        let stored = report_at(now, None, Some("Kassala"), &[]);
        store.create_report(&stored).unwrap();
        // Related report never persisted: the foreign key rejects the link.
        let ghost = report_at(now, None, Some("Kassala"), &[]);
        let related = vec![RelatedCase {
            report: ghost,
            score: 0.3,
            link_type: LinkType::Temporal,
            distance_km: None,
        }];

        let summary = CaseLinker::new(&store, &config).link_report(&stored.id, &related, now);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 0);
    }
}
