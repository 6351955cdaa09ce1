use chrono::{DateTime, Duration, Utc};

use crate::models::enums::{AlertType, DiseaseType, UrgencyLevel};
use crate::models::{ExtractedData, Report};
use crate::pipeline_config::{ClassificationConfig, DiseaseThreshold};

/// Cases in the area: the current report plus related reports of the same
/// disease inside the disease's window. A report with no count is one case.
/// For an unknown disease every related report counts.
pub fn area_case_count(
    extraction: &ExtractedData,
    disease: DiseaseType,
    related: &[Report],
    threshold: &DiseaseThreshold,
    now: DateTime<Utc>,
) -> u32 {
    let since = now - Duration::days(i64::from(threshold.window_days));
    let current = extraction.cases_count.unwrap_or(1).max(1);

    related
        .iter()
        .filter(|r| r.created_at >= since)
        .filter(|r| !disease.is_known() || r.classification.suspected_disease == disease)
        .map(|r| r.data.cases_count.unwrap_or(1).max(1))
        .fold(current, u32::saturating_add)
}

/// Minimum urgency the rules demand, with the rule that set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrgencyFloor {
    pub level: UrgencyLevel,
    pub reason: &'static str,
}

/// Deterministic floor. Any candidate disease in the always-critical set
/// counts, so a disagreement between extraction and oracle resolves upward.
pub fn urgency_floor(
    deaths: u32,
    candidates: &[DiseaseType],
    area_cases: u32,
    threshold: &DiseaseThreshold,
    config: &ClassificationConfig,
) -> UrgencyFloor {
    let floor = |level, reason| UrgencyFloor { level, reason };

    if deaths > 0 {
        return floor(UrgencyLevel::Critical, "death reported");
    }
    if candidates
        .iter()
        .any(|d| config.always_critical.contains(d))
    {
        return floor(UrgencyLevel::Critical, "always-critical disease");
    }
    if area_cases >= threshold.outbreak_cases {
        return floor(UrgencyLevel::Critical, "outbreak threshold reached");
    }
    if area_cases >= threshold.alert_cases {
        return floor(UrgencyLevel::High, "alert threshold reached");
    }
    floor(UrgencyLevel::Medium, "baseline")
}

/// Alert escalation from the threshold table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdCheck {
    pub exceeded: bool,
    pub alert_type: AlertType,
    pub detail: String,
}

pub fn check_thresholds(
    disease: DiseaseType,
    area_cases: u32,
    deaths: u32,
    threshold: &DiseaseThreshold,
) -> ThresholdCheck {
    if area_cases >= threshold.outbreak_cases {
        return ThresholdCheck {
            exceeded: true,
            alert_type: AlertType::SuspectedOutbreak,
            detail: format!(
                "{area_cases} {disease} cases in area reach outbreak threshold {}",
                threshold.outbreak_cases
            ),
        };
    }
    if deaths > 0 && threshold.any_death_is_critical {
        return ThresholdCheck {
            exceeded: true,
            alert_type: AlertType::SuspectedOutbreak,
            detail: format!("{deaths} death(s) with suspected {disease}"),
        };
    }
    if area_cases >= threshold.alert_cases {
        return ThresholdCheck {
            exceeded: true,
            alert_type: AlertType::Cluster,
            detail: format!(
                "{area_cases} {disease} cases in area reach alert threshold {}",
                threshold.alert_cases
            ),
        };
    }
    ThresholdCheck {
        exceeded: false,
        alert_type: AlertType::SingleCase,
        detail: String::new(),
    }
}
