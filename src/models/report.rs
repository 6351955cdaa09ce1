use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classification::Classification;
use super::conversation::ConversationState;
use super::enums::{AlertType, LinkType, Platform, ReportStatus, UrgencyLevel};
use super::extraction::ExtractedData;

/// Officer-facing record created from a completed, classified conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub reporter_hash: String,
    pub platform: Platform,
    pub data: ExtractedData,
    pub classification: Classification,
    pub status: ReportStatus,
    pub assigned_officer: Option<Uuid>,
    pub officer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Build the report for a completed conversation. Classification fields
    /// are carried as-is, never re-derived.
    pub fn from_classification(
        conversation: &ConversationState,
        classification: Classification,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            reporter_hash: conversation.reporter_hash.clone(),
            platform: conversation.platform,
            data: conversation.extracted.clone(),
            classification,
            status: ReportStatus::Open,
            assigned_officer: None,
            officer_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn urgency(&self) -> UrgencyLevel {
        self.classification.urgency
    }

    pub fn alert_type(&self) -> AlertType {
        self.classification.alert_type
    }

    pub fn completeness(&self) -> f64 {
        self.classification.completeness
    }
}

/// Typed edge between two reports. The pair is stored smaller id first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLink {
    pub id: Uuid,
    pub report_a: Uuid,
    pub report_b: Uuid,
    pub link_type: LinkType,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl ReportLink {
    /// `None` for a self-link. Confidence is clamped to [0, 1]; NaN becomes 0.
    pub fn new(
        a: Uuid,
        b: Uuid,
        link_type: LinkType,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if a == b {
            return None;
        }
        let (report_a, report_b) = if a < b { (a, b) } else { (b, a) };
        Some(Self {
            id: Uuid::new_v4(),
            report_a,
            report_b,
            link_type,
            confidence: clamp_unit(confidence),
            created_at: now,
        })
    }

    pub fn other(&self, id: Uuid) -> Uuid {
        if self.report_a == id {
            self.report_b
        } else {
            self.report_a
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
