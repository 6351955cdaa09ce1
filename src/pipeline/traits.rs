use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{Platform, ReportStatus};
use crate::models::{
    ConversationState, GeoPoint, Notification, NotificationEvent, Officer, Report, ReportLink,
};

/// Persistence for reports, links, officers and notifications.
pub trait ReportStore: Send + Sync {
    fn create_report(&self, report: &Report) -> Result<(), DatabaseError>;

    fn get_report(&self, id: &Uuid) -> Result<Option<Report>, DatabaseError>;

    fn get_report_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Report>, DatabaseError>;

    /// Reports created since `since` with one of `statuses`, newest first.
    fn candidate_reports(
        &self,
        since: DateTime<Utc>,
        statuses: &[ReportStatus],
    ) -> Result<Vec<Report>, DatabaseError>;

    /// Returns false when an identical typed link already exists.
    fn create_link(&self, link: &ReportLink) -> Result<bool, DatabaseError>;

    fn links_for_report(&self, report_id: &Uuid) -> Result<Vec<ReportLink>, DatabaseError>;

    fn update_status(
        &self,
        id: &Uuid,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    fn update_notes(
        &self,
        id: &Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    fn assign(
        &self,
        id: &Uuid,
        officer_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    fn backfill_coordinates(
        &self,
        id: &Uuid,
        coords: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    fn active_officers(&self) -> Result<Vec<Officer>, DatabaseError>;

    /// Returns false when the notification was already recorded.
    fn create_notification(&self, notification: &Notification) -> Result<bool, DatabaseError>;
}

/// Conversation state keyed by platform and hashed reporter id.
pub trait ConversationStore: Send + Sync {
    /// Latest unexpired conversation for the reporter, if any.
    fn load_active(
        &self,
        platform: Platform,
        reporter_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationState>, DatabaseError>;

    fn save(&self, state: &ConversationState, expires_at: DateTime<Utc>)
        -> Result<(), DatabaseError>;

    /// Completed conversations with no report yet, including expired ones.
    fn pending_handoffs(&self) -> Result<Vec<ConversationState>, DatabaseError>;

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}

/// Fire-and-forget broadcast of new report alerts.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &NotificationEvent);
}
