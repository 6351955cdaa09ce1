use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::repository;
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::enums::{Platform, ReportStatus};
use crate::models::{
    ConversationState, GeoPoint, Notification, Officer, Report, ReportLink,
};
use crate::pipeline::traits::{ConversationStore, ReportStore};

/// SQLite-backed store. The connection lock is held for one repository
/// call at a time.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    /// Register an officer. Officer management lives outside the pipeline;
    /// this is the seeding entry point.
    pub fn add_officer(&self, officer: &Officer) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::insert_officer(&conn, officer)
    }

    pub fn notifications_for_report(
        &self,
        report_id: &Uuid,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_notifications_for_report(&conn, report_id)
    }

    pub fn conversation(
        &self,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationState>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_conversation(&conn, id, now)
    }
}

impl ReportStore for SqliteStore {
    fn create_report(&self, report: &Report) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::insert_report(&conn, report)
    }

    fn get_report(&self, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_report(&conn, id)
    }

    fn get_report_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<Report>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_report_by_conversation(&conn, conversation_id)
    }

    fn candidate_reports(
        &self,
        since: DateTime<Utc>,
        statuses: &[ReportStatus],
    ) -> Result<Vec<Report>, DatabaseError> {
        let conn = self.conn()?;
        repository::list_candidate_reports(&conn, since, statuses)
    }

    fn create_link(&self, link: &ReportLink) -> Result<bool, DatabaseError> {
        let conn = self.conn()?;
        repository::insert_link(&conn, link)
    }

    fn links_for_report(&self, report_id: &Uuid) -> Result<Vec<ReportLink>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_links_for_report(&conn, report_id)
    }

    fn update_status(
        &self,
        id: &Uuid,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::update_report_status(&conn, id, status, now)
    }

    fn update_notes(
        &self,
        id: &Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::update_report_notes(&conn, id, notes, now)
    }

    fn assign(
        &self,
        id: &Uuid,
        officer_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::assign_report(&conn, id, officer_id, now)
    }

    fn backfill_coordinates(
        &self,
        id: &Uuid,
        coords: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::backfill_report_coordinates(&conn, id, coords, now)
    }

    fn active_officers(&self) -> Result<Vec<Officer>, DatabaseError> {
        let conn = self.conn()?;
        repository::list_active_officers(&conn)
    }

    fn create_notification(&self, notification: &Notification) -> Result<bool, DatabaseError> {
        let conn = self.conn()?;
        repository::insert_notification(&conn, notification)
    }
}

impl ConversationStore for SqliteStore {
    fn load_active(
        &self,
        platform: Platform,
        reporter_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationState>, DatabaseError> {
        let conn = self.conn()?;
        repository::load_latest_conversation(&conn, platform, reporter_hash, now)
    }

    fn save(
        &self,
        state: &ConversationState,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::save_conversation(&conn, state, expires_at)
    }

    fn pending_handoffs(&self) -> Result<Vec<ConversationState>, DatabaseError> {
        let conn = self.conn()?;
        repository::list_pending_handoffs(&conn)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let conn = self.conn()?;
        repository::purge_expired_conversations(&conn, now)
    }
}
