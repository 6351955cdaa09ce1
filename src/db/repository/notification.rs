use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::UrgencyLevel;
use crate::models::Notification;

/// Ids are derived from (report, officer), so a replayed handoff
/// re-inserting the same notification is ignored.
pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO notifications (id, report_id, officer_id, urgency, title, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            n.id.to_string(),
            n.report_id.to_string(),
            n.officer_id.map(|id| id.to_string()),
            n.urgency.as_str(),
            n.title,
            n.body,
            n.created_at,
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_notifications_for_report(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, report_id, officer_id, urgency, title, body, created_at
         FROM notifications WHERE report_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, DateTime<Utc>>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, report_id, officer_id, urgency, title, body, created_at) = row?;
        out.push(Notification {
            id: parse_uuid("notification.id", &id)?,
            report_id: parse_uuid("notification.report_id", &report_id)?,
            officer_id: officer_id
                .as_deref()
                .map(|raw| parse_uuid("notification.officer_id", raw))
                .transpose()?,
            urgency: UrgencyLevel::from_str(&urgency)?,
            title,
            body,
            created_at,
        });
    }
    Ok(out)
}
