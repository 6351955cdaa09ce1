use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::{Classification, ExtractedData, GeoPoint, Report};

const REPORT_COLUMNS: &str = "id, conversation_id, reporter_hash, platform, status, data_json,
     classification_json, assigned_officer, officer_notes, created_at, updated_at";

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    let data_json = serde_json::to_string(&report.data)?;
    let classification_json = serde_json::to_string(&report.classification)?;
    let coords = report.data.location_coords;

    let result = conn.execute(
        "INSERT INTO reports (id, conversation_id, reporter_hash, platform, status,
         suspected_disease, urgency, alert_type, completeness, manual_review,
         location_normalized, latitude, longitude, cases_count, deaths_count,
         data_json, classification_json, assigned_officer, officer_notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
        params![
            report.id.to_string(),
            report.conversation_id.to_string(),
            report.reporter_hash,
            report.platform.as_str(),
            report.status.as_str(),
            report.classification.suspected_disease.as_str(),
            report.classification.urgency.as_str(),
            report.classification.alert_type.as_str(),
            report.classification.completeness,
            report.classification.manual_review as i32,
            report.data.location_normalized,
            coords.map(|c| c.lat),
            coords.map(|c| c.lon),
            report.data.cases_count,
            report.data.deaths_count,
            data_json,
            classification_json,
            report.assigned_officer.map(|id| id.to_string()),
            report.officer_notes,
            report.created_at,
            report.updated_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, msg)) if e.code == ErrorCode::ConstraintViolation => {
            Err(DatabaseError::ConstraintViolation(
                msg.unwrap_or_else(|| format!("report {} violates a constraint", report.id)),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
        &id.to_string(),
    )
}

pub fn get_report_by_conversation(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Option<Report>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE conversation_id = ?1"),
        &conversation_id.to_string(),
    )
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> Result<Option<Report>, DatabaseError> {
    let result = conn.query_row(sql, params![key], read_report_row);
    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reports created at or after `since` whose status is one of `statuses`,
/// newest first.
pub fn list_candidate_reports(
    conn: &Connection,
    since: DateTime<Utc>,
    statuses: &[ReportStatus],
) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE created_at >= ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![since], read_report_row)?;

    let mut reports = Vec::new();
    for row in rows {
        let report = report_from_row(row?)?;
        if statuses.contains(&report.status) {
            reports.push(report);
        }
    }
    Ok(reports)
}

// ═══════════════════════════════════════════
// Officer actions
// ═══════════════════════════════════════════

pub fn update_report_status(
    conn: &Connection,
    id: &Uuid,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id.to_string()],
    )?;
    require_row(changed, id)
}

pub fn update_report_notes(
    conn: &Connection,
    id: &Uuid,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET officer_notes = ?1, updated_at = ?2 WHERE id = ?3",
        params![notes, now, id.to_string()],
    )?;
    require_row(changed, id)
}

pub fn assign_report(
    conn: &Connection,
    id: &Uuid,
    officer_id: Option<&Uuid>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET assigned_officer = ?1, updated_at = ?2 WHERE id = ?3",
        params![officer_id.map(|o| o.to_string()), now, id.to_string()],
    )?;
    require_row(changed, id)
}

/// The one pipeline-side mutation allowed after creation.
pub fn backfill_report_coordinates(
    conn: &Connection,
    id: &Uuid,
    coords: GeoPoint,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut report = get_report(&tx, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Report".into(),
        id: id.to_string(),
    })?;
    report.data.location_coords = Some(coords);
    let data_json = serde_json::to_string(&report.data)?;
    tx.execute(
        "UPDATE reports SET latitude = ?1, longitude = ?2, data_json = ?3, updated_at = ?4
         WHERE id = ?5",
        params![coords.lat, coords.lon, data_json, now, id.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

fn require_row(changed: usize, id: &Uuid) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ----- Row mapping -----

struct ReportRow {
    id: String,
    conversation_id: String,
    reporter_hash: String,
    platform: String,
    status: String,
    data_json: String,
    classification_json: String,
    assigned_officer: Option<String>,
    officer_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn read_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        reporter_hash: row.get(2)?,
        platform: row.get(3)?,
        status: row.get(4)?,
        data_json: row.get(5)?,
        classification_json: row.get(6)?,
        assigned_officer: row.get(7)?,
        officer_notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<Report, DatabaseError> {
    let data: ExtractedData = serde_json::from_str(&row.data_json)?;
    let classification: Classification = serde_json::from_str(&row.classification_json)?;
    Ok(Report {
        id: parse_uuid("report.id", &row.id)?,
        conversation_id: parse_uuid("report.conversation_id", &row.conversation_id)?,
        reporter_hash: row.reporter_hash,
        platform: Platform::from_str(&row.platform)?,
        data,
        classification,
        status: ReportStatus::from_str(&row.status)?,
        assigned_officer: row
            .assigned_officer
            .as_deref()
            .map(|raw| parse_uuid("report.assigned_officer", raw))
            .transpose()?,
        officer_notes: row.officer_notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::ConversationState;
    use chrono::Duration;

    pub(crate) fn make_report(at: DateTime<Utc>, disease: DiseaseType) -> Report {
        let mut conv = ConversationState::new("hash", Platform::Telegram, at);
        conv.extracted = ExtractedData {
            symptoms: vec!["fever".into(), "vomiting".into()],
            suspected_disease: Some(disease),
            location_text: Some("Kassala".into()),
            cases_count: Some(2),
            ..Default::default()
        };
        let classification = Classification {
            suspected_disease: disease,
            confidence: 0.7,
            completeness: 0.65,
            urgency: UrgencyLevel::High,
            alert_type: AlertType::Cluster,
            reasoning: "two cases".into(),
            recommended_actions: vec!["Investigate".into()],
            follow_up_questions: vec![],
            manual_review: false,
        };
        Report::from_classification(&conv, classification, at)
    }

    #[test]
    fn insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let report = make_report(Utc::now(), DiseaseType::Cholera);
        insert_report(&conn, &report).unwrap();

        let loaded = get_report(&conn, &report.id).unwrap().unwrap();
        assert_eq!(loaded, report);
        let by_conv = get_report_by_conversation(&conn, &report.conversation_id)
            .unwrap()
            .unwrap();
        assert_eq!(by_conv.id, report.id);
    }

    #[test]
    fn missing_report_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_report(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn second_report_for_same_conversation_is_rejected() {
        let conn = open_memory_database().unwrap();
        let report = make_report(Utc::now(), DiseaseType::Cholera);
        insert_report(&conn, &report).unwrap();

        let mut dup = report.clone();
        dup.id = Uuid::new_v4();
        let err = insert_report(&conn, &dup).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn candidates_filter_by_window_and_status() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let recent = make_report(now - Duration::days(2), DiseaseType::Cholera);
        let old = make_report(now - Duration::days(20), DiseaseType::Cholera);
        let mut resolved = make_report(now - Duration::days(1), DiseaseType::Cholera);
        resolved.status = ReportStatus::Resolved;
        for r in [&recent, &old, &resolved] {
            insert_report(&conn, r).unwrap();
        }

        let found = list_candidate_reports(
            &conn,
            now - Duration::days(7),
            &[ReportStatus::Open, ReportStatus::Investigating],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, recent.id);
    }

    #[test]
    fn officer_actions_update_fields() {
        let conn = open_memory_database().unwrap();
        let report = make_report(Utc::now(), DiseaseType::Measles);
        insert_report(&conn, &report).unwrap();

        update_report_status(&conn, &report.id, ReportStatus::Investigating, Utc::now()).unwrap();
        update_report_notes(&conn, &report.id, Some("team dispatched"), Utc::now()).unwrap();

        let loaded = get_report(&conn, &report.id).unwrap().unwrap();
        assert_eq!(loaded.status, ReportStatus::Investigating);
        assert_eq!(loaded.officer_notes.as_deref(), Some("team dispatched"));
        // Classification is untouched by officer actions.
        assert_eq!(loaded.classification, report.classification);
    }

    #[test]
    fn update_unknown_report_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_report_status(&conn, &Uuid::new_v4(), ReportStatus::Resolved, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn backfill_sets_coordinates() {
        let conn = open_memory_database().unwrap();
        let report = make_report(Utc::now(), DiseaseType::Dengue);
        insert_report(&conn, &report).unwrap();

        backfill_report_coordinates(&conn, &report.id, GeoPoint::new(15.45, 36.4), Utc::now())
            .unwrap();
        let loaded = get_report(&conn, &report.id).unwrap().unwrap();
        assert_eq!(loaded.data.location_coords, Some(GeoPoint::new(15.45, 36.4)));
        let lat: f64 = conn
            .query_row("SELECT latitude FROM reports WHERE id = ?1", [report.id.to_string()], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(lat, 15.45);
    }
}
