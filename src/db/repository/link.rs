use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::LinkType;
use crate::models::ReportLink;

/// Insert a link unless the same (pair, type) already exists.
/// Returns `true` when a row was written; a duplicate is a no-op.
pub fn insert_link(conn: &Connection, link: &ReportLink) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO report_links (id, report_a, report_b, link_type, confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            link.id.to_string(),
            link.report_a.to_string(),
            link.report_b.to_string(),
            link.link_type.as_str(),
            link.confidence,
            link.created_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Links touching a report on either side, strongest first.
pub fn get_links_for_report(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<ReportLink>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, report_a, report_b, link_type, confidence, created_at
         FROM report_links
         WHERE report_a = ?1 OR report_b = ?1
         ORDER BY confidence DESC",
    )?;
    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        Ok(LinkRow {
            id: row.get(0)?,
            report_a: row.get(1)?,
            report_b: row.get(2)?,
            link_type: row.get(3)?,
            confidence: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut links = Vec::new();
    for row in rows {
        links.push(link_from_row(row?)?);
    }
    Ok(links)
}

struct LinkRow {
    id: String,
    report_a: String,
    report_b: String,
    link_type: String,
    confidence: f64,
    created_at: DateTime<Utc>,
}

fn link_from_row(row: LinkRow) -> Result<ReportLink, DatabaseError> {
    Ok(ReportLink {
        id: parse_uuid("report_link.id", &row.id)?,
        report_a: parse_uuid("report_link.report_a", &row.report_a)?,
        report_b: parse_uuid("report_link.report_b", &row.report_b)?,
        link_type: LinkType::from_str(&row.link_type)?,
        confidence: row.confidence,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::report::tests::make_report;
    use crate::db::repository::insert_report;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::DiseaseType;

    fn two_reports(conn: &Connection) -> (Uuid, Uuid) {
        let a = make_report(Utc::now(), DiseaseType::Cholera);
        let b = make_report(Utc::now(), DiseaseType::Cholera);
        insert_report(conn, &a).unwrap();
        insert_report(conn, &b).unwrap();
        (a.id, b.id)
    }

    #[test]
    fn duplicate_link_is_noop() {
        let conn = open_memory_database().unwrap();
        let (a, b) = two_reports(&conn);
        let first = ReportLink::new(a, b, LinkType::Geographic, 0.8, Utc::now()).unwrap();
        let again = ReportLink::new(b, a, LinkType::Geographic, 0.6, Utc::now()).unwrap();

        assert!(insert_link(&conn, &first).unwrap());
        assert!(!insert_link(&conn, &again).unwrap());
        assert_eq!(get_links_for_report(&conn, &a).unwrap().len(), 1);
    }

    #[test]
    fn different_types_coexist() {
        let conn = open_memory_database().unwrap();
        let (a, b) = two_reports(&conn);
        let geo = ReportLink::new(a, b, LinkType::Geographic, 0.8, Utc::now()).unwrap();
        let manual = ReportLink::new(a, b, LinkType::Manual, 1.0, Utc::now()).unwrap();
        assert!(insert_link(&conn, &geo).unwrap());
        assert!(insert_link(&conn, &manual).unwrap());

        let links = get_links_for_report(&conn, &b).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].link_type, LinkType::Manual);
    }

    #[test]
    fn link_to_missing_report_fails() {
        let conn = open_memory_database().unwrap();
        let (a, _) = two_reports(&conn);
        let dangling = ReportLink::new(a, Uuid::new_v4(), LinkType::Temporal, 0.3, Utc::now())
            .unwrap();
        assert!(insert_link(&conn, &dangling).is_err());
    }
}
