use std::str::FromStr;

use rusqlite::{params, Connection};

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::Language;
use crate::models::Officer;

pub fn insert_officer(conn: &Connection, officer: &Officer) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO officers (id, name, active, language) VALUES (?1, ?2, ?3, ?4)",
        params![
            officer.id.to_string(),
            officer.name,
            officer.active as i32,
            officer.language.as_str(),
        ],
    )?;
    Ok(())
}

pub fn list_active_officers(conn: &Connection) -> Result<Vec<Officer>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, active, language FROM officers WHERE active = 1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut officers = Vec::new();
    for row in rows {
        let (id, name, active, language) = row?;
        officers.push(Officer {
            id: parse_uuid("officer.id", &id)?,
            name,
            active: active != 0,
            language: Language::from_str(&language)?,
        });
    }
    Ok(officers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use uuid::Uuid;

    fn officer(name: &str, active: bool) -> Officer {
        Officer {
            id: Uuid::new_v4(),
            name: name.into(),
            active,
            language: Language::En,
        }
    }

    #[test]
    fn only_active_officers_are_listed() {
        let conn = open_memory_database().unwrap();
        insert_officer(&conn, &officer("Amal", true)).unwrap();
        insert_officer(&conn, &officer("Bashir", false)).unwrap();

        let active = list_active_officers(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Amal");
    }
}
