use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Platform;
use crate::models::ConversationState;

/// Insert or replace the stored state, pushing its expiry forward.
pub fn save_conversation(
    conn: &Connection,
    state: &ConversationState,
    expires_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let state_json = serde_json::to_string(state)?;
    conn.execute(
        "INSERT INTO conversation_states
         (id, platform, reporter_hash, mode, report_id, state_json, updated_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            mode = excluded.mode,
            report_id = excluded.report_id,
            state_json = excluded.state_json,
            updated_at = excluded.updated_at,
            expires_at = excluded.expires_at",
        params![
            state.id.to_string(),
            state.platform.as_str(),
            state.reporter_hash,
            state.mode.as_str(),
            state.report_id.map(|id| id.to_string()),
            state_json,
            state.updated_at,
            expires_at,
        ],
    )?;
    Ok(())
}

pub fn get_conversation(
    conn: &Connection,
    id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Option<ConversationState>, DatabaseError> {
    let result = conn.query_row(
        "SELECT state_json FROM conversation_states WHERE id = ?1 AND expires_at > ?2",
        params![id.to_string(), now],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Most recently touched, unexpired conversation for a reporter on a platform.
pub fn load_latest_conversation(
    conn: &Connection,
    platform: Platform,
    reporter_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<ConversationState>, DatabaseError> {
    let result = conn.query_row(
        "SELECT state_json FROM conversation_states
         WHERE platform = ?1 AND reporter_hash = ?2 AND expires_at > ?3
         ORDER BY updated_at DESC
         LIMIT 1",
        params![platform.as_str(), reporter_hash, now],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Completed conversations whose report was never created, expired or not.
pub fn list_pending_handoffs(conn: &Connection) -> Result<Vec<ConversationState>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT state_json FROM conversation_states
         WHERE mode = 'complete' AND report_id IS NULL
         ORDER BY updated_at ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut states = Vec::new();
    for json in rows {
        states.push(serde_json::from_str(&json?)?);
    }
    Ok(states)
}

/// Remove expired rows. A completed conversation still waiting for its
/// report is kept. Returns the number deleted.
pub fn purge_expired_conversations(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM conversation_states
         WHERE expires_at <= ?1
           AND NOT (mode = 'complete' AND report_id IS NULL)",
        params![now],
    )?;
    Ok(deleted)
}
