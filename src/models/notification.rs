use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Language, UrgencyLevel};

/// Health officer who receives report notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub language: Language,
}

/// Stored notification. `officer_id` is `None` for the broadcast copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub report_id: Uuid,
    pub officer_id: Option<Uuid>,
    pub urgency: UrgencyLevel,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Fire-and-forget event handed to the real-time collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub report_id: Uuid,
    pub urgency: UrgencyLevel,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}
