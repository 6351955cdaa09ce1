use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classification::Classification;
use super::enums::{ConversationMode, HandoffTarget, Language, MessageRole, Platform};
use super::extraction::ExtractedData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One active dialogue with a reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: Uuid,
    /// Salted hash of the transport identifier, never the raw value.
    pub reporter_hash: String,
    pub platform: Platform,
    pub messages: Vec<ConversationMessage>,
    pub mode: ConversationMode,
    pub language: Language,
    pub extracted: ExtractedData,
    pub classification: Option<Classification>,
    pub pending_response: Option<String>,
    pub handoff: Option<HandoffTarget>,
    pub error: Option<String>,
    pub turn_count: u32,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Report created from this conversation. Set exactly once.
    #[serde(default)]
    pub report_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(reporter_hash: &str, platform: Platform, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reporter_hash: reporter_hash.to_string(),
            platform,
            messages: Vec::new(),
            mode: ConversationMode::Listening,
            language: Language::Unknown,
            extracted: ExtractedData::default(),
            classification: None,
            pending_response: None,
            handoff: None,
            error: None,
            turn_count: 0,
            consecutive_failures: 0,
            report_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_user(&mut self, text: &str, at: DateTime<Utc>) {
        self.push(MessageRole::User, text, at);
    }

    pub fn push_assistant(&mut self, text: &str, at: DateTime<Utc>) {
        self.push(MessageRole::Assistant, text, at);
    }

    fn push(&mut self, role: MessageRole, text: &str, at: DateTime<Utc>) {
        self.messages.push(ConversationMessage {
            role,
            content: text.to_string(),
            timestamp: at,
        });
        self.updated_at = at;
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    /// Consumed for classification: a report exists for it.
    pub fn is_consumed(&self) -> bool {
        self.report_id.is_some()
    }

    /// Complete but its report was never written (crash between the two).
    pub fn awaiting_handoff(&self) -> bool {
        self.mode == ConversationMode::Complete && !self.is_consumed()
    }

    /// Nothing left to do; the next inbound message starts a fresh conversation.
    pub fn is_finished(&self) -> bool {
        match self.mode {
            ConversationMode::Error => true,
            ConversationMode::Complete => self.is_consumed(),
            _ => false,
        }
    }
}
