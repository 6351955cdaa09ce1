use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::OracleError;
use crate::models::enums::MessageRole;
use crate::models::ConversationMessage;
use crate::pipeline_config::CallProfile;

/// One turn of context handed to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleMessage {
    pub role: MessageRole,
    pub content: String,
}

impl OracleMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

impl From<&ConversationMessage> for OracleMessage {
    fn from(m: &ConversationMessage) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// A single text-in/text-out request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub messages: Vec<OracleMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl OracleRequest {
    pub fn new(system: String, messages: Vec<OracleMessage>, profile: &CallProfile) -> Self {
        Self {
            system,
            messages,
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            timeout: profile.timeout(),
        }
    }
}

/// Language model treated as a black box. Implementations must honor
/// `request.timeout` and return `OracleError::Timeout` when it is exceeded.
pub trait Oracle: Send + Sync {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}
