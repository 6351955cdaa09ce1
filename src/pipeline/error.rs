use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::messaging::GatewayError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Report creation failed for conversation {conversation_id}: {reason}")]
    ReportCreation {
        conversation_id: Uuid,
        reason: String,
    },

    #[error("Processing exceeded {0}s ceiling")]
    Timeout(u64),

    #[error("Worker task failed: {0}")]
    Worker(String),
}
