pub mod types;
pub mod ollama;
pub mod parser;

pub use types::*;
pub use ollama::*;
pub use parser::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle is not reachable at {0}")]
    Connection(String),

    #[error("Oracle call timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// Short machine label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "status",
            Self::HttpClient(_) => "http_client",
            Self::ResponseParsing(_) => "response_parsing",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
