pub mod oracle;
pub mod extraction;
pub mod dialogue;
pub mod classification;
pub mod linking;
pub mod notify;
pub mod identity;
pub mod error;
pub mod traits;
pub mod orchestrator;
pub mod worker; // async queue consumer with per-message ceiling


pub use error::PipelineError;
pub use orchestrator::{InboundMessage, Pipeline, PipelineDeps, ProcessOutcome, Route};
pub use worker::{MetricsSnapshot, Worker, WorkerMetrics};
