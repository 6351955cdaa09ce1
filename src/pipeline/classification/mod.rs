//! Classification engine: oracle proposal fused with a deterministic
//! urgency floor. Final urgency is never below what the rules demand.

pub mod prompt;
pub mod rules;
pub mod engine;

pub use prompt::*;
pub use rules::*;
pub use engine::*;
