//! Conversation state machine.
//!
//! The dialogue oracle proposes; the machine disposes. Each inbound message
//! runs one step: detect language, ask the oracle, parse, merge the partial
//! extraction, score completeness, then apply only the mode transitions the
//! legality table allows.

pub mod prompt;
pub mod reply;
pub mod machine;

pub use prompt::*;
pub use reply::*;
pub use machine::*;
