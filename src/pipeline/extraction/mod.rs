pub mod completeness;
pub mod language;
pub mod merge;

pub use completeness::*;
pub use language::*;
pub use merge::*;
