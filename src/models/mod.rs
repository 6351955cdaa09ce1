pub mod enums;
pub mod extraction;
pub mod classification;
pub mod conversation;
pub mod report;
pub mod notification;

pub use extraction::*;
pub use classification::*;
pub use conversation::*;
pub use report::*;
pub use notification::*;
