//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`; `SqliteStore` composes them
//! behind the pipeline's store traits.

mod conversation;
mod link;
mod notification;
mod officer;
mod report;

pub use conversation::*;
pub use link::*;
pub use notification::*;
pub use officer::*;
pub use report::*;

use uuid::Uuid;

use super::DatabaseError;

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::InvalidEnum {
        field: field.into(),
        value: raw.into(),
    })
}
