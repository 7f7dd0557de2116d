//! Instance modeling over a built [`Schema`](crate::schema::Schema).
//!
//! A [`Session`] owns the entities and structured-property records of one
//! model. Relations are type-checked when attached; records are checked
//! against their shape when built.

pub mod entity;
pub mod record;
pub mod session;

pub use entity::{EntityId, EntityInstance, EntityRef, RecordId, Target};
pub use record::{FieldInput, FieldValue, RecordBuilder, StructuredPropertyInstance};
pub use session::Session;
