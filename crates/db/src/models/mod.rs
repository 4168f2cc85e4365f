//! Row structs and DTOs.
//!
//! Each submodule contains `FromRow` structs matching the database rows and
//! the `Deserialize` inputs used to insert them.

pub mod directory;
pub mod movement;
