//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` (reads) or `&mut PgConnection` (writes inside a transaction) as
//! the first argument.

pub mod annotation_repo;
pub mod asset_repo;
pub mod directory_repo;
pub mod movement_repo;

pub use annotation_repo::AnnotationRepo;
pub use asset_repo::AssetRepo;
pub use directory_repo::{LocationRepo, UserRepo};
pub use movement_repo::MovementRepo;
