//! Request extractors shared by handlers.
//!
//! - [`acting_user::ActingUser`] -- Identifies the user performing a request.

pub mod acting_user;
