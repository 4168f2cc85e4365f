//! Asset custody domain logic.
//!
//! Pure domain types, the transfer validator, the movement ledger contract,
//! query and pagination rules, statistics, and an in-memory ledger backend.
//! Persistence for Postgres lives in `custody-db`; HTTP in `custody-api`.

pub mod annotation;
pub mod error;
pub mod ledger;
pub mod listing;
pub mod locks;
pub mod memory;
pub mod movement;
pub mod statistics;
pub mod transfer;
pub mod types;
pub mod validator;
