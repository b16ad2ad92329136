//! Database Backend Abstractions
//!
//! The migrator is written against the traits in `core`; `postgres` is the
//! sqlx-backed implementation used in production.

pub mod core;
pub mod postgres;

pub use self::core::*;
pub use self::postgres::{validate_database_url, PostgresPool, PostgresRow, PostgresTransaction};
