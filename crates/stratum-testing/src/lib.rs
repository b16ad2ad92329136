//! # stratum-testing
//!
//! Helpers shared by the stratum test suites:
//!
//! - [`MockDatabase`]: in-memory backend that understands the bookkeeping
//!   statements and records everything it executes
//! - [`TestDirectory`]: temporary migrations directory with file helpers
//! - [`TestDatabase`]: PostgreSQL connection for tests marked `#[ignore]`

pub mod database;
pub mod filesystem;
pub mod mock;

pub use database::{test_table_name, TestDatabase};
pub use filesystem::TestDirectory;
pub use mock::{MockDatabase, MockRow, MockTransaction};
