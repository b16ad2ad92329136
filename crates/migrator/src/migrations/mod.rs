//! Migration System
//!
//! `scanner` finds migration files, `bookkeeping` tracks what was applied,
//! `loader` turns files into runnable bodies and `runner` ties them together
//! in the `Migrator`.

pub mod bookkeeping;
pub mod definitions;
pub mod loader;
pub mod manager;
pub mod runner;
pub mod scanner;

pub use bookkeeping::{base_name, Bookkeeping};
pub use definitions::*;
pub use loader::*;
pub use manager::create_migration;
pub use runner::Migrator;
pub use scanner::{resolve_directory, scan_directory};
