//! Store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the account-scoped capability set the scheduler consumes.
//! - Define the routine catalog CRUD the surrounding app performs.
//! - Keep SQL details behind the SQLite implementation.
//!
//! # Invariants
//! - Write paths validate model records before persistence.
//! - Every read is scoped by account id; no cross-account visibility.

pub mod catalog;
pub mod memory_store;
pub mod sqlite_store;
pub mod store;
