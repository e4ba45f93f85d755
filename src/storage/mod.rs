//! Relational storage for accounts, categories, emails, templates and threads.
//!
//! - SQLite database accessed through rusqlite
//! - Async-safe operations via tokio::task::spawn_blocking
//! - One query module per entity under [`queries`]

mod database;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};
