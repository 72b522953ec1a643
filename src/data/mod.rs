//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - The `Repository` trait consumed by queue workers

mod database;
mod models;
mod repository;

pub use database::Database;
pub use models::*;
pub use repository::Repository;

#[cfg(test)]
pub use repository::MockRepository;
