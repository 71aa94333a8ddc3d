// ABOUTME: Database module exports for SQL Steward
// ABOUTME: Contains the MySQL connection layer used by the administrator

pub mod mysql;

pub use mysql::{AdminConnection, AdminError, ConflictPolicy};
