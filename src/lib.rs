// ABOUTME: Main library for the SQL Steward administration tool
// ABOUTME: Module declarations and public re-exports

pub mod admin;
pub mod config;
pub mod db;
pub mod frame;

pub use admin::ServerAdmin;
pub use db::{AdminConnection, AdminError, ConflictPolicy};
pub use frame::{ColumnDef, ColumnType, DataFrame, FrameError, Value};
