//! SQL statement builders.
//!
//! Each function renders one statement with sea-query and returns it as a
//! string ready for `sqlx::query`.

pub mod activity;
pub mod admins;
pub mod candidates;
pub mod ddl;
pub mod metadata;
pub mod report;
pub mod schedule;
pub mod tables;
