// Library interface for testing

// Declare all modules
pub mod activity;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod playback;
pub mod queries;
pub mod report;
pub mod schema;
pub mod serve;
pub mod stage;
pub mod tables;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
