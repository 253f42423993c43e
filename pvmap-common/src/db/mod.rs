//! Database access layer shared by the PVMAP services

pub mod init;
pub mod models;
pub mod settings;

pub use init::init_database;
