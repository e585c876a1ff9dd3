//! Shared building blocks for the Wager notification services: configuration,
//! the error taxonomy, the notification data model and the upstream record
//! store.

pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod summary;
pub mod types;
