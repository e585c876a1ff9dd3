//! HTTP surface and push endpoint for the notification service.

pub mod routes;
pub mod state;
pub mod ws;
