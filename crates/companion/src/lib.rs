//! Desktop companion: follows the notifier's push endpoint and turns live
//! notifications into native desktop alerts.

pub mod alert;
pub mod backoff;
pub mod client;
pub mod forwarder;

pub use alert::{AlertRenderer, DesktopAlert, DesktopRenderer, LogRenderer};
pub use backoff::{BackoffConfig, next_delay};
pub use client::{ClientError, PushClient, PushConnection};
pub use forwarder::{ConnectionState, Forwarder, ForwarderStats};
