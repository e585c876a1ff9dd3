//! Notification fan-out: channel senders, the dispatch coordinator and the
//! live dashboard hub.

pub mod channels;
pub mod dispatcher;
pub mod hub;

pub use channels::{ChannelError, ChannelSender, build_senders};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use hub::{DASHBOARD_CAPACITY, DashboardHub};
