//! Change-feed listener: watches the unprocessed notification view and hands
//! each newly added record to the dispatcher exactly once per subscription.

pub mod feed;
pub mod listener;
pub mod live;
pub mod poller;
pub mod scripted;

pub use feed::{ChangeEvent, ChangeKind, ChangeSource, ViewTracker};
pub use listener::{ChangeFeedListener, ListenerStats};
pub use live::PgChangeFeed;
pub use poller::PollingFeed;
pub use scripted::{ScriptHandle, ScriptedFeed};
