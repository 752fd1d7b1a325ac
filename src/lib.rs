pub mod apply;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod geofence;
pub mod plext;
pub mod poll;
pub mod store;
pub mod watermark;

pub use apply::{Applied, Applier};
pub use config::Config;
pub use error::CollectError;
pub use feed::{FeedSource, SessionGate};
pub use poll::{CycleEnd, PollLoop, PollReport};
pub use store::StateStore;
