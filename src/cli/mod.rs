pub mod actions;
pub mod collect;
pub mod players;
pub mod portals;
pub mod stats;
