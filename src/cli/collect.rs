//! Collect and watch command implementation

use anyhow::Result;
use tracing::error;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::feed::{FeedSource, IntelFeed, OpenGate, ReplayFeed, SessionGate};
use crate::geofence::Geofence;
use crate::poll::{CycleEnd, PollLoop, PollReport};
use crate::store::StateStore;

/// One invocation chain against the live feed or a replay file
pub fn run(store: &StateStore, config: &Config, replay: Option<&Path>) -> Result<()> {
    with_feed(config, replay, |feed, gate| {
        println!("📡 {}", feed.description());
        let mut poll = PollLoop::new(store, feed, gate, config);
        let report = poll.run()?;
        print_report(&report);
        Ok(())
    })
}

/// Re-run the chain every `interval`, sharing one watermark tracker
pub fn watch(
    store: &StateStore,
    config: &Config,
    replay: Option<&Path>,
    interval: Duration,
    ticks: Option<u32>,
) -> Result<()> {
    with_feed(config, replay, |feed, gate| {
        println!("📡 {} (every {}s)", feed.description(), interval.as_secs());
        let mut poll = PollLoop::new(store, feed, gate, config);
        let mut tick = 0;

        loop {
            tick += 1;
            match poll.run() {
                Ok(report) => print_report(&report),
                Err(e) => error!(error = %e, "collect run failed"),
            }

            if ticks.map_or(false, |n| tick >= n) {
                return Ok(());
            }
            std::thread::sleep(interval);
        }
    })
}

fn with_feed<F>(config: &Config, replay: Option<&Path>, f: F) -> Result<()>
where
    F: FnOnce(&dyn FeedSource, &dyn SessionGate) -> Result<()>,
{
    match replay {
        Some(path) => {
            let feed = ReplayFeed::open(path, config.feed.replay_page_size)?;
            if feed.is_empty() {
                println!("⚠️  {} holds no records", path.display());
            } else {
                println!("📼 {} records loaded from {}", feed.len(), path.display());
            }
            f(&feed, &OpenGate)
        }
        None => {
            let feed = IntelFeed::new(
                &config.feed,
                &config.credentials,
                Geofence::new(&config.geofence),
            )?;
            f(&feed, &config.credentials)
        }
    }
}

fn print_report(report: &PollReport) {
    println!(
        "   {} fetches, {} records: {} recorded ({} MU), {} duplicate, {} chat, {} unclassified, {} out of range, {} skipped",
        report.fetches,
        report.fetched,
        report.recorded,
        report.mu,
        report.duplicates,
        report.messages,
        report.unclassified,
        report.out_of_range,
        report.skipped,
    );

    match &report.end {
        CycleEnd::Exhausted => println!("✅ Caught up with the feed"),
        CycleEnd::CapReached => println!("⏸  Fetch cap reached, more records pending"),
        CycleEnd::Aborted(e) => println!("❌ Cycle aborted: {}", e),
    }
}
