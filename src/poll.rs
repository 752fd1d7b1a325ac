//! Poll loop: gate → watermark → fetch → parse → apply, repeated while the
//! feed keeps returning full pages.
//!
//! One call to [`PollLoop::run`] is one invocation chain. A full page means
//! there is probably more behind it, so the loop fetches again straight away,
//! up to `recursion_cap` fetches per chain.

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::apply::{Applied, Applier};
use crate::config::{Config, PolicyConfig, PollConfig};
use crate::error::CollectError;
use crate::feed::{decode_batch, decode_records, FeedSource, SessionGate};
use crate::geofence::Geofence;
use crate::plext;
use crate::store::StateStore;
use crate::watermark::WatermarkTracker;

/// Why an invocation chain stopped
#[derive(Debug)]
pub enum CycleEnd {
    /// Last page was short; caught up with the feed
    Exhausted,
    /// Hit the per-chain fetch cap while pages were still full
    CapReached,
    /// Gate or fetch failure; the next scheduled run retries
    Aborted(CollectError),
}

/// Tally of one invocation chain
#[derive(Debug)]
pub struct PollReport {
    pub fetches: u32,
    pub fetched: usize,
    pub recorded: usize,
    pub mu: usize,
    pub duplicates: usize,
    pub messages: usize,
    pub unclassified: usize,
    pub out_of_range: usize,
    pub skipped: usize,
    pub end: CycleEnd,
}

impl PollReport {
    fn new() -> Self {
        Self {
            fetches: 0,
            fetched: 0,
            recorded: 0,
            mu: 0,
            duplicates: 0,
            messages: 0,
            unclassified: 0,
            out_of_range: 0,
            skipped: 0,
            end: CycleEnd::Exhausted,
        }
    }

    fn tally(&mut self, applied: Applied) {
        match applied {
            Applied::Recorded { mu, .. } => {
                self.recorded += 1;
                if mu {
                    self.mu += 1;
                }
            }
            Applied::Duplicate => self.duplicates += 1,
            Applied::Message { .. } => self.messages += 1,
            Applied::Unclassified => self.unclassified += 1,
            Applied::OutOfRange => self.out_of_range += 1,
            Applied::Incomplete => self.skipped += 1,
        }
    }
}

pub struct PollLoop<'a> {
    store: &'a StateStore,
    feed: &'a dyn FeedSource,
    gate: &'a dyn SessionGate,
    geofence: Geofence,
    poll: PollConfig,
    policy: PolicyConfig,
    tracker: WatermarkTracker,
    invocations: u32,
}

impl<'a> PollLoop<'a> {
    pub fn new(
        store: &'a StateStore,
        feed: &'a dyn FeedSource,
        gate: &'a dyn SessionGate,
        config: &Config,
    ) -> Self {
        Self {
            store,
            feed,
            gate,
            geofence: Geofence::new(&config.geofence),
            poll: config.poll.clone(),
            policy: config.policy.clone(),
            tracker: WatermarkTracker::from_config(&config.poll),
            invocations: 0,
        }
    }

    pub fn tracker(&self) -> &WatermarkTracker {
        &self.tracker
    }

    /// Run one invocation chain. Store failures are returned as errors;
    /// everything else ends up in the report.
    pub fn run(&mut self) -> Result<PollReport> {
        let mut report = PollReport::new();
        self.invocations = 0;

        loop {
            if !self.gate.session_valid() {
                error!("session credential needs updating, skipping cycle");
                report.end = CycleEnd::Aborted(CollectError::SessionInvalid);
                return Ok(report);
            }

            self.invocations += 1;
            if self.invocations > self.poll.recursion_cap {
                warn!(cap = self.poll.recursion_cap, "fetch cap reached for this run");
                report.end = CycleEnd::CapReached;
                return Ok(report);
            }

            let since = self.tracker.next_since(self.store);
            let seconds_ago = (Utc::now().timestamp_millis() - since) / 1000;
            info!(since, seconds_ago, feed = self.feed.description(), "fetching plexts");

            let rows = match self.feed.fetch(since).and_then(|body| decode_batch(&body)) {
                Ok(rows) => rows,
                Err(e) => {
                    match &e {
                        CollectError::MalformedResponse { raw } => {
                            error!(raw = %raw, "feed response has no result")
                        }
                        other => error!(error = %other, "fetch failed"),
                    }
                    report.end = CycleEnd::Aborted(e);
                    return Ok(report);
                }
            };

            report.fetches += 1;
            report.fetched += rows.len();
            self.process(&rows, &mut report)?;

            if rows.len() < self.poll.batch_threshold {
                report.end = CycleEnd::Exhausted;
                return Ok(report);
            }
        }
    }

    fn process(&mut self, rows: &[serde_json::Value], report: &mut PollReport) -> Result<()> {
        let applier = Applier::new(self.store, &self.geofence, &self.policy);

        for record in decode_records(rows) {
            self.tracker.observe(record.timestamp_ms);

            let Some(plext) = plext::parse(&record) else {
                report.skipped += 1;
                continue;
            };
            report.tally(applier.apply(&plext)?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{OpenGate, ReplayFeed};
    use crate::store::open_temp;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    /// Hands out scripted responses and remembers what was asked for
    struct ScriptedFeed {
        responses: RefCell<VecDeque<Result<Value, CollectError>>>,
        repeat_last: Option<Value>,
        requests: RefCell<Vec<i64>>,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<Value, CollectError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                repeat_last: None,
                requests: RefCell::new(vec![]),
            }
        }

        fn always(body: Value) -> Self {
            Self {
                responses: RefCell::new(VecDeque::new()),
                repeat_last: Some(body),
                requests: RefCell::new(vec![]),
            }
        }
    }

    impl FeedSource for ScriptedFeed {
        fn description(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, since_ms: i64) -> Result<Value, CollectError> {
            self.requests.borrow_mut().push(since_ms);
            match self.responses.borrow_mut().pop_front() {
                Some(r) => r,
                None => Ok(self
                    .repeat_last
                    .clone()
                    .unwrap_or_else(|| json!({ "result": [] }))),
            }
        }
    }

    struct ClosedGate;

    impl SessionGate for ClosedGate {
        fn session_valid(&self) -> bool {
            false
        }
    }

    const BASE: i64 = 1_500_000_000_000;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.poll.floor_timestamp_ms = 0;
        // keep the lookback window from overtaking fixed test timestamps
        config.poll.lookback_hours = 24 * 365 * 200;
        config.poll.batch_threshold = 2;
        config
    }

    fn deploy_row(guid: &str, ts: i64, player: &str) -> Value {
        json!([guid, ts, { "plext": {
            "text": format!("{} deployed an L8 Resonator on Alpha", player),
            "markup": [
                ["PLAYER", { "plain": player, "team": "RESISTANCE" }],
                ["TEXT", { "plain": " deployed an " }],
                ["TEXT", { "plain": "L8" }],
                ["PORTAL", { "name": "Alpha", "team": "RESISTANCE", "latE6": 40_000_000, "lngE6": 116_000_000 }],
            ]
        }}])
    }

    #[test]
    fn test_closed_gate_aborts_before_fetch() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::new(vec![]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &ClosedGate, &config);

        let report = poll.run().unwrap();
        assert!(matches!(report.end, CycleEnd::Aborted(CollectError::SessionInvalid)));
        assert!(feed.requests.borrow().is_empty());
    }

    #[test]
    fn test_malformed_response_aborts_cycle() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::new(vec![Ok(json!({ "error": "out of date" }))]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        match report.end {
            CycleEnd::Aborted(CollectError::MalformedResponse { raw }) => {
                assert!(raw.contains("out of date"))
            }
            other => panic!("unexpected end: {other:?}"),
        }
        assert_eq!(report.fetches, 0);
    }

    #[test]
    fn test_transport_error_aborts_cycle() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::new(vec![Err(CollectError::Transport("refused".to_string()))]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert!(matches!(report.end, CycleEnd::Aborted(CollectError::Transport(_))));
    }

    #[test]
    fn test_short_page_ends_chain() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::new(vec![Ok(json!({ "result": [deploy_row("g1", BASE, "P1")] }))]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert!(matches!(report.end, CycleEnd::Exhausted));
        assert_eq!(report.fetches, 1);
        assert_eq!(report.recorded, 1);
        assert!(store.get_player("P1").unwrap().unwrap().over_lv8);
    }

    #[test]
    fn test_full_pages_stop_at_cap() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::always(json!({ "result": [
            deploy_row("g1", BASE, "P1"),
            deploy_row("g2", BASE + 1, "P2"),
        ]}));
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert!(matches!(report.end, CycleEnd::CapReached));
        assert_eq!(report.fetches, 8);
        assert_eq!(report.recorded, 2);
        assert_eq!(report.duplicates, 14);
        assert_eq!(store.counts().unwrap().actions, 2);

        // the cap is per chain, not per process
        let report = poll.run().unwrap();
        assert_eq!(report.fetches, 8);
    }

    #[test]
    fn test_full_page_fetches_next_window() {
        let (_dir, store) = open_temp();
        let feed = ScriptedFeed::new(vec![
            Ok(json!({ "result": [deploy_row("g1", BASE, "P1"), deploy_row("g2", BASE + 5, "P1")] })),
            Ok(json!({ "result": [deploy_row("g3", BASE + 9, "P1")] })),
        ]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert_eq!(report.fetches, 2);
        assert_eq!(report.recorded, 3);
        let requests = feed.requests.borrow();
        assert_eq!(requests[1], BASE + 6);
    }

    #[test]
    fn test_skipped_records_still_advance_watermark() {
        let (_dir, store) = open_temp();
        let textless = json!(["g9", BASE + 100, { "plext": { "markup": [] } }]);
        let feed = ScriptedFeed::new(vec![
            Ok(json!({ "result": [deploy_row("g1", BASE, "P1"), textless] })),
            Ok(json!({ "result": [] })),
        ]);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(poll.tracker().high_watermark(), BASE + 100);
        assert_eq!(feed.requests.borrow()[1], BASE + 100);
    }

    #[test]
    fn test_replay_walks_saved_response() {
        let (_dir, store) = open_temp();
        let rows: Vec<Value> = (0..5)
            .map(|i| deploy_row(&format!("g{}", i), BASE + i * 10, "P1"))
            .collect();
        let feed = ReplayFeed::from_rows(Path::new("saved.json"), rows, 2);
        let config = test_config();
        let mut poll = PollLoop::new(&store, &feed, &OpenGate, &config);

        let report = poll.run().unwrap();
        assert!(matches!(report.end, CycleEnd::Exhausted));
        assert_eq!(report.fetches, 3);
        assert_eq!(report.recorded, 5);

        // a second run over the same file changes nothing
        let counts = store.counts().unwrap();
        poll.run().unwrap();
        assert_eq!(store.counts().unwrap(), counts);
    }
}
