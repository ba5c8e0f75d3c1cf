//! Hub orchestration: admission control, counters, and scrape semantics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Clock, FamilyBatch, SystemClock};

use crate::error::{HubError, Result};
use crate::metrics::Metrics;
use crate::render;
use crate::store::{Store, StoreCounts};

/// Worker-pool size for scrape rendering. Fixed to cap fan-out cost
/// regardless of family count.
pub const SCRAPE_WORKER_POOL_SIZE: usize = 100;

/// Snapshot counters describing recent hub activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubStats {
    pub last_scrape_time: i64,
    pub last_scrape_size: i64,
    pub last_scrape_num_families: usize,

    pub last_receive_time: i64,
    pub last_receive_size: i64,
    pub last_receive_num_families: usize,

    pub current_count_datapoints: usize,
}

struct HubState {
    store: Store,
    stats: HubStats,
}

/// The buffering hub. Accepts timestamped pushes, stores them in
/// per-series queues so multiple datapoints per series can be scraped,
/// and drains on scrape.
///
/// One mutex guards the store and the counters together: admission
/// checks, merges, counter updates and the `hub_size` gauge write all
/// happen under it. Parsing and rendering happen outside the lock.
pub struct MetricHub {
    state: Mutex<HubState>,
    limit: i64,
    scrape_timeout: Duration,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl MetricHub {
    pub fn new(limit: i64, scrape_timeout: Duration) -> Self {
        Self::with_clock(limit, scrape_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: i64, scrape_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        if limit > 0 {
            tracing::info!(limit, "metrics hub created with a limit");
        } else {
            tracing::info!("metrics hub created with no limit");
        }

        let metrics = Metrics::new();
        metrics.set_limit(limit);

        Self {
            state: Mutex::new(HubState {
                store: Store::new(),
                stats: HubStats::default(),
            }),
            limit,
            scrape_timeout,
            clock,
            metrics,
        }
    }

    /// The hub's own scrapeable gauges.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Parses and admits a text exposition push.
    pub fn receive_text(&self, body: &[u8]) -> Result<()> {
        let batch = exposition::parse(body)?;
        self.admit(batch, body.len())
    }

    /// Admits an already-decoded push (the RPC path). `received_bytes` is
    /// the decoded frame length, recorded in the receive stats.
    pub fn receive_families(&self, batch: FamilyBatch, received_bytes: usize) -> Result<()> {
        self.admit(batch, received_bytes)
    }

    fn admit(&self, batch: FamilyBatch, received_bytes: usize) -> Result<()> {
        let incoming: usize = batch.values().map(|family| family.samples.len()).sum();
        let num_families = batch.len();

        let mut state = self.state.lock().unwrap();

        if self.limit > 0
            && (state.stats.current_count_datapoints + incoming) as i64 > self.limit
        {
            let err = HubError::Overfill {
                incoming,
                limit: self.limit as usize,
                current: state.stats.current_count_datapoints,
            };
            tracing::error!("{}", err);
            return Err(err);
        }

        let merged = state.store.merge(batch);
        state.stats.last_receive_time = self.clock.now_secs();
        state.stats.last_receive_size = received_bytes as i64;
        state.stats.last_receive_num_families = num_families;
        state.stats.current_count_datapoints += merged;
        self.metrics.set_size(state.stats.current_count_datapoints);

        Ok(())
    }

    /// Drains the store and renders its contents for the collector.
    ///
    /// The store is cleared before rendering completes, so a render
    /// timeout returns an empty body and the drained samples are lost.
    pub async fn scrape(&self) -> String {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            let snapshot = state.store.drain();
            state.stats.current_count_datapoints = 0;
            self.metrics.set_size(0);
            snapshot
        };
        let num_families = snapshot.num_families();

        let text = render::render(
            snapshot.flatten(),
            SCRAPE_WORKER_POOL_SIZE,
            self.scrape_timeout,
        )
        .await;

        let mut state = self.state.lock().unwrap();
        state.stats.last_scrape_time = self.clock.now_secs();
        state.stats.last_scrape_size = text.len() as i64;
        state.stats.last_scrape_num_families = num_families;

        text
    }

    /// Builds the human-readable debug report without draining. Verbose
    /// appends a rendering of the live store.
    pub async fn debug_report(&self, verbose: bool) -> String {
        let (counts, stats, live) = {
            let state = self.state.lock().unwrap();
            let live = verbose.then(|| state.store.clone());
            (state.store.count(), state.stats, live)
        };

        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let (limit_value, utilization) = if self.limit <= 0 {
            ("None".to_string(), "0".to_string())
        } else {
            (
                self.limit.to_string(),
                format!("{:.2}", counts.samples as f64 * 100.0 / self.limit as f64),
            )
        };

        let mut report = format!(
            "Metrics edge hub running on {}\n\
             Hub Limit:       {}\n\
             Hub Utilization: {}%\n\
             \n\
             Last Scrape: {}\n\
             \tScrape Size: {}\n\
             \tNumber of Families: {}\n\
             \n\
             Last Receive: {}\n\
             \tReceive Size: {}\n\
             \tNumber of Families: {}\n\
             \n\
             Current Count Families:   {}\n\
             Current Count Series:     {}\n\
             Current Count Datapoints: {}",
            hostname,
            limit_value,
            utilization,
            stats.last_scrape_time,
            stats.last_scrape_size,
            stats.last_scrape_num_families,
            stats.last_receive_time,
            stats.last_receive_size,
            stats.last_receive_num_families,
            counts.families,
            counts.series,
            counts.samples,
        );

        if let Some(live) = live {
            let text = render::render(
                live.flatten(),
                SCRAPE_WORKER_POOL_SIZE,
                self.scrape_timeout,
            )
            .await;
            report.push_str("\n\nCurrent Exposition Text:\n");
            report.push_str(&text);
        }

        report
    }

    /// Current counters; counts are recomputed from the live store.
    pub fn counts(&self) -> StoreCounts {
        self.state.lock().unwrap().store.count()
    }

    pub fn stats(&self) -> HubStats {
        self.state.lock().unwrap().stats
    }
}
