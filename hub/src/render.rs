//! Scrape rendering worker pool.
//!
//! Families are rendered by a bounded pool of workers feeding a single
//! aggregator; the caller awaits the aggregate under a timeout. On
//! timeout the in-flight workers are abandoned: they complete against a
//! dropped receiver and their output is discarded.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::MetricFamily;
use tokio::sync::mpsc;

/// Renders the given families with up to `parallelism` workers,
/// returning the concatenated exposition text. Family order in the
/// output is unspecified; per-family sample order is preserved. Returns
/// the empty string when the timeout fires first.
pub async fn render(
    families: Vec<MetricFamily>,
    parallelism: usize,
    timeout: Duration,
) -> String {
    if families.is_empty() {
        return String::new();
    }

    let workers = parallelism.min(families.len()).max(1);
    let queue = Arc::new(Mutex::new(families));
    let (blocks_tx, mut blocks_rx) = mpsc::unbounded_channel::<String>();

    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let blocks_tx = blocks_tx.clone();
        tokio::spawn(async move {
            loop {
                let family = queue.lock().unwrap().pop();
                let Some(family) = family else { break };
                match exposition::render_family(&family) {
                    // A send error means the scrape timed out; drop the block.
                    Ok(block) => {
                        let _ = blocks_tx.send(block);
                    }
                    Err(err) => {
                        tracing::warn!(family = %family.name, "metric family dropped: {}", err);
                    }
                }
            }
        });
    }
    drop(blocks_tx);

    let aggregator = tokio::spawn(async move {
        let mut out = String::new();
        while let Some(block) = blocks_rx.recv().await {
            out.push_str(&block);
        }
        out
    });

    match tokio::time::timeout(timeout, aggregator).await {
        Ok(Ok(out)) => out,
        Ok(Err(join_err)) => {
            tracing::warn!("scrape aggregator failed: {}", join_err);
            String::new()
        }
        Err(_) => {
            tracing::warn!("timeout reached while building scrape response");
            String::new()
        }
    }
}
