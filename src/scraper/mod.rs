//! The polling engine: periodic selection of due sources, claim-before-fetch
//! reservation, and a bounded fan-out of per-feed workers.

mod normalize;
mod worker;

pub use normalize::{normalize_item, NormalizeError};
pub use worker::{scrape_feed, ScrapeOutcome};

use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::watch;

use crate::storage::Database;

/// Aggregate counts for one scrape cycle.
#[derive(Debug, Default)]
pub struct CycleSummary {
    /// Workers dispatched this cycle (never exceeds the concurrency limit)
    pub dispatched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives scrape cycles at a fixed interval.
///
/// Constructed once with its dependencies; holds no global state. Each
/// cycle selects up to `concurrency` due sources, claims each one by
/// stamping `last_fetched_at` before any network I/O, fans out one worker
/// per source, and waits for all of them before the next tick. A slow
/// cycle therefore delays, but never overlaps, the next one.
pub struct Scraper {
    db: Database,
    client: reqwest::Client,
    interval: Duration,
    concurrency: u32,
    request_timeout: Duration,
}

impl Scraper {
    pub fn new(
        db: Database,
        client: reqwest::Client,
        interval: Duration,
        concurrency: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            db,
            client,
            interval,
            concurrency,
            request_timeout,
        }
    }

    /// Run scrape cycles until the shutdown channel fires.
    ///
    /// The first cycle starts immediately. Shutdown is observed between
    /// cycles only: a cycle in flight runs its workers to completion, and
    /// no new batch is dispatched afterwards.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            concurrency = self.concurrency,
            "Starting scraper"
        );

        let mut ticker = tokio::time::interval(self.interval);
        // A cycle longer than the interval delays the next tick instead of
        // bursting to catch up
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown requested, stopping scraper");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Execute one cycle: select, claim, fan out, fan in.
    ///
    /// A selection failure skips the whole cycle; a claim failure drops
    /// just that source from the batch. Neither aborts the loop.
    pub async fn run_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let sources = match self.db.next_due(self.concurrency).await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select due feeds, skipping cycle");
                return summary;
            }
        };

        if sources.is_empty() {
            tracing::debug!("No feeds due this cycle");
            return summary;
        }

        // Claim every source before any fetch begins. Once claimed, a source
        // is no longer due, so overlapping schedulers cannot dispatch it
        // twice. The cost: a source whose fetch then fails is not retried
        // until it rotates back to the front of the ordering.
        let mut claimed = Vec::with_capacity(sources.len());
        for source in sources {
            match self.db.claim_source(source.id).await {
                Ok(()) => claimed.push(source),
                Err(e) => {
                    tracing::warn!(feed_id = source.id, error = %e, "Failed to claim feed, dropping from batch");
                }
            }
        }

        summary.dispatched = claimed.len();

        let outcomes: Vec<ScrapeOutcome> = stream::iter(claimed)
            .map(|source| {
                let db = self.db.clone();
                let client = self.client.clone();
                let timeout = self.request_timeout;
                async move { scrape_feed(&db, &client, &source, timeout).await }
            })
            .buffer_unordered(self.concurrency.max(1) as usize)
            .collect()
            .await;

        for outcome in outcomes {
            summary.inserted += outcome.inserted;
            summary.duplicates += outcome.duplicates;
            summary.skipped += outcome.skipped;
            summary.failed += outcome.failed;
        }

        tracing::info!(
            feeds = summary.dispatched,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scrape cycle complete"
        );

        summary
    }
}
