//! Range driver: every (product, date) bucket, one after another.
//!
//! Concurrency lives inside a bucket only, so at most `workers` connections
//! are open at any time and log output stays in date order.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::bucket::{self, BucketKey};
use crate::catalog::{LadsCatalog, ManifestSource};
use crate::config::SwathConfig;
use crate::fetch::RetryingFetcher;
use crate::http::{CurlClient, CurlOptions, HttpClient};
use crate::orchestrator::{BucketOrchestrator, BucketReport};

/// Totals across a run, for the final log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub buckets: usize,
    pub manifests_unavailable: usize,
    pub files_listed: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn absorb(&mut self, report: &BucketReport) {
        self.buckets += 1;
        if report.manifest_unavailable {
            self.manifests_unavailable += 1;
        }
        self.files_listed += report.entries;
        self.skipped += report.skipped;
        self.succeeded += report.succeeded;
        self.failed += report.failed;
    }
}

pub struct RangeDriver<S, C> {
    orchestrator: BucketOrchestrator<S, C>,
}

impl<S: ManifestSource, C: HttpClient> RangeDriver<S, C> {
    pub fn new(orchestrator: BucketOrchestrator<S, C>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &BucketOrchestrator<S, C> {
        &self.orchestrator
    }

    /// Process `products` × `start..=end` sequentially. Never fails.
    pub async fn run(&self, products: &[String], start: NaiveDate, end: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::default();
        if start > end {
            tracing::warn!(%start, %end, "start date is after end date; nothing to do");
            return summary;
        }
        let keys: Vec<BucketKey> = bucket::buckets(products, start, end);
        tracing::info!(
            buckets = keys.len(),
            %start,
            %end,
            root = %self.orchestrator.root().display(),
            "starting run"
        );
        for key in &keys {
            let report = self.orchestrator.process_bucket(key).await;
            summary.absorb(&report);
        }
        tracing::info!(
            buckets = summary.buckets,
            manifests_unavailable = summary.manifests_unavailable,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run finished"
        );
        summary
    }
}

impl RangeDriver<LadsCatalog<CurlClient>, CurlClient> {
    /// Production wiring: curl transport, LAADS-style catalog, settings from `cfg`.
    pub fn from_config(cfg: &SwathConfig) -> Self {
        let client = Arc::new(CurlClient::new(CurlOptions {
            connect_timeout: cfg.connect_timeout(),
            stall_timeout: cfg.request_timeout(),
            transfer_timeout: cfg.transfer_timeout(),
        }));
        let catalog = Arc::new(LadsCatalog::from_config(cfg, Arc::clone(&client)));
        let fetcher = Arc::new(RetryingFetcher::from_config(cfg, client));
        Self::new(BucketOrchestrator::new(
            cfg.root.clone(),
            catalog,
            fetcher,
            cfg.worker_count(),
        ))
    }
}
