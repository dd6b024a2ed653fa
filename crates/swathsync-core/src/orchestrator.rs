//! Bucket orchestrator: manifest → filter satisfied files → bounded fan-out → barrier.
//!
//! Keeps at most `workers` fetches in flight; when one finishes, the next
//! queued task starts, in manifest order. `process_bucket` returns only after
//! every task has settled, which is what keeps buckets strictly sequential.
//! Per-file failures are logged and counted, never propagated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bucket::BucketKey;
use crate::catalog::{Manifest, ManifestSource};
use crate::fetch::{DownloadTask, Outcome, RetryingFetcher};
use crate::http::HttpClient;
use crate::integrity;

/// What happened to one bucket. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketReport {
    pub key: BucketKey,
    /// Manifest could not be fetched (or the destination could not be created).
    pub manifest_unavailable: bool,
    pub entries: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BucketReport {
    fn new(key: BucketKey) -> Self {
        Self {
            key,
            manifest_unavailable: false,
            entries: 0,
            skipped: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Number of fetch tasks that were dispatched.
    pub fn dispatched(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Split a manifest into tasks for unsatisfied entries, in manifest order.
/// Returns the tasks and the number of entries skipped as already present.
pub fn pending_tasks(manifest: &Manifest, dest_dir: &Path) -> (Vec<DownloadTask>, usize) {
    let mut skipped = 0;
    let mut tasks = Vec::new();
    for entry in &manifest.entries {
        let dest = dest_dir.join(&entry.name);
        if integrity::is_satisfied(&dest, entry.size) {
            tracing::info!(file = %entry.name, "skipping (already exists and size matches)");
            skipped += 1;
            continue;
        }
        tasks.push(DownloadTask {
            entry: entry.clone(),
            dest,
        });
    }
    (tasks, skipped)
}

pub struct BucketOrchestrator<S, C> {
    root: PathBuf,
    source: Arc<S>,
    fetcher: Arc<RetryingFetcher<C>>,
    workers: usize,
}

impl<S: ManifestSource, C: HttpClient> BucketOrchestrator<S, C> {
    pub fn new(
        root: impl Into<PathBuf>,
        source: Arc<S>,
        fetcher: Arc<RetryingFetcher<C>>,
        workers: usize,
    ) -> Self {
        Self {
            root: root.into(),
            source,
            fetcher,
            workers: workers.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Mirror one bucket. Never fails; the report says what happened.
    pub async fn process_bucket(&self, key: &BucketKey) -> BucketReport {
        let mut report = BucketReport::new(key.clone());
        let dest_dir = key.dest_dir(&self.root);

        if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
            tracing::error!(
                bucket = %key,
                dir = %dest_dir.display(),
                "cannot create destination directory: {}",
                e
            );
            report.manifest_unavailable = true;
            return report;
        }

        let source = Arc::clone(&self.source);
        let lookup = key.clone();
        let manifest = match tokio::task::spawn_blocking(move || source.fetch_manifest(&lookup)).await {
            Ok(Ok(manifest)) => manifest,
            Ok(Err(e)) => {
                tracing::error!(bucket = %key, "no files found: {}", e);
                report.manifest_unavailable = true;
                return report;
            }
            Err(e) => {
                tracing::error!(bucket = %key, "manifest task failed: {}", e);
                report.manifest_unavailable = true;
                return report;
            }
        };

        report.entries = manifest.len();
        let (tasks, skipped) = pending_tasks(&manifest, &dest_dir);
        report.skipped = skipped;
        tracing::debug!(
            bucket = %key,
            entries = report.entries,
            skipped,
            pending = tasks.len(),
            "manifest loaded"
        );

        self.run_tasks(tasks, &mut report).await;

        tracing::info!(
            bucket = %key,
            entries = report.entries,
            skipped = report.skipped,
            succeeded = report.succeeded,
            failed = report.failed,
            "bucket processed"
        );
        report
    }

    async fn run_tasks(&self, tasks: Vec<DownloadTask>, report: &mut BucketReport) {
        let mut queue = tasks.into_iter();
        let mut join_set = tokio::task::JoinSet::new();

        loop {
            while join_set.len() < self.workers {
                let Some(task) = queue.next() else {
                    break;
                };
                let fetcher = Arc::clone(&self.fetcher);
                join_set.spawn(async move {
                    let outcome = fetcher.fetch(&task).await;
                    (task, outcome)
                });
            }

            let Some(res) = join_set.join_next().await else {
                break;
            };
            match res {
                Ok((task, outcome)) => {
                    log_outcome(&task, &outcome);
                    if outcome.is_success() {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(bucket = %report.key, "fetch task join: {}", e);
                    report.failed += 1;
                }
            }
        }
    }
}

fn log_outcome(task: &DownloadTask, outcome: &Outcome) {
    let file = task.entry.name.as_str();
    match outcome {
        Outcome::Success { .. } => tracing::info!(file, "downloaded successfully"),
        Outcome::SizeMismatch { .. } => tracing::error!(file, "{}; file removed", outcome),
        _ => tracing::error!(file, "failed to download: {}", outcome),
    }
}
