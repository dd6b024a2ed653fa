//! Retrying fetcher: one remote file to one local path.
//!
//! The attempt loop is an explicit state machine:
//! `Attempting(n)` runs one blocking transfer on the blocking pool and settles
//! into either `Backoff` (transient failure, budget left) or `Done(outcome)`.
//! `Backoff` sleeps on the async timer and moves to `Attempting(n + 1)`.
//!
//! Only transport failures and gateway-style 5xx are retried. A size mismatch
//! means the manifest and the content disagree; another attempt would not help.
//! Whatever the outcome, the destination is never left holding a partial body.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::ManifestEntry;
use crate::config::SwathConfig;
use crate::http::{HttpClient, RequestIdentity};
use crate::integrity;
use crate::retry::{classify, classify_http_status, AttemptError, RetryDecision, RetryPolicy};

/// One unsatisfied manifest entry and where it goes.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub entry: ManifestEntry,
    pub dest: PathBuf,
}

/// Terminal result of one file's attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { bytes: u64 },
    SizeMismatch { expected: u64, actual: u64 },
    HttpError { status: u32 },
    RetriesExhausted { attempts: u32, last_error: String },
    StorageError { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { bytes } => write!(f, "downloaded {} bytes", bytes),
            Outcome::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {}, got {}", expected, actual)
            }
            Outcome::HttpError { status } => write!(f, "HTTP {}", status),
            Outcome::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {} attempt(s): {}", attempts, last_error),
            Outcome::StorageError { message } => write!(f, "storage: {}", message),
        }
    }
}

#[derive(Debug)]
enum AttemptState {
    Attempting(u32),
    Backoff { attempt: u32, delay: Duration },
    Done(Outcome),
}

/// Downloads files with bounded retries. Safe to share across tasks via `Arc`.
pub struct RetryingFetcher<C> {
    client: Arc<C>,
    identity: RequestIdentity,
    policy: RetryPolicy,
}

impl<C: HttpClient> RetryingFetcher<C> {
    pub fn new(client: Arc<C>, identity: RequestIdentity, policy: RetryPolicy) -> Self {
        Self {
            client,
            identity,
            policy,
        }
    }

    pub fn from_config(cfg: &SwathConfig, client: Arc<C>) -> Self {
        Self::new(
            client,
            RequestIdentity::new(cfg.user_agent.clone(), cfg.resolved_token()),
            cfg.retry_policy(),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `task.entry.url` into `task.dest`. Never panics or errors; the outcome says what happened.
    pub async fn fetch(&self, task: &DownloadTask) -> Outcome {
        let mut state = AttemptState::Attempting(1);
        loop {
            state = match state {
                AttemptState::Attempting(attempt) => {
                    let result = self.transfer(task).await;
                    self.settle(task, attempt, result)
                }
                AttemptState::Backoff { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting(attempt + 1)
                }
                AttemptState::Done(outcome) => return outcome,
            };
        }
    }

    async fn transfer(&self, task: &DownloadTask) -> Result<u64, AttemptError> {
        let client = Arc::clone(&self.client);
        let identity = self.identity.clone();
        let url = task.entry.url.clone();
        let dest = task.dest.clone();
        tokio::task::spawn_blocking(move || client.download_to(&url, &identity, &dest))
            .await
            .unwrap_or_else(|join| {
                Err(AttemptError::Storage(io::Error::new(
                    io::ErrorKind::Other,
                    format!("download worker failed: {}", join),
                )))
            })
    }

    /// Turn one attempt's result into the next state, cleaning up on failure.
    fn settle(
        &self,
        task: &DownloadTask,
        attempt: u32,
        result: Result<u64, AttemptError>,
    ) -> AttemptState {
        let name = task.entry.name.as_str();
        let expected = task.entry.size;

        let err = match result {
            Ok(_) => return AttemptState::Done(verify_size(task)),
            Err(AttemptError::Http(status)) if !classify_http_status(status).is_transient() => {
                // Non-200 bodies are never written, so there is nothing to clean up.
                return AttemptState::Done(Outcome::HttpError { status });
            }
            Err(AttemptError::Storage(e)) => {
                discard(task);
                return AttemptState::Done(Outcome::StorageError {
                    message: e.to_string(),
                });
            }
            Err(e) => e,
        };

        discard(task);
        let kind = classify(&err);
        match self.policy.decide(attempt, kind) {
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    file = name,
                    attempt,
                    error = %err,
                    "download attempt failed; retrying in {:?}",
                    delay
                );
                AttemptState::Backoff { attempt, delay }
            }
            RetryDecision::NoRetry => {
                tracing::debug!(file = name, attempt, expected, ?kind, "no further attempts");
                AttemptState::Done(Outcome::RetriesExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                })
            }
        }
    }
}

/// Compare on-disk length to the manifest size; remove the file on mismatch.
fn verify_size(task: &DownloadTask) -> Outcome {
    let expected = task.entry.size;
    match std::fs::metadata(&task.dest) {
        Ok(meta) if meta.len() == expected => Outcome::Success { bytes: meta.len() },
        Ok(meta) => {
            discard(task);
            Outcome::SizeMismatch {
                expected,
                actual: meta.len(),
            }
        }
        Err(e) => {
            discard(task);
            Outcome::StorageError {
                message: format!("cannot stat {}: {}", task.dest.display(), e),
            }
        }
    }
}

fn discard(task: &DownloadTask) {
    if let Err(e) = integrity::remove_partial(&task.dest) {
        tracing::error!(
            path = %task.dest.display(),
            "failed to remove partial download: {}",
            e
        );
    }
}
