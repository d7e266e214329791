//! Waits on REST asynchronous jobs.

use crate::core::domain::{
    error::{OntapError, OntapResult},
    model::job::{Job, JobHandle, JobState},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Consecutive poll failures tolerated before giving up.
pub const MAX_POLL_RETRIES: u32 = 3;
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Where job records are read from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetches the job record at `poll_url` (relative to `/api/`).
    async fn fetch_job(&self, poll_url: &str) -> OntapResult<Value>;
}

/// First poll interval for a job timeout: a sixth of it, at least 5 seconds.
pub fn initial_interval(job_timeout: Duration) -> Duration {
    (job_timeout / 6).max(MIN_POLL_INTERVAL)
}

/// Polls jobs to a terminal state.
///
/// Terminal outcomes are remembered per uuid, so waiting again on a job that
/// already completed returns immediately without polling.
#[derive(Debug, Default)]
pub struct JobReconciler {
    completed: Mutex<HashMap<String, Job>>,
}

impl JobReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the job succeeds, fails or `job_timeout` elapses.
    ///
    /// The interval between polls starts at [`initial_interval`] and grows by
    /// that amount after each poll; the total wait never exceeds `job_timeout`.
    ///
    /// # Returns
    /// The final job record on success.
    ///
    /// # Errors
    /// - `OntapError::Job` when the job reaches `failure`
    /// - `OntapError::JobTimeout` with the last observed state on timeout
    /// - any non-transient poll error, as is
    /// - the last poll error after more than [`MAX_POLL_RETRIES`] consecutive
    ///   transient failures (transport faults, 5xx, records with no state)
    pub async fn wait(
        &self,
        source: &dyn JobSource,
        handle: &JobHandle,
        job_timeout: Duration,
    ) -> OntapResult<Value> {
        if let Some(job) = self.completed.lock().await.get(&handle.uuid).cloned() {
            debug!(uuid = %handle.uuid, state = %job.state, "job already completed");
            return outcome(job);
        }

        let start = Instant::now();
        let increment = initial_interval(job_timeout);
        let mut interval = increment;
        let mut retries = 0;
        let mut last_state: Option<JobState> = None;

        loop {
            match self.poll(source, handle).await {
                Ok(Some(job)) => {
                    retries = 0;
                    debug!(uuid = %job.uuid, state = %job.state, "polled job");
                    if job.state.is_terminal() {
                        self.completed
                            .lock()
                            .await
                            .insert(handle.uuid.clone(), job.clone());
                        return outcome(job);
                    }
                    last_state = Some(job.state);
                }
                Ok(None) => {
                    retries += 1;
                    warn!(uuid = %handle.uuid, retries, "job record has no state");
                    if retries > MAX_POLL_RETRIES {
                        return Err(OntapError::UnexpectedShape(format!(
                            "job {} has no state",
                            handle.uuid
                        )));
                    }
                }
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    retries += 1;
                    warn!(uuid = %handle.uuid, retries, error = %error, "job poll failed");
                    if retries > MAX_POLL_RETRIES {
                        return Err(error);
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= job_timeout {
                return Err(OntapError::JobTimeout {
                    uuid: handle.uuid.clone(),
                    state: last_state
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                });
            }
            sleep(interval.min(job_timeout - elapsed)).await;
            interval += increment;
        }
    }

    /// `Ok(None)` when the record carries no state yet.
    async fn poll(&self, source: &dyn JobSource, handle: &JobHandle) -> OntapResult<Option<Job>> {
        let payload = source.fetch_job(&handle.poll_url).await?;
        Job::from_value(&handle.uuid, &payload)
    }
}

fn outcome(job: Job) -> OntapResult<Value> {
    match job.state {
        JobState::Failure => Err(OntapError::Job {
            uuid: job.uuid,
            code: job.code,
            message: job.message,
        }),
        _ => Ok(job.payload),
    }
}
