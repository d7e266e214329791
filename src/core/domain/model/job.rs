//! REST asynchronous jobs.

use crate::core::domain::error::{OntapError, OntapResult};
use serde_json::Value;
use std::fmt;

/// Reference to a server-side job, as found under `job` in a 202 answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub uuid: String,
    /// Poll path relative to `/api/`, e.g. `cluster/jobs/<uuid>`.
    pub poll_url: String,
}

impl JobHandle {
    /// Parses `{"uuid": ..., "_links": {"self": {"href": "/api/cluster/jobs/<uuid>"}}}`.
    pub fn from_value(job: &Value) -> OntapResult<Self> {
        let href = job
            .pointer("/_links/self/href")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OntapError::UnexpectedShape(format!("URL Incorrect format: missing href - Job: {job}"))
            })?;
        let poll_url = href
            .split_once("api/")
            .map(|(_, rest)| rest.to_string())
            .ok_or_else(|| {
                OntapError::UnexpectedShape(format!("URL Incorrect format: {href} - Job: {job}"))
            })?;
        let uuid = job
            .get("uuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| poll_url.rsplit('/').next().map(str::to_string))
            .unwrap_or_default();
        Ok(Self { uuid, poll_url })
    }
}

/// Lifecycle states of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Success,
    Failure,
}

impl JobState {
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "paused" => Some(JobState::Paused),
            "success" => Some(JobState::Success),
            "failure" => Some(JobState::Failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Success => "success",
            JobState::Failure => "failure",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record as returned by `GET cluster/jobs/<uuid>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub uuid: String,
    pub state: JobState,
    pub code: i64,
    pub message: String,
    /// The full record, attached to the caller's response on success.
    pub payload: Value,
}

impl Job {
    /// Parses a job record; returns `Ok(None)` when the record has no state.
    pub fn from_value(fallback_uuid: &str, payload: &Value) -> OntapResult<Option<Self>> {
        let Some(raw_state) = payload.get("state").and_then(Value::as_str) else {
            return Ok(None);
        };
        let state = JobState::parse(raw_state).ok_or_else(|| {
            OntapError::UnexpectedShape(format!("unexpected job state '{raw_state}' in {payload}"))
        })?;
        Ok(Some(Self {
            uuid: payload
                .get("uuid")
                .and_then(Value::as_str)
                .unwrap_or(fallback_uuid)
                .to_string(),
            state,
            code: payload.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            payload: payload.clone(),
        }))
    }
}
