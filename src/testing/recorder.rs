use crate::core::domain::model::rest_call::Verb;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// One request as observed by a test transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    Rest { verb: Verb, path: String },
    Zapi { tag: String },
}

impl RecordedRequest {
    pub fn rest(verb: Verb, path: impl Into<String>) -> Self {
        RecordedRequest::Rest {
            verb,
            path: path.into(),
        }
    }

    pub fn zapi(tag: impl Into<String>) -> Self {
        RecordedRequest::Zapi { tag: tag.into() }
    }

    /// True for REST calls that change state and for every ZAPI call except
    /// the read-only ones (`*-get`, `*-get-iter`, `*-status`).
    pub fn is_mutating(&self) -> bool {
        match self {
            RecordedRequest::Rest { verb, .. } => verb.is_mutating(),
            RecordedRequest::Zapi { tag } => {
                !(tag.ends_with("-get") || tag.ends_with("-get-iter") || tag.ends_with("-status"))
            }
        }
    }
}

impl fmt::Display for RecordedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedRequest::Rest { verb, path } => write!(f, "{verb} {path}"),
            RecordedRequest::Zapi { tag } => write!(f, "ZAPI {tag}"),
        }
    }
}

/// Shared, ordered log of observed requests. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RequestRecorder {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RequestRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, request: RecordedRequest) {
        self.lock().push(request);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().clone()
    }

    pub fn mutating(&self) -> Vec<RecordedRequest> {
        self.lock()
            .iter()
            .filter(|request| request.is_mutating())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
