//! The seam between the client and the network.
//!
//! Production binds [`HttpsTransport`](super::http_transport::HttpsTransport);
//! tests bind a scripted double or a mock.

use crate::core::domain::error::{TransportError, TransportErrorClass};
use crate::core::domain::model::rest_call::Verb;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// One HTTP exchange to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Verb,
    pub url: Url,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Verb, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    /// The URL with the query string appended.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url
    }

    /// The request path relative to `/api/`, if this is a REST call.
    pub fn rest_path(&self) -> Option<&str> {
        self.url.path().strip_prefix("/api/")
    }
}

/// The raw answer to an [`HttpRequest`]. Non-2xx statuses are answers, not
/// errors; classifying them is the caller's job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The transport class of a non-2xx status.
    pub fn error_class(&self) -> Option<TransportErrorClass> {
        match self.status {
            400..=499 => Some(TransportErrorClass::Http4xx),
            500..=599 => Some(TransportErrorClass::Http5xx),
            _ => None,
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes single HTTP exchanges. Implementations never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
